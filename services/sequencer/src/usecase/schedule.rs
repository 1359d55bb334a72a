use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

use cadence_domain::business_hours::BusinessHours;
use cadence_domain::status::DelayUnit;

use crate::domain::types::{
    DEMO_MAX_DELAY_HOURS, MAX_STEP_DELAY_DAYS, SCHEDULE_MAX_ITERATIONS, SequenceStep,
};
use crate::error::SequencerError;

/// A computed send instant. `degraded` is set when the adjustment loop ran
/// out of iterations and `at` is the last candidate rather than a verified
/// business-hours instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextRun {
    pub at: DateTime<Utc>,
    pub degraded: bool,
}

/// Half-open `[start, end)` interval of one work day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ProcessingWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// A [`BusinessHours`] profile with its timezone and work-hour strings parsed.
#[derive(Debug, Clone)]
pub struct WorkSchedule {
    tz: Tz,
    work_days: BTreeSet<u8>,
    start: NaiveTime,
    end: NaiveTime,
    holidays: BTreeSet<NaiveDate>,
}

fn parse_hhmm(field: &str, value: &str) -> Result<NaiveTime, SequencerError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| SequencerError::InvalidBusinessHours(format!("{field} '{value}' is not HH:MM")))
}

impl TryFrom<&BusinessHours> for WorkSchedule {
    type Error = SequencerError;

    fn try_from(hours: &BusinessHours) -> Result<Self, Self::Error> {
        let tz: Tz = hours.timezone.parse().map_err(|_| {
            SequencerError::InvalidBusinessHours(format!("unknown timezone '{}'", hours.timezone))
        })?;
        let start = parse_hhmm("workHoursStart", &hours.work_hours_start)?;
        let end = parse_hhmm("workHoursEnd", &hours.work_hours_end)?;
        if start >= end {
            return Err(SequencerError::InvalidBusinessHours(format!(
                "work hours {start} to {end} are empty"
            )));
        }
        if let Some(day) = hours.work_days.iter().find(|d| **d > 6) {
            return Err(SequencerError::InvalidBusinessHours(format!(
                "work day {day} is outside 0..=6"
            )));
        }
        Ok(Self {
            tz,
            work_days: hours.work_days.clone(),
            start,
            end,
            holidays: hours.holidays.clone(),
        })
    }
}

impl WorkSchedule {
    fn is_work_date(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.work_days.contains(&weekday) && !self.holidays.contains(&date)
    }

    fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    /// Local wall-clock time back to UTC. Ambiguous times take the earlier
    /// instant; times inside a DST gap move past the gap.
    fn to_utc(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        let resolved = self
            .tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive));
        resolved.with_timezone(&Utc)
    }

    pub fn is_within(&self, instant: DateTime<Utc>) -> bool {
        let local = self.local(instant);
        let time = local.time();
        self.is_work_date(local.date()) && self.start <= time && time < self.end
    }

    /// First work date strictly after `date`, capped at
    /// [`SCHEDULE_MAX_ITERATIONS`] candidate days.
    pub fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut candidate = date + Duration::days(1);
        for _ in 0..SCHEDULE_MAX_ITERATIONS {
            if self.is_work_date(candidate) {
                return candidate;
            }
            candidate += Duration::days(1);
        }
        tracing::warn!(%date, %candidate, "no business day found within iteration cap");
        candidate
    }

    fn window_on(&self, date: NaiveDate) -> ProcessingWindow {
        ProcessingWindow {
            start: self.to_utc(date.and_time(self.start)),
            end: self.to_utc(date.and_time(self.end)),
        }
    }

    /// Today's window if it has not ended yet, otherwise the next business day's.
    pub fn current_or_next_window(&self, now: DateTime<Utc>) -> ProcessingWindow {
        let local = self.local(now);
        let today = local.date();
        if self.is_work_date(today) && local.time() < self.end {
            return self.window_on(today);
        }
        self.window_on(self.next_business_day(today))
    }

    fn apply_delay(
        &self,
        now: DateTime<Utc>,
        amount: i64,
        unit: DelayUnit,
    ) -> Result<NaiveDateTime, SequencerError> {
        let delay = step_delay(amount, unit)?;
        let out_of_range = || {
            SequencerError::InvalidStepDelay(format!("{amount} {unit} from {now} is out of range"))
        };
        match unit {
            DelayUnit::Minutes | DelayUnit::Hours => now
                .checked_add_signed(delay)
                .map(|at| self.local(at))
                .ok_or_else(out_of_range),
            DelayUnit::Days => {
                let mut candidate = self.local(now);
                let mut remaining = amount.max(0);
                while remaining > 0 {
                    candidate = candidate
                        .checked_add_signed(Duration::days(1))
                        .ok_or_else(out_of_range)?;
                    if !matches!(candidate.weekday(), Weekday::Sat | Weekday::Sun) {
                        remaining -= 1;
                    }
                }
                Ok(candidate)
            }
        }
    }

    fn adjust(&self, mut candidate: NaiveDateTime) -> (NaiveDateTime, bool) {
        for _ in 0..SCHEDULE_MAX_ITERATIONS {
            let date = candidate.date();
            if !self.is_work_date(date) {
                candidate = (date + Duration::days(1)).and_time(NaiveTime::MIN);
                continue;
            }
            let time = candidate.time();
            if time < self.start {
                return (date.and_time(self.start), false);
            }
            if time < self.end {
                return (candidate, false);
            }
            candidate = (date + Duration::days(1)).and_time(self.start);
        }
        (candidate, true)
    }

    pub fn next_run(
        &self,
        now: DateTime<Utc>,
        amount: i64,
        unit: DelayUnit,
    ) -> Result<NextRun, SequencerError> {
        let delayed = self.apply_delay(now, amount, unit)?;
        let (local, degraded) = self.adjust(delayed);
        Ok(NextRun {
            at: self.to_utc(local),
            degraded,
        })
    }
}

/// The step's delay as a duration. Negative amounts count as zero; anything
/// past [`MAX_STEP_DELAY_DAYS`] is rejected.
fn step_delay(amount: i64, unit: DelayUnit) -> Result<Duration, SequencerError> {
    let amount = amount.max(0);
    let delay = match unit {
        DelayUnit::Minutes => Duration::try_minutes(amount),
        DelayUnit::Hours => Duration::try_hours(amount),
        DelayUnit::Days => Duration::try_days(amount),
    };
    delay
        .filter(|d| *d <= Duration::days(MAX_STEP_DELAY_DAYS))
        .ok_or_else(|| {
            SequencerError::InvalidStepDelay(format!(
                "{amount} {unit} exceeds {MAX_STEP_DELAY_DAYS} days"
            ))
        })
}

/// Computes when a step may be sent.
///
/// With `demo_mode` set, business hours are ignored: the raw delay is capped
/// at [`DEMO_MAX_DELAY_HOURS`] and clamped to the end of the current UTC day.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusinessHoursScheduler {
    pub demo_mode: bool,
}

impl BusinessHoursScheduler {
    pub fn new(demo_mode: bool) -> Self {
        Self { demo_mode }
    }

    pub fn calculate_next_run(
        &self,
        now: DateTime<Utc>,
        step: &SequenceStep,
        hours: &BusinessHours,
    ) -> Result<NextRun, SequencerError> {
        if self.demo_mode {
            return Ok(NextRun {
                at: demo_run(now, step_delay(step.delay_amount, step.delay_unit)?),
                degraded: false,
            });
        }

        let schedule = WorkSchedule::try_from(hours)?;
        let next = schedule.next_run(now, step.delay_amount, step.delay_unit)?;
        if next.degraded {
            tracing::warn!(
                step_id = %step.id,
                at = %next.at,
                timezone = %hours.timezone,
                "business hours adjustment hit iteration cap; using last candidate"
            );
        }
        Ok(next)
    }

    pub fn is_within_business_hours(
        &self,
        instant: DateTime<Utc>,
        hours: &BusinessHours,
    ) -> Result<bool, SequencerError> {
        Ok(WorkSchedule::try_from(hours)?.is_within(instant))
    }

    pub fn next_business_day(
        &self,
        date: NaiveDate,
        hours: &BusinessHours,
    ) -> Result<NaiveDate, SequencerError> {
        Ok(WorkSchedule::try_from(hours)?.next_business_day(date))
    }

    pub fn current_or_next_processing_window(
        &self,
        now: DateTime<Utc>,
        hours: &BusinessHours,
    ) -> Result<ProcessingWindow, SequencerError> {
        Ok(WorkSchedule::try_from(hours)?.current_or_next_window(now))
    }
}

fn demo_run(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let delay = delay.min(Duration::hours(DEMO_MAX_DELAY_HOURS));
    let end_of_day = now
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(now);
    (now + delay).min(end_of_day).max(now)
}
