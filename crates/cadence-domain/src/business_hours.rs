//! Business-hours profile governing permissible send times.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::status::ScheduleType;

/// Timezone, work days, work-hour window and holidays for one sequence.
///
/// `work_days` uses 0 = Sunday through 6 = Saturday. `work_hours_start` and
/// `work_hours_end` are `HH:MM` in the profile's local time; the window is
/// half-open `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHours {
    pub timezone: String,
    pub work_days: BTreeSet<u8>,
    pub work_hours_start: String,
    pub work_hours_end: String,
    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
    #[serde(default = "default_schedule_type")]
    pub schedule_type: ScheduleType,
}

fn default_schedule_type() -> ScheduleType {
    ScheduleType::Business
}

impl Default for BusinessHours {
    /// UTC, Monday to Friday, 09:00 to 17:00, no holidays.
    fn default() -> Self {
        Self {
            timezone: "UTC".to_owned(),
            work_days: (1..=5).collect(),
            work_hours_start: "09:00".to_owned(),
            work_hours_end: "17:00".to_owned(),
            holidays: BTreeSet::new(),
            schedule_type: ScheduleType::Business,
        }
    }
}
