use std::fmt;

use chrono::{DateTime, Duration, Utc};

use cadence_domain::id::{ContactId, SequenceId, StepId, TrackingId};
use cadence_domain::status::SequenceContactStatus;

use crate::domain::repository::{
    ContactRepository, EmailEventRepository, EmailSender, EmailThreadRepository,
    EmailTrackingRepository, JobQueue, RateLimitStore, SequenceContactRepository,
    SequenceRepository,
};
use crate::domain::types::{
    Contact, EmailThread, SendOptions, Sequence, SequenceContact, SequenceJob, SequenceStep,
};
use crate::error::SequencerError;
use crate::usecase::compose::personalize;
use crate::usecase::progression::advance_after_send;
use crate::usecase::rate_limit::{RateLimitTarget, RateLimiter};
use crate::usecase::schedule::BusinessHoursScheduler;
use crate::usecase::thread_gate::ThreadEventGate;

/// Why a job finished without sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SequenceInactive,
    /// The contact is in a state no attempt may leave.
    ContactAbsorbing(SequenceContactStatus),
    /// The job targets a step the contact is no longer on.
    StaleStep,
    /// Another attempt moved the progression record first.
    LostRace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceInactive => f.write_str("sequence not active"),
            Self::ContactAbsorbing(status) => write!(f, "contact is {status}"),
            Self::StaleStep => f.write_str("stale step"),
            Self::LostRace => f.write_str("progression changed concurrently"),
        }
    }
}

/// Result of processing one job. Errors are returned separately and consumed
/// by the job runtime's retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// One step was dispatched. `last_step` marks sequence completion.
    Sent {
        tracking_id: TrackingId,
        last_step: bool,
    },
    /// A sweep ran and queued `enqueued` of `due` contacts.
    Completed { due: usize, enqueued: usize },
    Skipped(SkipReason),
    /// A bounce or reply halts the contact.
    Halted,
    /// Not allowed yet; run again at `until` without consuming an attempt.
    Deferred { until: DateTime<Utc> },
}

// ── Send step ────────────────────────────────────────────────────────────────

/// What a delivered step leaves for the progression write.
struct Delivery {
    tracking_id: TrackingId,
    thread_id: String,
    rfc_message_id: String,
    subject: String,
}

/// Sends the current step to one contact and advances its progression.
pub struct SendStepUseCase<S, C, P, H, T, E, D, R, Q>
where
    S: SequenceRepository,
    C: ContactRepository,
    P: SequenceContactRepository,
    H: EmailThreadRepository,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
    D: EmailSender,
    R: RateLimitStore,
    Q: JobQueue,
{
    pub sequences: S,
    pub contacts: C,
    pub sequence_contacts: P,
    pub threads: H,
    pub trackings: T,
    pub gate: ThreadEventGate<E>,
    pub dispatcher: D,
    pub rate_limiter: RateLimiter<R>,
    pub jobs: Q,
    pub scheduler: BusinessHoursScheduler,
    /// How long a rate-limited contact waits before the next attempt.
    pub rate_limit_retry: Duration,
    /// How long a claimed attempt blocks other attempts on the same contact.
    pub attempt_lease: Duration,
    /// Global switch; a sequence may also disable sending on its own.
    pub disable_sending: bool,
}

impl<S, C, P, H, T, E, D, R, Q> SendStepUseCase<S, C, P, H, T, E, D, R, Q>
where
    S: SequenceRepository,
    C: ContactRepository,
    P: SequenceContactRepository,
    H: EmailThreadRepository,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
    D: EmailSender,
    R: RateLimitStore,
    Q: JobQueue,
{
    async fn fail_contact(&self, sequence_id: SequenceId, contact_id: ContactId, at: DateTime<Utc>) {
        if let Err(e) = self
            .sequence_contacts
            .mark_failed(sequence_id, contact_id, at)
            .await
        {
            tracing::error!(%sequence_id, %contact_id, error = %e, "could not mark contact FAILED");
        }
    }

    async fn load_contact(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<Contact, SequencerError> {
        match self.contacts.find_by_id(contact_id).await? {
            Some(contact) => Ok(contact),
            None => {
                self.fail_contact(sequence_id, contact_id, now).await;
                Err(SequencerError::ContactNotFound)
            }
        }
    }

    /// Send time of `next_step`, or `None` after the last step.
    async fn schedule_next(
        &self,
        sequence: &Sequence,
        contact_id: ContactId,
        next_step: Option<&SequenceStep>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SequencerError> {
        let Some(next) = next_step else {
            return Ok(None);
        };
        match self
            .scheduler
            .calculate_next_run(now, next, &sequence.business_hours_or_default())
        {
            Ok(run) => Ok(Some(run.at)),
            Err(e) => {
                self.fail_contact(sequence.id, contact_id, now).await;
                Err(e)
            }
        }
    }

    /// Persist the consequences of a delivered step. The progression write
    /// comes last: until it lands, a retry finds the delivery and repeats
    /// these writes instead of sending again.
    #[allow(clippy::too_many_arguments)]
    async fn record_delivery(
        &self,
        record: &SequenceContact,
        step: &SequenceStep,
        next_step: Option<&SequenceStep>,
        next_run: Option<DateTime<Utc>>,
        target: RateLimitTarget,
        delivery: Delivery,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome, SequencerError> {
        let (sequence_id, contact_id) = (record.sequence_id, record.contact_id);

        if step.order == 1 {
            self.threads
                .create(&EmailThread {
                    sequence_id,
                    contact_id,
                    provider_thread_id: delivery.thread_id.clone(),
                    first_message_id: delivery.rfc_message_id,
                    subject: delivery.subject,
                    created_at: now,
                })
                .await?;
        }

        if let (Some(next), Some(at)) = (next_step, next_run) {
            self.jobs
                .enqueue(
                    &SequenceJob::SendStep {
                        sequence_id,
                        contact_id,
                        step_id: next.id,
                    },
                    at,
                )
                .await?;
        }

        let thread_id = record.thread_id.clone().unwrap_or(delivery.thread_id);
        let advance = advance_after_send(step.order, next_run, thread_id, now);
        if !self
            .sequence_contacts
            .advance(sequence_id, contact_id, record.current_step, &advance)
            .await?
        {
            tracing::warn!(%sequence_id, %contact_id, step_id = %step.id, "progression moved during dispatch, not advancing");
        }

        if let Err(e) = self.rate_limiter.increment_counters(target).await {
            tracing::error!(%sequence_id, %contact_id, error = %e, "rate limit increment lost");
        }

        Ok(JobOutcome::Sent {
            tracking_id: delivery.tracking_id,
            last_step: next_step.is_none(),
        })
    }

    pub async fn execute(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        step_id: StepId,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome, SequencerError> {
        // 1. Sequence must exist and be active
        let sequence = self
            .sequences
            .find_by_id(sequence_id)
            .await?
            .ok_or(SequencerError::SequenceNotFound)?;
        if !sequence.is_active() {
            tracing::info!(%sequence_id, %contact_id, status = %sequence.status, "sequence not active, skipping");
            return Ok(JobOutcome::Skipped(SkipReason::SequenceInactive));
        }

        // 2. Progression record must not be absorbing
        let record = self
            .sequence_contacts
            .find(sequence_id, contact_id)
            .await?
            .ok_or(SequencerError::ContactNotFound)?;
        if record.status.is_absorbing() {
            tracing::info!(%sequence_id, %contact_id, status = %record.status, "contact not processable, skipping");
            return Ok(JobOutcome::Skipped(SkipReason::ContactAbsorbing(record.status)));
        }

        // 3. Resolve the current step
        let steps = self.sequences.list_steps(sequence_id).await?;
        let Some(step) = steps.iter().find(|s| s.order == record.current_step) else {
            self.fail_contact(sequence_id, contact_id, now).await;
            tracing::error!(%sequence_id, %contact_id, order = record.current_step, "current step missing");
            return Err(SequencerError::StepNotFound {
                order: record.current_step,
            });
        };
        if step.id != step_id {
            tracing::debug!(%sequence_id, %contact_id, %step_id, current = %step.id, "job targets a different step, skipping");
            return Ok(JobOutcome::Skipped(SkipReason::StaleStep));
        }
        if let Some(at) = record.next_scheduled_at.filter(|at| *at > now) {
            tracing::debug!(%sequence_id, %contact_id, %step_id, until = %at, "step not due yet");
            return Ok(JobOutcome::Deferred { until: at });
        }
        let next_step: Option<&SequenceStep> = steps.iter().find(|s| s.order == step.order + 1);
        if next_step.is_none() && steps.iter().any(|s| s.order > step.order) {
            self.fail_contact(sequence_id, contact_id, now).await;
            return Err(SequencerError::StepNotFound {
                order: step.order + 1,
            });
        }

        let target = RateLimitTarget::new(sequence.user_id)
            .sequence(sequence_id)
            .contact(contact_id);

        // 4. A previous attempt may have sent this step without recording it
        if let Some(delivered) = self
            .trackings
            .find_delivered(sequence_id, contact_id, step_id, record.started_at)
            .await?
        {
            tracing::warn!(
                %sequence_id,
                %contact_id,
                %step_id,
                tracking_id = %delivered.tracking_id,
                "step already delivered, completing progression without resending"
            );
            let contact = self.load_contact(sequence_id, contact_id, now).await?;
            let next_run = self
                .schedule_next(&sequence, contact_id, next_step, now)
                .await?;
            let delivery = Delivery {
                tracking_id: delivered.tracking_id,
                thread_id: delivered.thread_id,
                rfc_message_id: delivered.rfc_message_id,
                subject: personalize(&step.subject, &contact),
            };
            return self
                .record_delivery(&record, step, next_step, next_run, target, delivery, now)
                .await;
        }

        // 5. Gates: terminal events, then rate limit and cooldown
        if !self
            .gate
            .should_proceed(record.thread_id.as_deref(), sequence_id, contact_id)
            .await?
        {
            return Ok(JobOutcome::Halted);
        }

        let decision = self.rate_limiter.check_rate_limit(target).await;
        if !decision.allowed {
            let until = match decision.cooldown {
                Some(cooldown) => now + Duration::milliseconds(cooldown.remaining_ms),
                None => now + self.rate_limit_retry,
            };
            tracing::info!(
                %sequence_id,
                %contact_id,
                %step_id,
                current = decision.current,
                limit = decision.limit,
                reason = decision.reason.unwrap_or_default(),
                %until,
                "send gated"
            );
            return Ok(JobOutcome::Deferred { until });
        }

        // 6. Claim the attempt
        if !self
            .sequence_contacts
            .begin_attempt(
                sequence_id,
                contact_id,
                record.current_step,
                now,
                self.attempt_lease,
            )
            .await?
        {
            tracing::info!(%sequence_id, %contact_id, %step_id, "attempt already claimed, skipping");
            return Ok(JobOutcome::Skipped(SkipReason::LostRace));
        }

        let contact = self.load_contact(sequence_id, contact_id, now).await?;

        // 7. Next send time from the following step's delay
        let next_run = self
            .schedule_next(&sequence, contact_id, next_step, now)
            .await?;

        // 8. Dispatch
        let existing_thread = match record.thread_id.clone() {
            Some(thread_id) => Some(thread_id),
            None => self
                .threads
                .find(sequence_id, contact_id)
                .await?
                .map(|t| t.provider_thread_id),
        };
        let reply_thread = existing_thread.filter(|_| step.reply_to_thread && step.order > 1);
        let options = SendOptions {
            user_id: sequence.user_id,
            mailbox_id: sequence.mailbox_id,
            sequence_id,
            step_id,
            contact_id,
            to: contact.email.clone(),
            subject: personalize(&step.subject, &contact),
            html: personalize(&step.content, &contact),
            thread_id: reply_thread,
            disable_sending: self.disable_sending || sequence.disable_sending,
            attempted_at: now,
        };
        let result = match self.dispatcher.send(&options).await {
            Ok(result) => result,
            Err(e) => {
                self.fail_contact(sequence_id, contact_id, now).await;
                tracing::error!(
                    %sequence_id,
                    %contact_id,
                    %step_id,
                    kind = e.kind(),
                    error = %e,
                    "dispatch failed"
                );
                return Err(e);
            }
        };

        // 9. Record the delivery and advance progression
        let delivery = Delivery {
            tracking_id: result.tracking_id,
            thread_id: result.thread_id,
            rfc_message_id: result.rfc_message_id,
            subject: options.subject,
        };
        self.record_delivery(&record, step, next_step, next_run, target, delivery, now)
            .await
    }
}

// ── Process sequence ─────────────────────────────────────────────────────────

/// Sweeps a sequence and queues a send for every due contact.
pub struct ProcessSequenceUseCase<S, P, Q>
where
    S: SequenceRepository,
    P: SequenceContactRepository,
    Q: JobQueue,
{
    pub sequences: S,
    pub sequence_contacts: P,
    pub jobs: Q,
    pub scheduler: BusinessHoursScheduler,
    pub batch_size: u64,
}

impl<S, P, Q> ProcessSequenceUseCase<S, P, Q>
where
    S: SequenceRepository,
    P: SequenceContactRepository,
    Q: JobQueue,
{
    pub async fn execute(
        &self,
        sequence_id: SequenceId,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome, SequencerError> {
        let sequence = self
            .sequences
            .find_by_id(sequence_id)
            .await?
            .ok_or(SequencerError::SequenceNotFound)?;
        if !sequence.is_active() {
            tracing::info!(%sequence_id, status = %sequence.status, "sequence not active, skipping sweep");
            return Ok(JobOutcome::Skipped(SkipReason::SequenceInactive));
        }

        if !self.scheduler.demo_mode {
            let window = self
                .scheduler
                .current_or_next_processing_window(now, &sequence.business_hours_or_default())?;
            if !window.contains(now) {
                tracing::debug!(%sequence_id, until = %window.start, "outside processing window");
                return Ok(JobOutcome::Deferred {
                    until: window.start,
                });
            }
        }

        let due = self
            .sequence_contacts
            .list_due(sequence_id, now, self.batch_size)
            .await?;
        let steps = self.sequences.list_steps(sequence_id).await?;

        let mut enqueued = 0;
        for record in &due {
            let Some(step) = steps.iter().find(|s| s.order == record.current_step) else {
                tracing::warn!(
                    %sequence_id,
                    contact_id = %record.contact_id,
                    order = record.current_step,
                    "due contact has no step at its position"
                );
                continue;
            };
            let job = SequenceJob::SendStep {
                sequence_id,
                contact_id: record.contact_id,
                step_id: step.id,
            };
            if self.jobs.enqueue(&job, now).await? {
                enqueued += 1;
            }
        }

        tracing::info!(%sequence_id, due = due.len(), enqueued, "sequence swept");
        Ok(JobOutcome::Completed {
            due: due.len(),
            enqueued,
        })
    }
}
