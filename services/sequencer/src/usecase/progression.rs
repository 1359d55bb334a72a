use chrono::{DateTime, Utc};
use serde_json::json;

use cadence_domain::id::{ContactId, SequenceId, TrackingId};
use cadence_domain::status::{EmailEventKind, SequenceContactStatus, TrackingStatus};

use crate::domain::repository::{
    EmailEventRepository, EmailTrackingRepository, JobQueue, SequenceContactRepository,
    SequenceRepository,
};
use crate::domain::types::{EmailEvent, SequenceContact, SequenceJob, StepAdvance};
use crate::error::SequencerError;
use crate::usecase::schedule::BusinessHoursScheduler;

/// Progression write after step `sent_order` was dispatched. `next_scheduled_at`
/// is the send time of the following step, or `None` after the last one.
pub fn advance_after_send(
    sent_order: i32,
    next_scheduled_at: Option<DateTime<Utc>>,
    thread_id: String,
    at: DateTime<Utc>,
) -> StepAdvance {
    match next_scheduled_at {
        Some(next_scheduled_at) => StepAdvance::Next {
            next_step: sent_order + 1,
            next_scheduled_at,
            thread_id,
            at,
        },
        None => StepAdvance::Complete { thread_id, at },
    }
}

/// Apply `advance` to an in-memory record. Storage adapters perform the same
/// assignment as a conditional update.
pub fn apply_advance(record: &mut SequenceContact, advance: &StepAdvance) {
    match advance {
        StepAdvance::Next {
            next_step,
            next_scheduled_at,
            thread_id,
            at,
        } => {
            record.status = SequenceContactStatus::InProgress;
            record.current_step = *next_step;
            record.next_scheduled_at = Some(*next_scheduled_at);
            record.thread_id = Some(thread_id.clone());
            record.last_processed_at = Some(*at);
        }
        StepAdvance::Complete { thread_id, at } => {
            record.status = SequenceContactStatus::Completed;
            record.completed = true;
            record.completed_at = Some(*at);
            record.next_scheduled_at = None;
            record.thread_id = Some(thread_id.clone());
            record.last_processed_at = Some(*at);
        }
    }
}

// ── Enrolment ────────────────────────────────────────────────────────────────

pub struct EnrollContactUseCase<S, P, Q>
where
    S: SequenceRepository,
    P: SequenceContactRepository,
    Q: JobQueue,
{
    pub sequences: S,
    pub sequence_contacts: P,
    pub jobs: Q,
    pub scheduler: BusinessHoursScheduler,
}

impl<S, P, Q> EnrollContactUseCase<S, P, Q>
where
    S: SequenceRepository,
    P: SequenceContactRepository,
    Q: JobQueue,
{
    /// Attach a contact at step 1 and schedule its first send. Returns `false`
    /// when the contact was already enrolled.
    pub async fn execute(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        now: DateTime<Utc>,
    ) -> Result<bool, SequencerError> {
        let sequence = self
            .sequences
            .find_by_id(sequence_id)
            .await?
            .ok_or(SequencerError::SequenceNotFound)?;
        let steps = self.sequences.list_steps(sequence_id).await?;
        let first = steps
            .iter()
            .find(|s| s.order == 1)
            .ok_or(SequencerError::StepNotFound { order: 1 })?;

        let next = self.scheduler.calculate_next_run(
            now,
            first,
            &sequence.business_hours_or_default(),
        )?;

        let record = SequenceContact {
            sequence_id,
            contact_id,
            status: SequenceContactStatus::Pending,
            current_step: 1,
            thread_id: None,
            started_at: Some(now),
            last_processed_at: None,
            next_scheduled_at: Some(next.at),
            completed: false,
            completed_at: None,
        };
        if !self.sequence_contacts.create(&record).await? {
            tracing::debug!(%sequence_id, %contact_id, "contact already enrolled");
            return Ok(false);
        }

        self.jobs
            .enqueue(
                &SequenceJob::SendStep {
                    sequence_id,
                    contact_id,
                    step_id: first.id,
                },
                next.at,
            )
            .await?;
        tracing::info!(%sequence_id, %contact_id, first_send_at = %next.at, "contact enrolled");
        Ok(true)
    }
}

// ── Terminal events ──────────────────────────────────────────────────────────

/// Records bounces and replies detected outside the send pipeline. Either
/// event makes the thread gate halt the contact.
pub struct RecordTerminalEventUseCase<P, T, E>
where
    P: SequenceContactRepository,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
{
    pub sequence_contacts: P,
    pub trackings: T,
    pub events: E,
}

impl<P, T, E> RecordTerminalEventUseCase<P, T, E>
where
    P: SequenceContactRepository,
    T: EmailTrackingRepository,
    E: EmailEventRepository,
{
    pub async fn record_bounce(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        tracking_id: Option<TrackingId>,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        self.sequence_contacts
            .mark_bounced(sequence_id, contact_id, at)
            .await?;
        self.record(
            EmailEventKind::Bounced,
            TrackingStatus::Bounced,
            sequence_id,
            contact_id,
            tracking_id,
            at,
        )
        .await?;
        tracing::info!(%sequence_id, %contact_id, "bounce recorded");
        Ok(())
    }

    /// The progression record is left as is; the gate stops further steps.
    pub async fn record_reply(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        tracking_id: Option<TrackingId>,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        self.record(
            EmailEventKind::Replied,
            TrackingStatus::Replied,
            sequence_id,
            contact_id,
            tracking_id,
            at,
        )
        .await?;
        tracing::info!(%sequence_id, %contact_id, "reply recorded");
        Ok(())
    }

    async fn record(
        &self,
        kind: EmailEventKind,
        tracking_status: TrackingStatus,
        sequence_id: SequenceId,
        contact_id: ContactId,
        tracking_id: Option<TrackingId>,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        if let Some(id) = tracking_id {
            self.trackings.set_status(id, tracking_status).await?;
        }
        self.events
            .record(&EmailEvent {
                id: uuid::Uuid::new_v4(),
                kind,
                sequence_id,
                contact_id,
                tracking_id,
                metadata: json!({}),
                occurred_at: at,
            })
            .await
    }
}
