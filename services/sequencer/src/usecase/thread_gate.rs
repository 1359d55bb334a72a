use cadence_domain::id::{ContactId, SequenceId};

use crate::domain::repository::EmailEventRepository;
use crate::error::SequencerError;

/// Halts a contact once a bounce or reply has been recorded for it.
pub struct ThreadEventGate<E>
where
    E: EmailEventRepository,
{
    pub events: E,
}

impl<E> ThreadEventGate<E>
where
    E: EmailEventRepository,
{
    /// Terminal events are keyed by `(sequence, contact)`, so the lookup runs
    /// whether or not a thread exists yet. A contact that has never been sent
    /// to has no events and always proceeds.
    pub async fn should_proceed(
        &self,
        thread_id: Option<&str>,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<bool, SequencerError> {
        let halted = self
            .events
            .has_terminal_event(sequence_id, contact_id)
            .await?;
        if halted {
            tracing::info!(
                %sequence_id,
                %contact_id,
                thread_id = thread_id.unwrap_or_default(),
                "terminal event recorded, halting contact"
            );
        }
        Ok(!halted)
    }
}
