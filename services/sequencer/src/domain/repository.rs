#![allow(async_fn_in_trait)]

use chrono::{DateTime, Duration, Utc};

use cadence_domain::id::{ContactId, MailboxId, SequenceId, StepId, TrackingId, UserId};
use cadence_domain::status::TrackingStatus;

use crate::domain::types::{
    ClaimedJob, Contact, DeliveredStep, DispatchResult, EmailEvent, EmailThread, EmailTracking, JobKind,
    MessageHeaders, ProviderError, ProviderMessageRef, SendOptions, Sender, SentTracking,
    Sequence, SequenceContact, SequenceJob, SequenceStep, StepAdvance, ThreadContext,
};
use crate::error::SequencerError;

/// Read access to sequences and their steps (authored elsewhere).
pub trait SequenceRepository: Send + Sync {
    async fn find_by_id(&self, id: SequenceId) -> Result<Option<Sequence>, SequencerError>;

    /// Steps ordered by ascending `order`.
    async fn list_steps(&self, id: SequenceId) -> Result<Vec<SequenceStep>, SequencerError>;
}

pub trait ContactRepository: Send + Sync {
    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, SequencerError>;
}

/// Progression records. Every mutation that moves a contact forward is a
/// conditional write on `current_step` so that redelivered jobs cannot
/// double-advance.
pub trait SequenceContactRepository: Send + Sync {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<SequenceContact>, SequencerError>;

    /// Insert a new record. Returns `false` if the pair already exists.
    async fn create(&self, record: &SequenceContact) -> Result<bool, SequencerError>;

    /// Contacts of a sequence with `next_scheduled_at <= now` that are
    /// `PENDING` or `IN_PROGRESS`.
    async fn list_due(
        &self,
        sequence_id: SequenceId,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SequenceContact>, SequencerError>;

    /// Claim an attempt: set `PENDING` and `last_processed_at = at` iff
    /// `current_step == expected_step`, the record is not absorbing, and no
    /// other attempt holds it (`PENDING` with `last_processed_at` within
    /// `lease` of `at`). Returns whether it applied.
    async fn begin_attempt(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        at: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, SequencerError>;

    /// Apply `advance` iff `current_step == expected_step`. Returns whether it applied.
    async fn advance(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        advance: &StepAdvance,
    ) -> Result<bool, SequencerError>;

    /// Set `FAILED` without touching `current_step`.
    async fn mark_failed(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError>;

    /// Set `BOUNCED` and clear the schedule.
    async fn mark_bounced(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError>;
}

pub trait EmailThreadRepository: Send + Sync {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<EmailThread>, SequencerError>;

    /// Insert unless a thread already exists for the pair.
    async fn create(&self, thread: &EmailThread) -> Result<(), SequencerError>;
}

pub trait EmailTrackingRepository: Send + Sync {
    async fn create(&self, tracking: &EmailTracking) -> Result<(), SequencerError>;

    async fn mark_sent(&self, id: TrackingId, sent: &SentTracking) -> Result<(), SequencerError>;

    async fn set_status(&self, id: TrackingId, status: TrackingStatus)
    -> Result<(), SequencerError>;

    /// Latest reconciled send of `step_id` to the contact whose row was
    /// created at or after `since`.
    async fn find_delivered(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        step_id: StepId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<DeliveredStep>, SequencerError>;
}

pub trait EmailEventRepository: Send + Sync {
    async fn record(&self, event: &EmailEvent) -> Result<(), SequencerError>;

    /// Whether a bounce or reply was recorded for the pair.
    async fn has_terminal_event(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<bool, SequencerError>;
}

/// Producer side of the job runtime.
pub trait JobQueue: Send + Sync {
    /// Schedule `job` at `run_at`. Returns `false` when an active job with the
    /// same dedup key already exists.
    async fn enqueue(&self, job: &SequenceJob, run_at: DateTime<Utc>)
    -> Result<bool, SequencerError>;
}

/// Consumer side of the job runtime (used only by the worker).
pub trait JobLease: Send + Sync {
    async fn claim(&self, kind: JobKind, limit: u64) -> Result<Vec<ClaimedJob>, SequencerError>;

    async fn complete(&self, id: uuid::Uuid) -> Result<(), SequencerError>;

    /// Reschedule without consuming an attempt.
    async fn defer(&self, id: uuid::Uuid, run_at: DateTime<Utc>) -> Result<(), SequencerError>;

    async fn fail(
        &self,
        job: &ClaimedJob,
        error: &str,
        retryable: bool,
    ) -> Result<(), SequencerError>;
}

// ── Rate-limit store ─────────────────────────────────────────────────────────

/// Capacity counter for one scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRecord {
    pub count: u64,
    /// Unix millis of the last increment.
    pub last_updated: i64,
    pub limit: u64,
}

/// Time-boxed block on one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRecord {
    pub remaining_ms: i64,
    /// Unix millis when the cooldown was set.
    pub set_at: i64,
}

/// Result of one batched read. `counters` is positionally aligned with the
/// requested keys; `None` means the key does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub counters: Vec<Option<CounterRecord>>,
    pub cooldown: Option<CooldownRecord>,
}

/// Key-value store with expiry backing the rate limiter.
pub trait RateLimitStore: Send + Sync {
    async fn fetch(
        &self,
        counter_keys: &[String],
        cooldown_key: Option<&str>,
    ) -> Result<RateLimitSnapshot, SequencerError>;

    /// Atomically bump `count` on every key and refresh `last_updated`,
    /// `limit` and the expiry.
    async fn increment(
        &self,
        counter_keys: &[String],
        limit: u64,
        ttl_secs: u64,
    ) -> Result<(), SequencerError>;

    /// Store a cooldown whose value and expiry both equal `duration_ms`.
    async fn set_cooldown(
        &self,
        key: &str,
        duration_ms: u64,
        set_at: i64,
    ) -> Result<(), SequencerError>;

    async fn delete(&self, keys: &[String]) -> Result<(), SequencerError>;
}

// ── Provider mailbox ─────────────────────────────────────────────────────────

/// Message-level capability over one authenticated provider mailbox.
pub trait MailboxClient: Send + Sync {
    fn sender(&self) -> &Sender;

    async fn thread_context(&self, thread_id: &str) -> Result<ThreadContext, ProviderError>;

    /// Send a base64url-encoded RFC 2822 message.
    async fn send(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError>;

    async fn get_headers(&self, message_id: &str) -> Result<MessageHeaders, ProviderError>;

    /// Store a message directly in the sent folder without sending it.
    async fn insert_sent(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError>;

    async fn delete(&self, message_id: &str) -> Result<(), ProviderError>;
}

/// Supplies a usable mailbox client, or `CredentialExpired` when the stored
/// credential can no longer authenticate.
pub trait CredentialProvider: Send + Sync {
    type Mailbox: MailboxClient;

    async fn get_valid_credential(
        &self,
        user_id: UserId,
        mailbox_id: MailboxId,
    ) -> Result<Self::Mailbox, SequencerError>;
}

/// Performs one physical send and records its tracking row and `sent` event.
pub trait EmailSender: Send + Sync {
    async fn send(&self, options: &SendOptions) -> Result<DispatchResult, SequencerError>;
}
