use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cadence_domain::business_hours::BusinessHours;
use cadence_domain::id::{ContactId, MailboxId, SequenceId, StepId, TrackingId, UserId};
use cadence_domain::status::{
    DelayUnit, EmailEventKind, SequenceContactStatus, SequenceStatus, TrackingStatus,
};

// ── Sequences ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sequence {
    pub id: SequenceId,
    pub user_id: UserId,
    pub mailbox_id: MailboxId,
    pub name: String,
    pub status: SequenceStatus,
    /// `None` falls back to [`BusinessHours::default`].
    pub business_hours: Option<BusinessHours>,
    /// Exercise the whole pipeline without touching the provider.
    pub disable_sending: bool,
}

impl Sequence {
    pub fn is_active(&self) -> bool {
        self.status == SequenceStatus::Active
    }

    pub fn business_hours_or_default(&self) -> BusinessHours {
        self.business_hours.clone().unwrap_or_default()
    }
}

/// One email step. `order` is 1-based.
#[derive(Debug, Clone)]
pub struct SequenceStep {
    pub id: StepId,
    pub sequence_id: SequenceId,
    pub order: i32,
    pub delay_amount: i64,
    pub delay_unit: DelayUnit,
    pub subject: String,
    pub content: String,
    pub template_id: Option<uuid::Uuid>,
    pub reply_to_thread: bool,
}

#[derive(Debug, Clone)]
pub struct Contact {
    pub id: ContactId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
}

/// Progression record of one contact through one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceContact {
    pub sequence_id: SequenceId,
    pub contact_id: ContactId,
    pub status: SequenceContactStatus,
    /// 1-based order of the step to send next (or the last step once completed).
    pub current_step: i32,
    pub thread_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub next_scheduled_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Conditional progression write applied after a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAdvance {
    /// Move to `next_step` (status `IN_PROGRESS`).
    Next {
        next_step: i32,
        next_scheduled_at: DateTime<Utc>,
        thread_id: String,
        at: DateTime<Utc>,
    },
    /// Last step sent (status `COMPLETED`, no further schedule).
    Complete { thread_id: String, at: DateTime<Utc> },
}

/// Provider conversation opened by the first step.
#[derive(Debug, Clone)]
pub struct EmailThread {
    pub sequence_id: SequenceId,
    pub contact_id: ContactId,
    pub provider_thread_id: String,
    pub first_message_id: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

// ── Tracking & events ────────────────────────────────────────────────────────

/// Who/what a tracking row belongs to. Stored as the row's JSON metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingMetadata {
    pub email: String,
    pub user_id: UserId,
    pub sequence_id: SequenceId,
    pub step_id: StepId,
    pub contact_id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untracked_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

#[derive(Debug, Clone)]
pub struct EmailTracking {
    pub id: TrackingId,
    pub hash: String,
    pub metadata: TrackingMetadata,
    pub status: TrackingStatus,
    pub created_at: DateTime<Utc>,
}

/// A step already delivered to a contact, read back from its tracking row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredStep {
    pub tracking_id: TrackingId,
    pub rfc_message_id: String,
    pub thread_id: String,
}

/// Authoritative identity written back once a send is reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct SentTracking {
    pub message_id: String,
    pub rfc_message_id: String,
    pub thread_id: String,
    pub metadata: TrackingMetadata,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EmailEvent {
    pub id: uuid::Uuid,
    pub kind: EmailEventKind,
    pub sequence_id: SequenceId,
    pub contact_id: ContactId,
    pub tracking_id: Option<TrackingId>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// One send request. `subject` and `html` are already personalised.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub user_id: UserId,
    pub mailbox_id: MailboxId,
    pub sequence_id: SequenceId,
    pub step_id: StepId,
    pub contact_id: ContactId,
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Provider thread to reply into.
    pub thread_id: Option<String>,
    /// Exercise tracking and events without calling the provider.
    pub disable_sending: bool,
    /// Start of the attempt; stamped on the tracking row.
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    /// Provider id of the message the recipient received.
    pub message_id: String,
    /// Authoritative RFC 2822 Message-ID.
    pub rfc_message_id: String,
    pub thread_id: String,
    pub tracking_id: TrackingId,
    /// Provider id of the tracking-free copy in the sender's sent folder.
    pub untracked_copy_id: Option<String>,
    pub success: bool,
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// Address the mailbox sends as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub display_name: Option<String>,
}

/// Headers of an existing conversation needed to produce a threaded reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadContext {
    /// Message-ID of the latest message in the thread (the reply target).
    pub message_id: String,
    /// Full References chain including `message_id`.
    pub references: Vec<String>,
    /// Subject of the thread's first message.
    pub subject: String,
}

/// Identifiers the provider assigns to a stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessageRef {
    pub id: String,
    pub thread_id: String,
}

/// Headers read back from a stored message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    pub id: String,
    pub thread_id: String,
    pub message_id: Option<String>,
    pub subject: Option<String>,
}

/// Errors raised by a provider mailbox adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("not found")]
    NotFound,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("transport: {0}")]
    Transport(String),
}

// ── Jobs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ProcessSequence,
    SendStep,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessSequence => "process_sequence",
            Self::SendStep => "send_step",
        }
    }
}

/// Unit of work delivered (at least once) by the job runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceJob {
    /// Sweep a sequence for due contacts.
    ProcessSequence { sequence_id: SequenceId },
    /// Send one step to one contact.
    SendStep {
        sequence_id: SequenceId,
        contact_id: ContactId,
        step_id: StepId,
    },
}

impl SequenceJob {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::ProcessSequence { .. } => JobKind::ProcessSequence,
            Self::SendStep { .. } => JobKind::SendStep,
        }
    }

    /// Single-flight key: at most one active job per key.
    pub fn dedup_key(&self) -> String {
        match self {
            Self::ProcessSequence { sequence_id } => format!("sequence:{sequence_id}"),
            Self::SendStep {
                sequence_id,
                contact_id,
                step_id,
            } => format!("{sequence_id}:{contact_id}:{step_id}"),
        }
    }
}

/// A job leased from the queue.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: uuid::Uuid,
    pub job: SequenceJob,
    pub attempts: i32,
    pub max_attempts: i32,
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Business-hours adjustment gives up after two work-weeks of candidate days.
pub const SCHEDULE_MAX_ITERATIONS: usize = 14;

/// Demo mode never schedules further out than this.
pub const DEMO_MAX_DELAY_HOURS: i64 = 8;

/// Longest step delay the scheduler accepts, in any unit.
pub const MAX_STEP_DELAY_DAYS: i64 = 3_650;

/// Default ceiling shared by every rate-limit scope.
pub const DEFAULT_RATE_LIMIT: u64 = 50;

/// Rolling expiry of rate-limit counters.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Wait before re-fetching a just-sent message from the provider.
pub const RECONCILE_DELAY_MS: u64 = 1_000;
