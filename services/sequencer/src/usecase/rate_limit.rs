use chrono::Utc;

use cadence_domain::id::{ContactId, SequenceId, UserId};

use crate::domain::repository::RateLimitStore;
use crate::domain::types::{DEFAULT_RATE_LIMIT, RATE_LIMIT_WINDOW_SECS};
use crate::error::SequencerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    User,
    Sequence,
    Contact,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Sequence => "sequence",
            Self::Contact => "contact",
        }
    }
}

pub fn counter_key(scope: RateLimitScope, id: impl std::fmt::Display) -> String {
    format!("ratelimit:{}:{id}", scope.as_str())
}

pub fn cooldown_key(contact_id: ContactId) -> String {
    format!("cooldown:contact:{contact_id}")
}

/// The `(user, sequence?, contact?)` hierarchy a check or increment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitTarget {
    pub user_id: UserId,
    pub sequence_id: Option<SequenceId>,
    pub contact_id: Option<ContactId>,
}

impl RateLimitTarget {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            sequence_id: None,
            contact_id: None,
        }
    }

    pub fn sequence(mut self, sequence_id: SequenceId) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }

    pub fn contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    fn counter_keys(&self) -> Vec<String> {
        let mut keys = vec![counter_key(RateLimitScope::User, self.user_id)];
        if let Some(id) = self.sequence_id {
            keys.push(counter_key(RateLimitScope::Sequence, id));
        }
        if let Some(id) = self.contact_id {
            keys.push(counter_key(RateLimitScope::Contact, id));
        }
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub remaining_ms: i64,
}

/// Outcome of a rate-limit check. A denial is a value, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Highest count across the fetched scopes (0 when none exist yet).
    pub current: u64,
    pub limit: u64,
    pub cooldown: Option<CooldownStatus>,
    pub reason: Option<&'static str>,
}

impl RateLimitDecision {
    fn allow(current: u64, limit: u64) -> Self {
        Self {
            allowed: true,
            current,
            limit,
            cooldown: None,
            reason: None,
        }
    }
}

/// Per-scope send counters and per-contact cooldowns over a [`RateLimitStore`].
///
/// Reads fail open, writes fail closed. Counters are read and then compared,
/// never compare-and-incremented, so concurrent senders may overshoot the
/// limit slightly.
pub struct RateLimiter<S>
where
    S: RateLimitStore,
{
    pub store: S,
    /// Single ceiling shared by every scope.
    pub limit: u64,
    pub window_secs: u64,
}

impl<S> RateLimiter<S>
where
    S: RateLimitStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            limit: DEFAULT_RATE_LIMIT,
            window_secs: RATE_LIMIT_WINDOW_SECS,
        }
    }

    pub fn with_limit(mut self, limit: u64, window_secs: u64) -> Self {
        self.limit = limit;
        self.window_secs = window_secs;
        self
    }

    pub async fn check_rate_limit(&self, target: RateLimitTarget) -> RateLimitDecision {
        let keys = target.counter_keys();
        let cooldown = target.contact_id.map(cooldown_key);

        let snapshot = match self.store.fetch(&keys, cooldown.as_deref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    user_id = %target.user_id,
                    error = %e,
                    "rate limit store unavailable, allowing send"
                );
                return RateLimitDecision::allow(0, self.limit);
            }
        };

        if let Some(record) = snapshot.cooldown.filter(|c| c.remaining_ms > 0) {
            let elapsed = (Utc::now().timestamp_millis() - record.set_at).max(0);
            let remaining_ms = (record.remaining_ms - elapsed).clamp(1, record.remaining_ms);
            return RateLimitDecision {
                allowed: false,
                current: 0,
                limit: self.limit,
                cooldown: Some(CooldownStatus { remaining_ms }),
                reason: Some("contact cooldown active"),
            };
        }

        let current = match snapshot.counters.iter().flatten().map(|c| c.count).max() {
            Some(count) => count,
            None => return RateLimitDecision::allow(0, self.limit),
        };

        if current < self.limit {
            RateLimitDecision::allow(current, self.limit)
        } else {
            RateLimitDecision {
                allowed: false,
                current,
                limit: self.limit,
                cooldown: None,
                reason: Some("rate limit exceeded"),
            }
        }
    }

    /// Count one committed send against every provided scope.
    pub async fn increment_counters(&self, target: RateLimitTarget) -> Result<(), SequencerError> {
        self.store
            .increment(&target.counter_keys(), self.limit, self.window_secs)
            .await
    }

    pub async fn add_cooldown(
        &self,
        contact_id: ContactId,
        duration_ms: u64,
    ) -> Result<(), SequencerError> {
        self.store
            .set_cooldown(
                &cooldown_key(contact_id),
                duration_ms,
                Utc::now().timestamp_millis(),
            )
            .await
    }

    pub async fn reset_limits(&self, target: RateLimitTarget) -> Result<(), SequencerError> {
        let mut keys = target.counter_keys();
        if let Some(contact_id) = target.contact_id {
            keys.push(cooldown_key(contact_id));
        }
        self.store.delete(&keys).await
    }
}
