#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, TimeZone, Utc};

use cadence_domain::business_hours::BusinessHours;
use cadence_domain::id::{ContactId, MailboxId, SequenceId, StepId, TrackingId, UserId};
use cadence_domain::status::{DelayUnit, SequenceContactStatus, SequenceStatus, TrackingStatus};

use cadence_sequencer::domain::repository::{
    ContactRepository, CooldownRecord, CounterRecord, CredentialProvider, EmailEventRepository,
    EmailThreadRepository, EmailTrackingRepository, JobQueue, MailboxClient, RateLimitSnapshot,
    RateLimitStore, SequenceContactRepository, SequenceRepository,
};
use cadence_sequencer::domain::types::{
    Contact, DeliveredStep, EmailEvent, EmailThread, EmailTracking, MessageHeaders,
    ProviderError, ProviderMessageRef, Sender, SentTracking, Sequence, SequenceContact,
    SequenceJob, SequenceStep, StepAdvance, ThreadContext,
};
use cadence_sequencer::error::SequencerError;
use cadence_sequencer::usecase::dispatch::EmailDispatcher;
use cadence_sequencer::usecase::progression::apply_advance;

pub const TRACKING_BASE_URL: &str = "https://t.cadence.test";

/// Monday 2026-10-19 10:00 UTC, inside default business hours.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_sequence() -> Sequence {
    Sequence {
        id: SequenceId::new(),
        user_id: UserId::new(),
        mailbox_id: MailboxId::new(),
        name: "Q4 outreach".into(),
        status: SequenceStatus::Active,
        business_hours: Some(BusinessHours::default()),
        disable_sending: false,
    }
}

/// `count` steps, each one day after the previous; step 1 has no delay and
/// later steps reply into the thread.
pub fn test_steps(sequence_id: SequenceId, count: i32) -> Vec<SequenceStep> {
    (1..=count)
        .map(|order| SequenceStep {
            id: StepId::new(),
            sequence_id,
            order,
            delay_amount: if order == 1 { 0 } else { 1 },
            delay_unit: DelayUnit::Days,
            subject: "Hello {{first_name}}".into(),
            content: format!(
                r#"<html><body><p>Step {order} for {{{{company}}}}</p><a href="https://acme.test/pricing">pricing</a></body></html>"#
            ),
            template_id: None,
            reply_to_thread: order > 1,
        })
        .collect()
}

pub fn test_contact() -> Contact {
    Contact {
        id: ContactId::new(),
        email: "jane@acme.test".into(),
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        company: Some("Acme".into()),
    }
}

pub fn enrolled(sequence_id: SequenceId, contact_id: ContactId, at: DateTime<Utc>) -> SequenceContact {
    SequenceContact {
        sequence_id,
        contact_id,
        status: SequenceContactStatus::Pending,
        current_step: 1,
        thread_id: None,
        started_at: Some(at),
        last_processed_at: None,
        next_scheduled_at: Some(at),
        completed: false,
        completed_at: None,
    }
}

pub fn test_sender() -> Sender {
    Sender {
        email: "rep@cadence.test".into(),
        display_name: Some("Sam Rep".into()),
    }
}

// ── MockSequenceRepo ─────────────────────────────────────────────────────────

pub struct MockSequenceRepo {
    pub sequences: Vec<Sequence>,
    pub steps: Vec<SequenceStep>,
}

impl MockSequenceRepo {
    pub fn new(sequence: Sequence, steps: Vec<SequenceStep>) -> Self {
        Self {
            sequences: vec![sequence],
            steps,
        }
    }
}

impl SequenceRepository for MockSequenceRepo {
    async fn find_by_id(&self, id: SequenceId) -> Result<Option<Sequence>, SequencerError> {
        Ok(self.sequences.iter().find(|s| s.id == id).cloned())
    }

    async fn list_steps(&self, id: SequenceId) -> Result<Vec<SequenceStep>, SequencerError> {
        let mut steps: Vec<_> = self
            .steps
            .iter()
            .filter(|s| s.sequence_id == id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }
}

// ── MockContactRepo ──────────────────────────────────────────────────────────

pub struct MockContactRepo {
    pub contacts: Vec<Contact>,
}

impl MockContactRepo {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }
}

impl ContactRepository for MockContactRepo {
    async fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, SequencerError> {
        Ok(self.contacts.iter().find(|c| c.id == id).cloned())
    }
}

// ── MockSequenceContactRepo ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockSequenceContactRepo {
    pub records: Arc<Mutex<Vec<SequenceContact>>>,
    pub advance_failures: Arc<Mutex<u32>>,
}

impl MockSequenceContactRepo {
    pub fn new(records: Vec<SequenceContact>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            advance_failures: Arc::new(Mutex::new(0)),
        }
    }

    /// The next `advance` call fails as if the database dropped the write.
    pub fn fail_next_advance(&self) {
        *self.advance_failures.lock().unwrap() += 1;
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns a shared handle to the records for post-execution inspection.
    pub fn records_handle(&self) -> Arc<Mutex<Vec<SequenceContact>>> {
        Arc::clone(&self.records)
    }

    pub fn get(&self, sequence_id: SequenceId, contact_id: ContactId) -> SequenceContact {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.sequence_id == sequence_id && r.contact_id == contact_id)
            .cloned()
            .expect("record exists")
    }
}

impl SequenceContactRepository for MockSequenceContactRepo {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<SequenceContact>, SequencerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.sequence_id == sequence_id && r.contact_id == contact_id)
            .cloned())
    }

    async fn create(&self, record: &SequenceContact) -> Result<bool, SequencerError> {
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.sequence_id == record.sequence_id && r.contact_id == record.contact_id)
        {
            return Ok(false);
        }
        records.push(record.clone());
        Ok(true)
    }

    async fn list_due(
        &self,
        sequence_id: SequenceId,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SequenceContact>, SequencerError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.sequence_id == sequence_id
                    && matches!(
                        r.status,
                        SequenceContactStatus::Pending | SequenceContactStatus::InProgress
                    )
                    && r.next_scheduled_at.is_some_and(|at| at <= now)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn begin_attempt(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        at: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, SequencerError> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records
            .iter_mut()
            .find(|r| r.sequence_id == sequence_id && r.contact_id == contact_id)
        else {
            return Ok(false);
        };
        let held = record.status == SequenceContactStatus::Pending
            && record.last_processed_at.is_some_and(|t| t > at - lease);
        if record.current_step != expected_step || record.status.is_absorbing() || held {
            return Ok(false);
        }
        record.status = SequenceContactStatus::Pending;
        record.last_processed_at = Some(at);
        Ok(true)
    }

    async fn advance(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        expected_step: i32,
        advance: &StepAdvance,
    ) -> Result<bool, SequencerError> {
        {
            let mut failures = self.advance_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SequencerError::Storage(anyhow::anyhow!("connection reset")));
            }
        }
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| {
            r.sequence_id == sequence_id
                && r.contact_id == contact_id
                && r.current_step == expected_step
        }) {
            Some(record) => {
                apply_advance(record, advance);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| {
            r.sequence_id == sequence_id && r.contact_id == contact_id && !r.status.is_absorbing()
        }) {
            record.status = SequenceContactStatus::Failed;
            record.last_processed_at = Some(at);
        }
        Ok(())
    }

    async fn mark_bounced(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), SequencerError> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records
            .iter_mut()
            .find(|r| r.sequence_id == sequence_id && r.contact_id == contact_id)
        {
            record.status = SequenceContactStatus::Bounced;
            record.next_scheduled_at = None;
            record.last_processed_at = Some(at);
        }
        Ok(())
    }
}

// ── MockThreadRepo ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockThreadRepo {
    pub threads: Arc<Mutex<Vec<EmailThread>>>,
}

impl MockThreadRepo {
    pub fn threads_handle(&self) -> Arc<Mutex<Vec<EmailThread>>> {
        Arc::clone(&self.threads)
    }
}

impl EmailThreadRepository for MockThreadRepo {
    async fn find(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<Option<EmailThread>, SequencerError> {
        Ok(self
            .threads
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.sequence_id == sequence_id && t.contact_id == contact_id)
            .cloned())
    }

    async fn create(&self, thread: &EmailThread) -> Result<(), SequencerError> {
        let mut threads = self.threads.lock().unwrap();
        if !threads
            .iter()
            .any(|t| t.sequence_id == thread.sequence_id && t.contact_id == thread.contact_id)
        {
            threads.push(thread.clone());
        }
        Ok(())
    }
}

// ── MockTrackingRepo ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockTrackingRepo {
    pub trackings: Arc<Mutex<Vec<EmailTracking>>>,
    pub sent: Arc<Mutex<Vec<(TrackingId, SentTracking)>>>,
}

impl MockTrackingRepo {
    pub fn trackings_handle(&self) -> Arc<Mutex<Vec<EmailTracking>>> {
        Arc::clone(&self.trackings)
    }

    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(TrackingId, SentTracking)>>> {
        Arc::clone(&self.sent)
    }
}

impl EmailTrackingRepository for MockTrackingRepo {
    async fn create(&self, tracking: &EmailTracking) -> Result<(), SequencerError> {
        self.trackings.lock().unwrap().push(tracking.clone());
        Ok(())
    }

    async fn mark_sent(&self, id: TrackingId, sent: &SentTracking) -> Result<(), SequencerError> {
        if let Some(t) = self.trackings.lock().unwrap().iter_mut().find(|t| t.id == id) {
            t.status = TrackingStatus::Sent;
            t.metadata = sent.metadata.clone();
        }
        self.sent.lock().unwrap().push((id, sent.clone()));
        Ok(())
    }

    async fn set_status(
        &self,
        id: TrackingId,
        status: TrackingStatus,
    ) -> Result<(), SequencerError> {
        if let Some(t) = self.trackings.lock().unwrap().iter_mut().find(|t| t.id == id) {
            t.status = status;
        }
        Ok(())
    }

    async fn find_delivered(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
        step_id: StepId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<DeliveredStep>, SequencerError> {
        let trackings = self.trackings.lock().unwrap();
        let sent = self.sent.lock().unwrap();
        Ok(sent
            .iter()
            .filter_map(|(id, sent)| {
                let tracking = trackings.iter().find(|t| t.id == *id)?;
                let meta = &tracking.metadata;
                let matches = meta.sequence_id == sequence_id
                    && meta.contact_id == contact_id
                    && meta.step_id == step_id
                    && since.is_none_or(|since| tracking.created_at >= since);
                matches.then_some((tracking.created_at, *id, sent))
            })
            .max_by_key(|(created_at, ..)| *created_at)
            .map(|(_, tracking_id, sent)| DeliveredStep {
                tracking_id,
                rfc_message_id: sent.rfc_message_id.clone(),
                thread_id: sent.thread_id.clone(),
            }))
    }
}

// ── MockEventRepo ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockEventRepo {
    pub events: Arc<Mutex<Vec<EmailEvent>>>,
}

impl MockEventRepo {
    pub fn events_handle(&self) -> Arc<Mutex<Vec<EmailEvent>>> {
        Arc::clone(&self.events)
    }
}

impl EmailEventRepository for MockEventRepo {
    async fn record(&self, event: &EmailEvent) -> Result<(), SequencerError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn has_terminal_event(
        &self,
        sequence_id: SequenceId,
        contact_id: ContactId,
    ) -> Result<bool, SequencerError> {
        Ok(self.events.lock().unwrap().iter().any(|e| {
            e.sequence_id == sequence_id && e.contact_id == contact_id && e.kind.is_terminal()
        }))
    }
}

// ── MockJobQueue ─────────────────────────────────────────────────────────────

/// Active jobs keyed like the real queue: one per dedup key.
#[derive(Clone, Default)]
pub struct MockJobQueue {
    pub jobs: Arc<Mutex<Vec<(SequenceJob, DateTime<Utc>)>>>,
}

impl MockJobQueue {
    pub fn jobs_handle(&self) -> Arc<Mutex<Vec<(SequenceJob, DateTime<Utc>)>>> {
        Arc::clone(&self.jobs)
    }
}

impl JobQueue for MockJobQueue {
    async fn enqueue(
        &self,
        job: &SequenceJob,
        run_at: DateTime<Utc>,
    ) -> Result<bool, SequencerError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.iter().any(|(j, _)| j.dedup_key() == job.dedup_key()) {
            return Ok(false);
        }
        jobs.push((job.clone(), run_at));
        Ok(true)
    }
}

// ── InMemoryRateLimitStore ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RateLimitEntries {
    pub counters: HashMap<String, (CounterRecord, tokio::time::Instant)>,
    pub cooldowns: HashMap<String, (CooldownRecord, tokio::time::Instant)>,
}

/// Expiry follows `tokio::time`, so paused-clock tests can step past TTLs.
#[derive(Clone, Default)]
pub struct InMemoryRateLimitStore {
    pub entries: Arc<Mutex<RateLimitEntries>>,
    pub unavailable: bool,
}

impl InMemoryRateLimitStore {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn entries_handle(&self) -> Arc<Mutex<RateLimitEntries>> {
        Arc::clone(&self.entries)
    }

    fn check(&self) -> Result<(), SequencerError> {
        if self.unavailable {
            Err(SequencerError::Storage(anyhow::anyhow!("connection refused")))
        } else {
            Ok(())
        }
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    async fn fetch(
        &self,
        counter_keys: &[String],
        cooldown_key: Option<&str>,
    ) -> Result<RateLimitSnapshot, SequencerError> {
        self.check()?;
        let now = tokio::time::Instant::now();
        let entries = self.entries.lock().unwrap();
        Ok(RateLimitSnapshot {
            counters: counter_keys
                .iter()
                .map(|k| {
                    entries
                        .counters
                        .get(k)
                        .filter(|(_, exp)| *exp > now)
                        .map(|(c, _)| *c)
                })
                .collect(),
            cooldown: cooldown_key.and_then(|k| {
                entries
                    .cooldowns
                    .get(k)
                    .filter(|(_, exp)| *exp > now)
                    .map(|(c, _)| *c)
            }),
        })
    }

    async fn increment(
        &self,
        counter_keys: &[String],
        limit: u64,
        ttl_secs: u64,
    ) -> Result<(), SequencerError> {
        self.check()?;
        let now = tokio::time::Instant::now();
        let expires = now + std::time::Duration::from_secs(ttl_secs);
        let mut entries = self.entries.lock().unwrap();
        for key in counter_keys {
            let count = entries
                .counters
                .get(key)
                .filter(|(_, exp)| *exp > now)
                .map_or(0, |(c, _)| c.count);
            entries.counters.insert(
                key.clone(),
                (
                    CounterRecord {
                        count: count + 1,
                        last_updated: Utc::now().timestamp_millis(),
                        limit,
                    },
                    expires,
                ),
            );
        }
        Ok(())
    }

    async fn set_cooldown(
        &self,
        key: &str,
        duration_ms: u64,
        set_at: i64,
    ) -> Result<(), SequencerError> {
        self.check()?;
        let expires = tokio::time::Instant::now() + std::time::Duration::from_millis(duration_ms);
        self.entries.lock().unwrap().cooldowns.insert(
            key.to_owned(),
            (
                CooldownRecord {
                    remaining_ms: duration_ms as i64,
                    set_at,
                },
                expires,
            ),
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), SequencerError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.counters.remove(key);
            entries.cooldowns.remove(key);
        }
        Ok(())
    }
}

// ── MockMailbox ──────────────────────────────────────────────────────────────

/// One message handed to the provider, split back into headers and body.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub headers: String,
    pub body: String,
    pub thread_id: Option<String>,
}

impl ProviderCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

#[derive(Debug, Default)]
pub struct MailboxState {
    pub context: Option<ThreadContext>,
    pub fail_thread_lookup: bool,
    pub fail_send: bool,
    pub fail_refetch: bool,
    pub fail_insert: bool,
    pub sends: Vec<ProviderCall>,
    pub inserts: Vec<ProviderCall>,
    pub deletes: Vec<String>,
    pub thread_lookups: usize,
}

fn decode(raw: &str, thread_id: Option<&str>) -> ProviderCall {
    let bytes = URL_SAFE_NO_PAD.decode(raw).expect("raw is base64url");
    let text = String::from_utf8(bytes).expect("raw is utf-8");
    let (headers, encoded_body) = text.split_once("\r\n\r\n").expect("headers and body");
    let body = STANDARD
        .decode(encoded_body.replace("\r\n", ""))
        .expect("body is base64");
    ProviderCall {
        headers: headers.to_owned(),
        body: String::from_utf8(body).expect("body is utf-8"),
        thread_id: thread_id.map(str::to_owned),
    }
}

#[derive(Clone)]
pub struct MockMailbox {
    pub sender: Sender,
    pub state: Arc<Mutex<MailboxState>>,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self {
            sender: test_sender(),
            state: Arc::new(Mutex::new(MailboxState::default())),
        }
    }

    pub fn state_handle(&self) -> Arc<Mutex<MailboxState>> {
        Arc::clone(&self.state)
    }
}

impl MailboxClient for MockMailbox {
    fn sender(&self) -> &Sender {
        &self.sender
    }

    async fn thread_context(&self, _thread_id: &str) -> Result<ThreadContext, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.thread_lookups += 1;
        if state.fail_thread_lookup {
            return Err(ProviderError::Api {
                status: 500,
                message: "backend error".into(),
            });
        }
        state.context.clone().ok_or(ProviderError::NotFound)
    }

    async fn send(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(ProviderError::Api {
                status: 503,
                message: "unavailable".into(),
            });
        }
        state.sends.push(decode(raw, thread_id));
        let n = state.sends.len();
        Ok(ProviderMessageRef {
            id: format!("msg-{n}"),
            thread_id: thread_id.map_or_else(|| format!("thread-{n}"), str::to_owned),
        })
    }

    async fn get_headers(&self, message_id: &str) -> Result<MessageHeaders, ProviderError> {
        let state = self.state.lock().unwrap();
        if state.fail_refetch {
            return Err(ProviderError::Transport("timeout".into()));
        }
        let n: usize = message_id
            .trim_start_matches("msg-")
            .parse()
            .map_err(|_| ProviderError::NotFound)?;
        let call = state.sends.get(n - 1).ok_or(ProviderError::NotFound)?;
        Ok(MessageHeaders {
            id: message_id.to_owned(),
            thread_id: call
                .thread_id
                .clone()
                .unwrap_or_else(|| format!("thread-{n}")),
            message_id: Some(format!("<provider-{n}@mail.cadence.test>")),
            subject: call.header("Subject").map(str::to_owned),
        })
    }

    async fn insert_sent(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_insert {
            return Err(ProviderError::Api {
                status: 400,
                message: "invalid raw".into(),
            });
        }
        state.inserts.push(decode(raw, thread_id));
        let n = state.inserts.len();
        Ok(ProviderMessageRef {
            id: format!("copy-{n}"),
            thread_id: thread_id.unwrap_or_default().to_owned(),
        })
    }

    async fn delete(&self, message_id: &str) -> Result<(), ProviderError> {
        self.state.lock().unwrap().deletes.push(message_id.to_owned());
        Ok(())
    }
}

// ── MockCredentials ──────────────────────────────────────────────────────────

pub struct MockCredentials {
    pub mailbox: MockMailbox,
    pub expired: bool,
}

impl MockCredentials {
    pub fn valid(mailbox: MockMailbox) -> Self {
        Self {
            mailbox,
            expired: false,
        }
    }

    pub fn expired() -> Self {
        Self {
            mailbox: MockMailbox::new(),
            expired: true,
        }
    }
}

impl CredentialProvider for MockCredentials {
    type Mailbox = MockMailbox;

    async fn get_valid_credential(
        &self,
        _user_id: UserId,
        _mailbox_id: MailboxId,
    ) -> Result<MockMailbox, SequencerError> {
        if self.expired {
            Err(SequencerError::CredentialExpired)
        } else {
            Ok(self.mailbox.clone())
        }
    }
}

pub type TestDispatcher = EmailDispatcher<MockCredentials, MockTrackingRepo, MockEventRepo>;

/// Dispatcher over in-memory repositories with no reconcile wait.
pub fn test_dispatcher(
    credentials: MockCredentials,
    trackings: MockTrackingRepo,
    events: MockEventRepo,
) -> TestDispatcher {
    EmailDispatcher {
        reconcile_delay: std::time::Duration::ZERO,
        ..EmailDispatcher::new(credentials, trackings, events, TRACKING_BASE_URL.to_owned())
    }
}
