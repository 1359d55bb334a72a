use chrono::{DateTime, Duration, TimeZone, Utc};

use cadence_domain::id::{ContactId, StepId, TrackingId};
use cadence_domain::status::{
    EmailEventKind, SequenceContactStatus, SequenceStatus, TrackingStatus,
};

use cadence_sequencer::domain::repository::EmailTrackingRepository;
use cadence_sequencer::domain::types::{
    Contact, EmailTracking, Sequence, SequenceContact, SequenceJob, SequenceStep, ThreadContext,
    TrackingMetadata,
};
use cadence_sequencer::error::SequencerError;
use cadence_sequencer::usecase::process_job::{
    JobOutcome, ProcessSequenceUseCase, SendStepUseCase, SkipReason,
};
use cadence_sequencer::usecase::progression::{EnrollContactUseCase, RecordTerminalEventUseCase};
use cadence_sequencer::usecase::rate_limit::{RateLimitTarget, RateLimiter};
use cadence_sequencer::usecase::schedule::BusinessHoursScheduler;
use cadence_sequencer::usecase::thread_gate::ThreadEventGate;

use crate::helpers::{
    InMemoryRateLimitStore, MockContactRepo, MockCredentials, MockEventRepo, MockJobQueue,
    MockMailbox, MockSequenceContactRepo, MockSequenceRepo, MockThreadRepo, MockTrackingRepo,
    TestDispatcher, enrolled, monday_morning, test_contact, test_dispatcher, test_sequence,
    test_steps,
};

type SendStep = SendStepUseCase<
    MockSequenceRepo,
    MockContactRepo,
    MockSequenceContactRepo,
    MockThreadRepo,
    MockTrackingRepo,
    MockEventRepo,
    TestDispatcher,
    InMemoryRateLimitStore,
    MockJobQueue,
>;

/// One sequence, one enrolled contact, and handles onto every store.
struct Harness {
    sequence: Sequence,
    steps: Vec<SequenceStep>,
    contact: Contact,
    records: MockSequenceContactRepo,
    threads: MockThreadRepo,
    trackings: MockTrackingRepo,
    events: MockEventRepo,
    jobs: MockJobQueue,
    rate_store: InMemoryRateLimitStore,
    mailbox: MockMailbox,
}

impl Harness {
    fn new(step_count: i32) -> Self {
        Self::with_sequence(test_sequence(), step_count)
    }

    fn with_sequence(sequence: Sequence, step_count: i32) -> Self {
        let steps = test_steps(sequence.id, step_count);
        let contact = test_contact();
        let records = MockSequenceContactRepo::new(vec![enrolled(
            sequence.id,
            contact.id,
            monday_morning(),
        )]);
        Self {
            sequence,
            steps,
            contact,
            records,
            threads: MockThreadRepo::default(),
            trackings: MockTrackingRepo::default(),
            events: MockEventRepo::default(),
            jobs: MockJobQueue::default(),
            rate_store: InMemoryRateLimitStore::default(),
            mailbox: MockMailbox::new(),
        }
    }

    fn send_step(&self) -> SendStep {
        SendStepUseCase {
            sequences: MockSequenceRepo::new(self.sequence.clone(), self.steps.clone()),
            contacts: MockContactRepo::new(vec![self.contact.clone()]),
            sequence_contacts: self.records.clone(),
            threads: self.threads.clone(),
            trackings: self.trackings.clone(),
            gate: ThreadEventGate {
                events: self.events.clone(),
            },
            dispatcher: test_dispatcher(
                MockCredentials::valid(self.mailbox.clone()),
                self.trackings.clone(),
                self.events.clone(),
            ),
            rate_limiter: RateLimiter::new(self.rate_store.clone()),
            jobs: self.jobs.clone(),
            scheduler: BusinessHoursScheduler::default(),
            rate_limit_retry: Duration::hours(1),
            attempt_lease: Duration::minutes(5),
            disable_sending: false,
        }
    }

    fn record(&self) -> SequenceContact {
        self.records.get(self.sequence.id, self.contact.id)
    }

    async fn run(&self, order: i32, now: DateTime<Utc>) -> Result<JobOutcome, SequencerError> {
        self.send_step()
            .execute(self.sequence.id, self.contact.id, self.step(order), now)
            .await
    }

    fn step(&self, order: i32) -> StepId {
        self.steps[(order - 1) as usize].id
    }

    /// Simulate another worker having claimed the attempt at `at`.
    fn hold_attempt(&self, at: DateTime<Utc>) {
        let handle = self.records.records_handle();
        handle.lock().unwrap()[0].last_processed_at = Some(at);
    }

    fn target(&self) -> RateLimitTarget {
        RateLimitTarget::new(self.sequence.user_id)
            .sequence(self.sequence.id)
            .contact(self.contact.id)
    }
}

// ── SendStepUseCase: progression ─────────────────────────────────────────────

#[tokio::test]
async fn should_complete_three_step_sequence() {
    let h = Harness::new(3);
    h.mailbox.state_handle().lock().unwrap().context = Some(ThreadContext {
        message_id: "<provider-1@mail.cadence.test>".into(),
        references: vec!["<provider-1@mail.cadence.test>".into()],
        subject: "Hello Jane".into(),
    });

    let mut now = monday_morning();
    for order in 1..=3 {
        let outcome = h.run(order, now).await.unwrap();
        assert!(
            matches!(outcome, JobOutcome::Sent { last_step, .. } if last_step == (order == 3)),
            "step {order}: {outcome:?}"
        );
        if order < 3 {
            let record = h.record();
            assert_eq!(record.status, SequenceContactStatus::InProgress);
            assert_eq!(record.current_step, order + 1);
            now = record.next_scheduled_at.expect("next step scheduled");
        }
    }

    let record = h.record();
    assert_eq!(record.status, SequenceContactStatus::Completed);
    assert!(record.completed);
    assert_eq!(record.current_step, 3);
    assert!(record.next_scheduled_at.is_none());
    assert_eq!(record.thread_id.as_deref(), Some("thread-1"));

    // Follow-ups were queued for steps 2 and 3 and replied into the first thread.
    let jobs = h.jobs.jobs_handle();
    let jobs = jobs.lock().unwrap();
    assert_eq!(jobs.len(), 2);
    let provider = h.mailbox.state_handle();
    let provider = provider.lock().unwrap();
    assert_eq!(provider.sends.len(), 3);
    assert_eq!(provider.sends[0].header("Subject"), Some("Hello Jane"));
    assert!(provider.sends[0].thread_id.is_none());
    for call in &provider.sends[1..] {
        assert_eq!(call.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(call.header("Subject"), Some("Re: Hello Jane"));
        assert_eq!(
            call.header("In-Reply-To"),
            Some("<provider-1@mail.cadence.test>")
        );
    }

    assert_eq!(h.threads.threads_handle().lock().unwrap().len(), 1);
    let sent_events = h
        .events
        .events_handle()
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind == EmailEventKind::Sent)
        .count();
    assert_eq!(sent_events, 3);
}

#[tokio::test]
async fn should_schedule_next_step_in_business_days() {
    let h = Harness::new(2);

    h.run(1, monday_morning()).await.unwrap();

    let expected = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
    assert_eq!(h.record().next_scheduled_at, Some(expected));
    let jobs = h.jobs.jobs_handle();
    let jobs = jobs.lock().unwrap();
    assert_eq!(
        jobs[0],
        (
            SequenceJob::SendStep {
                sequence_id: h.sequence.id,
                contact_id: h.contact.id,
                step_id: h.step(2),
            },
            expected
        )
    );
}

#[tokio::test]
async fn should_personalize_subject_and_body() {
    let h = Harness::new(1);

    h.run(1, monday_morning()).await.unwrap();

    let provider = h.mailbox.state_handle();
    let provider = provider.lock().unwrap();
    assert_eq!(provider.sends[0].header("Subject"), Some("Hello Jane"));
    assert!(provider.sends[0].body.contains("Step 1 for Acme"));
    assert_eq!(provider.sends[0].header("To"), Some("jane@acme.test"));
}

#[tokio::test]
async fn should_count_send_against_every_scope() {
    let h = Harness::new(2);

    h.run(1, monday_morning()).await.unwrap();

    let decision = RateLimiter::new(h.rate_store.clone())
        .check_rate_limit(h.target())
        .await;
    assert_eq!(decision.current, 1);
}

#[tokio::test]
async fn should_fail_contact_when_step_two_dispatch_fails() {
    let h = Harness::new(3);
    h.run(1, monday_morning()).await.unwrap();
    let now = h.record().next_scheduled_at.unwrap();
    h.mailbox.state_handle().lock().unwrap().fail_send = true;

    let result = h.run(2, now).await;

    assert!(
        matches!(result, Err(SequencerError::ProviderSendFailed(_))),
        "expected ProviderSendFailed, got {result:?}"
    );
    let record = h.record();
    assert_eq!(record.status, SequenceContactStatus::Failed);
    assert_eq!(record.current_step, 2);
    // Nothing further was queued beyond the step that failed.
    assert_eq!(h.jobs.jobs_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_fail_contact_on_expired_credential_without_retry() {
    let h = Harness::new(2);
    let mut usecase = h.send_step();
    usecase.dispatcher = test_dispatcher(
        MockCredentials::expired(),
        h.trackings.clone(),
        h.events.clone(),
    );

    let result = usecase
        .execute(h.sequence.id, h.contact.id, h.step(1), monday_morning())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SequencerError::CredentialExpired));
    assert!(!err.is_retryable());
    assert_eq!(h.record().status, SequenceContactStatus::Failed);
    assert_eq!(h.record().current_step, 1);
}

#[tokio::test]
async fn should_fail_contact_when_next_delay_is_unschedulable() {
    let mut h = Harness::new(2);
    h.steps[1].delay_amount = 100_000_000;

    let err = h.run(1, monday_morning()).await.unwrap_err();

    assert!(matches!(err, SequencerError::InvalidStepDelay(_)));
    assert!(!err.is_retryable());
    assert_eq!(h.record().status, SequenceContactStatus::Failed);
    assert_eq!(h.record().current_step, 1);
    assert!(h.mailbox.state_handle().lock().unwrap().sends.is_empty());
    assert!(h.jobs.jobs_handle().lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_simulate_every_step_when_sending_disabled() {
    let mut sequence = test_sequence();
    sequence.disable_sending = true;
    let h = Harness::with_sequence(sequence, 2);

    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert!(matches!(outcome, JobOutcome::Sent { .. }));
    assert!(h.mailbox.state_handle().lock().unwrap().sends.is_empty());
    let record = h.record();
    assert!(record.thread_id.unwrap().starts_with("fake-thread-"));
    let trackings = h.trackings.trackings_handle();
    let trackings = trackings.lock().unwrap();
    assert_eq!(trackings[0].status, TrackingStatus::Sent);
}

#[tokio::test]
async fn should_fail_contact_when_middle_step_missing() {
    let mut h = Harness::new(3);
    h.steps.retain(|s| s.order != 2);

    let result = h.run(1, monday_morning()).await;

    assert!(
        matches!(result, Err(SequencerError::StepNotFound { order: 2 })),
        "expected StepNotFound(2), got {result:?}"
    );
    assert_eq!(h.record().status, SequenceContactStatus::Failed);
    assert!(h.mailbox.state_handle().lock().unwrap().sends.is_empty());
}

#[tokio::test]
async fn should_schedule_demo_follow_up_within_same_day() {
    let h = Harness::new(2);
    let mut usecase = h.send_step();
    usecase.scheduler = BusinessHoursScheduler::new(true);

    usecase
        .execute(h.sequence.id, h.contact.id, h.step(1), monday_morning())
        .await
        .unwrap();

    let expected = Utc.with_ymd_and_hms(2026, 10, 19, 18, 0, 0).unwrap();
    assert_eq!(h.record().next_scheduled_at, Some(expected));
}

// ── SendStepUseCase: gating ──────────────────────────────────────────────────

#[tokio::test]
async fn should_skip_inactive_sequence() {
    let mut sequence = test_sequence();
    sequence.status = SequenceStatus::Paused;
    let h = Harness::with_sequence(sequence, 1);

    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::SequenceInactive));
    assert_eq!(h.record().status, SequenceContactStatus::Pending);
}

#[tokio::test]
async fn should_reject_unknown_sequence_as_non_retryable() {
    let h = Harness::new(1);
    let mut usecase = h.send_step();
    usecase.sequences = MockSequenceRepo::new(test_sequence(), vec![]);

    let err = usecase
        .execute(h.sequence.id, h.contact.id, h.step(1), monday_morning())
        .await
        .unwrap_err();

    assert!(matches!(err, SequencerError::SequenceNotFound));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn should_halt_after_reply() {
    let h = Harness::new(2);
    h.run(1, monday_morning()).await.unwrap();
    let now = h.record().next_scheduled_at.unwrap();
    RecordTerminalEventUseCase {
        sequence_contacts: h.records.clone(),
        trackings: h.trackings.clone(),
        events: h.events.clone(),
    }
    .record_reply(h.sequence.id, h.contact.id, None, now)
    .await
    .unwrap();

    let outcome = h.run(2, now).await.unwrap();

    assert_eq!(outcome, JobOutcome::Halted);
    assert_eq!(h.mailbox.state_handle().lock().unwrap().sends.len(), 1);
    assert_eq!(h.record().current_step, 2);
}

#[tokio::test]
async fn should_skip_bounced_contact() {
    let h = Harness::new(2);
    let tracking_id = TrackingId::new();
    h.trackings
        .create(&EmailTracking {
            id: tracking_id,
            hash: "h".repeat(32),
            metadata: TrackingMetadata {
                email: h.contact.email.clone(),
                user_id: h.sequence.user_id,
                sequence_id: h.sequence.id,
                step_id: h.step(1),
                contact_id: h.contact.id,
                untracked_message_id: None,
                simulated: false,
            },
            status: TrackingStatus::Sent,
            created_at: monday_morning(),
        })
        .await
        .unwrap();

    RecordTerminalEventUseCase {
        sequence_contacts: h.records.clone(),
        trackings: h.trackings.clone(),
        events: h.events.clone(),
    }
    .record_bounce(h.sequence.id, h.contact.id, Some(tracking_id), monday_morning())
    .await
    .unwrap();
    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Skipped(SkipReason::ContactAbsorbing(SequenceContactStatus::Bounced))
    );
    let record = h.record();
    assert_eq!(record.status, SequenceContactStatus::Bounced);
    assert!(record.next_scheduled_at.is_none());
    assert_eq!(
        h.trackings.trackings_handle().lock().unwrap()[0].status,
        TrackingStatus::Bounced
    );
    let gate = ThreadEventGate {
        events: h.events.clone(),
    };
    assert!(
        !gate
            .should_proceed(None, h.sequence.id, h.contact.id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn should_defer_rate_limited_send_without_touching_progression() {
    let h = Harness::new(2);
    let limiter = RateLimiter::new(h.rate_store.clone());
    for _ in 0..50 {
        limiter
            .increment_counters(RateLimitTarget::new(h.sequence.user_id))
            .await
            .unwrap();
    }
    let before = h.record();

    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Deferred {
            until: monday_morning() + Duration::hours(1)
        }
    );
    assert_eq!(h.record(), before);
    assert!(h.mailbox.state_handle().lock().unwrap().sends.is_empty());
}

#[tokio::test]
async fn should_defer_cooling_down_contact_until_cooldown_ends() {
    let h = Harness::new(2);
    RateLimiter::new(h.rate_store.clone())
        .add_cooldown(h.contact.id, 60_000)
        .await
        .unwrap();

    let outcome = h.run(1, monday_morning()).await.unwrap();

    let JobOutcome::Deferred { until } = outcome else {
        panic!("expected Deferred, got {outcome:?}");
    };
    assert!(until > monday_morning());
    assert!(until <= monday_morning() + Duration::seconds(60));
    assert_eq!(h.record().status, SequenceContactStatus::Pending);
}

#[tokio::test]
async fn should_defer_step_that_is_not_due() {
    let h = Harness::new(2);
    let early = monday_morning() - Duration::minutes(30);

    let outcome = h.run(1, early).await.unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Deferred {
            until: monday_morning()
        }
    );
}

// ── SendStepUseCase: redelivery ──────────────────────────────────────────────

#[tokio::test]
async fn should_skip_redelivered_job_after_advance() {
    let h = Harness::new(3);
    h.run(1, monday_morning()).await.unwrap();

    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::StaleStep));
    assert_eq!(h.mailbox.state_handle().lock().unwrap().sends.len(), 1);
}

#[tokio::test]
async fn should_skip_when_another_attempt_holds_the_contact() {
    let h = Harness::new(2);
    h.hold_attempt(monday_morning() - Duration::minutes(1));

    let outcome = h.run(1, monday_morning()).await.unwrap();

    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::LostRace));
    assert!(h.mailbox.state_handle().lock().unwrap().sends.is_empty());
}

#[tokio::test]
async fn should_finish_progression_without_resending_after_storage_failure() {
    let h = Harness::new(3);
    h.records.fail_next_advance();

    let err = h.run(1, monday_morning()).await.unwrap_err();
    assert_eq!(err.kind(), "STORAGE_UNAVAILABLE");
    assert!(err.is_retryable());
    assert_eq!(h.record().current_step, 1);

    // Retried inside the attempt lease.
    let outcome = h
        .run(1, monday_morning() + Duration::seconds(30))
        .await
        .unwrap();

    let tracking_id = h.trackings.sent_handle().lock().unwrap()[0].0;
    assert_eq!(
        outcome,
        JobOutcome::Sent {
            tracking_id,
            last_step: false
        }
    );
    assert_eq!(h.mailbox.state_handle().lock().unwrap().sends.len(), 1);
    let record = h.record();
    assert_eq!(record.current_step, 2);
    assert_eq!(record.status, SequenceContactStatus::InProgress);
    assert!(record.thread_id.is_some());
    assert_eq!(h.threads.threads_handle().lock().unwrap().len(), 1);
    let jobs = h.jobs.jobs_handle();
    let jobs = jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].0,
        SequenceJob::SendStep {
            sequence_id: h.sequence.id,
            contact_id: h.contact.id,
            step_id: h.step(2),
        }
    );
}

#[tokio::test]
async fn should_send_again_after_reenrollment() {
    let h = Harness::new(2);
    h.run(1, monday_morning()).await.unwrap();
    let rejoined = monday_morning() + Duration::days(1);
    h.records.records_handle().lock().unwrap()[0] =
        enrolled(h.sequence.id, h.contact.id, rejoined);

    let outcome = h.run(1, rejoined).await.unwrap();

    assert!(matches!(outcome, JobOutcome::Sent { .. }));
    assert_eq!(h.mailbox.state_handle().lock().unwrap().sends.len(), 2);
}

#[tokio::test]
async fn should_resume_failed_contact_on_retry() {
    let h = Harness::new(2);
    h.mailbox.state_handle().lock().unwrap().fail_send = true;
    h.run(1, monday_morning()).await.unwrap_err();
    assert_eq!(h.record().status, SequenceContactStatus::Failed);

    h.mailbox.state_handle().lock().unwrap().fail_send = false;
    let outcome = h
        .run(1, monday_morning() + Duration::minutes(2))
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::Sent { .. }));
    assert_eq!(h.record().current_step, 2);
}

// ── ProcessSequenceUseCase ───────────────────────────────────────────────────

type Sweep = ProcessSequenceUseCase<MockSequenceRepo, MockSequenceContactRepo, MockJobQueue>;

fn sweep(h: &Harness, demo_mode: bool) -> Sweep {
    ProcessSequenceUseCase {
        sequences: MockSequenceRepo::new(h.sequence.clone(), h.steps.clone()),
        sequence_contacts: h.records.clone(),
        jobs: h.jobs.clone(),
        scheduler: BusinessHoursScheduler::new(demo_mode),
        batch_size: 100,
    }
}

#[tokio::test]
async fn should_enqueue_due_contacts_once() {
    let h = Harness::new(2);
    let later = ContactId::new();
    let mut not_due = enrolled(h.sequence.id, later, monday_morning());
    not_due.next_scheduled_at = Some(monday_morning() + Duration::days(1));
    h.records.records_handle().lock().unwrap().push(not_due);

    let first = sweep(&h, false)
        .execute(h.sequence.id, monday_morning())
        .await
        .unwrap();
    let second = sweep(&h, false)
        .execute(h.sequence.id, monday_morning())
        .await
        .unwrap();

    assert_eq!(first, JobOutcome::Completed { due: 1, enqueued: 1 });
    assert_eq!(second, JobOutcome::Completed { due: 1, enqueued: 0 });
    let jobs = h.jobs.jobs_handle();
    let jobs = jobs.lock().unwrap();
    assert_eq!(
        jobs[0].0,
        SequenceJob::SendStep {
            sequence_id: h.sequence.id,
            contact_id: h.contact.id,
            step_id: h.step(1),
        }
    );
}

#[tokio::test]
async fn should_defer_sweep_to_next_processing_window() {
    let h = Harness::new(1);
    let saturday = Utc.with_ymd_and_hms(2026, 10, 24, 12, 0, 0).unwrap();

    let outcome = sweep(&h, false)
        .execute(h.sequence.id, saturday)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Deferred {
            until: Utc.with_ymd_and_hms(2026, 10, 26, 9, 0, 0).unwrap()
        }
    );
    assert!(h.jobs.jobs_handle().lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_sweep_outside_window_in_demo_mode() {
    let h = Harness::new(1);
    let saturday = Utc.with_ymd_and_hms(2026, 10, 24, 12, 0, 0).unwrap();

    let outcome = sweep(&h, true)
        .execute(h.sequence.id, saturday)
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Completed { due: 1, enqueued: 1 });
}

// ── EnrollContactUseCase ─────────────────────────────────────────────────────

#[tokio::test]
async fn should_enroll_contact_once() {
    let sequence = test_sequence();
    let steps = test_steps(sequence.id, 2);
    let records = MockSequenceContactRepo::empty();
    let jobs = MockJobQueue::default();
    let usecase = EnrollContactUseCase {
        sequences: MockSequenceRepo::new(sequence.clone(), steps.clone()),
        sequence_contacts: records.clone(),
        jobs: jobs.clone(),
        scheduler: BusinessHoursScheduler::default(),
    };
    let contact_id = ContactId::new();

    let first = usecase
        .execute(sequence.id, contact_id, monday_morning())
        .await
        .unwrap();
    let second = usecase
        .execute(sequence.id, contact_id, monday_morning())
        .await
        .unwrap();

    assert!(first);
    assert!(!second);

    let record = records.get(sequence.id, contact_id);
    assert_eq!(record.status, SequenceContactStatus::Pending);
    assert_eq!(record.current_step, 1);
    assert_eq!(record.next_scheduled_at, Some(monday_morning()));
    let jobs = jobs.jobs_handle();
    let jobs = jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].0,
        SequenceJob::SendStep {
            sequence_id: sequence.id,
            contact_id,
            step_id: steps[0].id,
        }
    );
}
