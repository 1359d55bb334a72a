use std::sync::Arc;

use deadpool_redis::Pool as RedisPool;
use sea_orm::DatabaseConnection;

use crate::config::SequencerConfig;
use crate::infra::cache::RedisRateLimitStore;
use crate::infra::db::{
    DbContactRepository, DbEmailEventRepository, DbEmailThreadRepository,
    DbEmailTrackingRepository, DbSequenceContactRepository, DbSequenceRepository,
};
use crate::infra::gmail::DbCredentialProvider;
use crate::infra::queue::PgJobQueue;
use crate::usecase::dispatch::EmailDispatcher;
use crate::usecase::process_job::{ProcessSequenceUseCase, SendStepUseCase};
use crate::usecase::progression::{EnrollContactUseCase, RecordTerminalEventUseCase};
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::schedule::BusinessHoursScheduler;
use crate::usecase::thread_gate::ThreadEventGate;

pub type Dispatcher =
    EmailDispatcher<DbCredentialProvider, DbEmailTrackingRepository, DbEmailEventRepository>;

pub type SendStep = SendStepUseCase<
    DbSequenceRepository,
    DbContactRepository,
    DbSequenceContactRepository,
    DbEmailThreadRepository,
    DbEmailTrackingRepository,
    DbEmailEventRepository,
    Dispatcher,
    RedisRateLimitStore,
    PgJobQueue,
>;

pub type ProcessSequence =
    ProcessSequenceUseCase<DbSequenceRepository, DbSequenceContactRepository, PgJobQueue>;

/// Shared worker state. Cheap to clone; every repository borrows the pools.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub http: reqwest::Client,
    pub config: Arc<SequencerConfig>,
}

impl AppState {
    pub fn sequence_repo(&self) -> DbSequenceRepository {
        DbSequenceRepository {
            db: self.db.clone(),
        }
    }

    pub fn contact_repo(&self) -> DbContactRepository {
        DbContactRepository {
            db: self.db.clone(),
        }
    }

    pub fn sequence_contact_repo(&self) -> DbSequenceContactRepository {
        DbSequenceContactRepository {
            db: self.db.clone(),
        }
    }

    pub fn thread_repo(&self) -> DbEmailThreadRepository {
        DbEmailThreadRepository {
            db: self.db.clone(),
        }
    }

    pub fn tracking_repo(&self) -> DbEmailTrackingRepository {
        DbEmailTrackingRepository {
            db: self.db.clone(),
        }
    }

    pub fn event_repo(&self) -> DbEmailEventRepository {
        DbEmailEventRepository {
            db: self.db.clone(),
        }
    }

    pub fn job_queue(&self) -> PgJobQueue {
        PgJobQueue {
            db: self.db.clone(),
            max_attempts: self.config.job_max_attempts,
            lease: chrono::Duration::seconds(self.config.job_lease_secs),
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter<RedisRateLimitStore> {
        RateLimiter::new(RedisRateLimitStore {
            pool: self.redis.clone(),
        })
        .with_limit(
            self.config.rate_limit_max_sends,
            self.config.rate_limit_window_secs,
        )
    }

    pub fn credential_provider(&self) -> DbCredentialProvider {
        DbCredentialProvider {
            db: self.db.clone(),
            http: self.http.clone(),
            api_base_url: self.config.gmail_api_base_url.clone(),
        }
    }

    pub fn scheduler(&self) -> BusinessHoursScheduler {
        BusinessHoursScheduler::new(self.config.demo_mode)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        EmailDispatcher {
            reconcile_delay: std::time::Duration::from_millis(self.config.reconcile_delay_ms),
            ..EmailDispatcher::new(
                self.credential_provider(),
                self.tracking_repo(),
                self.event_repo(),
                self.config.tracking_base_url.clone(),
            )
        }
    }

    pub fn send_step(&self) -> SendStep {
        SendStepUseCase {
            sequences: self.sequence_repo(),
            contacts: self.contact_repo(),
            sequence_contacts: self.sequence_contact_repo(),
            threads: self.thread_repo(),
            trackings: self.tracking_repo(),
            gate: ThreadEventGate {
                events: self.event_repo(),
            },
            dispatcher: self.dispatcher(),
            rate_limiter: self.rate_limiter(),
            jobs: self.job_queue(),
            scheduler: self.scheduler(),
            rate_limit_retry: chrono::Duration::seconds(self.config.rate_limit_retry_secs),
            attempt_lease: chrono::Duration::seconds(self.config.job_lease_secs),
            disable_sending: self.config.disable_sending,
        }
    }

    pub fn process_sequence(&self) -> ProcessSequence {
        ProcessSequenceUseCase {
            sequences: self.sequence_repo(),
            sequence_contacts: self.sequence_contact_repo(),
            jobs: self.job_queue(),
            scheduler: self.scheduler(),
            batch_size: self.config.sweep_batch_size,
        }
    }

    pub fn enroll(
        &self,
    ) -> EnrollContactUseCase<DbSequenceRepository, DbSequenceContactRepository, PgJobQueue> {
        EnrollContactUseCase {
            sequences: self.sequence_repo(),
            sequence_contacts: self.sequence_contact_repo(),
            jobs: self.job_queue(),
            scheduler: self.scheduler(),
        }
    }

    pub fn terminal_events(
        &self,
    ) -> RecordTerminalEventUseCase<
        DbSequenceContactRepository,
        DbEmailTrackingRepository,
        DbEmailEventRepository,
    > {
        RecordTerminalEventUseCase {
            sequence_contacts: self.sequence_contact_repo(),
            trackings: self.tracking_repo(),
            events: self.event_repo(),
        }
    }
}
