//! Job worker. Polls the queue per job kind and runs claimed jobs under a
//! per-kind concurrency bound.
//!
//! Claimed jobs run to completion: shutdown stops claiming and then drains
//! the in-flight set, so a dispatch is never cancelled halfway.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::repository::JobLease;
use crate::domain::types::{ClaimedJob, JobKind, SequenceJob};
use crate::error::SequencerError;
use crate::state::AppState;
use crate::usecase::process_job::JobOutcome;

/// What the queue should do with a job after it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Complete,
    /// Run again at the given time without consuming an attempt.
    Defer(DateTime<Utc>),
    Fail { error: String, retryable: bool },
}

pub fn settle(result: &Result<JobOutcome, SequencerError>) -> Settlement {
    match result {
        Ok(JobOutcome::Deferred { until }) => Settlement::Defer(*until),
        Ok(_) => Settlement::Complete,
        Err(e) => Settlement::Fail {
            error: format!("{}: {e}", e.kind()),
            retryable: e.is_retryable(),
        },
    }
}

struct Lane {
    kind: JobKind,
    permits: Arc<Semaphore>,
}

pub struct Worker {
    state: AppState,
    lanes: Vec<Lane>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(state: AppState) -> Self {
        let lanes = vec![
            Lane {
                kind: JobKind::SendStep,
                permits: Arc::new(Semaphore::new(state.config.send_concurrency.max(1))),
            },
            Lane {
                kind: JobKind::ProcessSequence,
                permits: Arc::new(Semaphore::new(state.config.sweep_concurrency.max(1))),
            },
        ];
        let poll_interval = Duration::from_millis(state.config.poll_interval_ms);
        Self {
            state,
            lanes,
            poll_interval,
        }
    }

    /// Poll until `shutdown` resolves, then wait for every running job.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();
        tracing::info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "worker started");

        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }
            for lane in &self.lanes {
                self.fill(lane, &mut tasks).await;
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!(in_flight = tasks.len(), "worker stopping, draining in-flight jobs");
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::info!("worker stopped");
    }

    async fn fill(&self, lane: &Lane, tasks: &mut JoinSet<()>) {
        let free = lane.permits.available_permits();
        if free == 0 {
            return;
        }
        let claimed = match self.state.job_queue().claim(lane.kind, free as u64).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(kind = lane.kind.as_str(), error = %e, "claim failed");
                return;
            }
        };
        for job in claimed {
            let Ok(permit) = Arc::clone(&lane.permits).acquire_owned().await else {
                return;
            };
            let state = self.state.clone();
            tasks.spawn(async move {
                let _permit = permit;
                run_job(&state, job).await;
            });
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "job task panicked");
    }
}

async fn run_job(state: &AppState, claimed: ClaimedJob) {
    let now = Utc::now();
    let result = match &claimed.job {
        SequenceJob::SendStep {
            sequence_id,
            contact_id,
            step_id,
        } => {
            state
                .send_step()
                .execute(*sequence_id, *contact_id, *step_id, now)
                .await
        }
        SequenceJob::ProcessSequence { sequence_id } => {
            state.process_sequence().execute(*sequence_id, now).await
        }
    };

    let queue = state.job_queue();
    let settled = match settle(&result) {
        Settlement::Complete => {
            tracing::debug!(job_id = %claimed.id, outcome = ?result, "job done");
            queue.complete(claimed.id).await
        }
        Settlement::Defer(until) => {
            tracing::debug!(job_id = %claimed.id, %until, "job deferred");
            queue.defer(claimed.id, until).await
        }
        Settlement::Fail { error, retryable } => {
            tracing::error!(
                job_id = %claimed.id,
                dedup_key = %claimed.job.dedup_key(),
                attempts = claimed.attempts + 1,
                retryable,
                error = %error,
                "job failed"
            );
            queue.fail(&claimed, &error, retryable).await
        }
    };
    if let Err(e) = settled {
        // The lease expires and the job is claimed again.
        tracing::error!(job_id = %claimed.id, error = %e, "could not settle job");
    }
}
