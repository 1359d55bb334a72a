use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, DatabaseConnection, DbBackend,
    FromQueryResult, Statement,
};
use uuid::Uuid;

use cadence_sequencer_schema::sequence_jobs;

use crate::domain::repository::{JobLease, JobQueue};
use crate::domain::types::{ClaimedJob, JobKind, SequenceJob};
use crate::error::SequencerError;

const BACKOFF_BASE_SECS: i64 = 30;
const BACKOFF_MAX_SECS: i64 = 60 * 60;

/// Delay before retry number `attempts` (1-based): 30s doubling, capped at 1h.
pub fn retry_backoff(attempts: i32) -> Duration {
    let exp = attempts.saturating_sub(1).clamp(0, 16) as u32;
    Duration::seconds((BACKOFF_BASE_SECS << exp).min(BACKOFF_MAX_SECS))
}

/// `sequence_jobs`-backed queue. At most one active row per dedup key; a
/// claimed row is leased for `lease` and becomes claimable again afterwards.
#[derive(Clone)]
pub struct PgJobQueue {
    pub db: DatabaseConnection,
    pub max_attempts: i32,
    pub lease: Duration,
}

#[derive(Debug, FromQueryResult)]
struct ClaimedRow {
    id: Uuid,
    payload: serde_json::Value,
    attempts: i32,
    max_attempts: i32,
}

impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        job: &SequenceJob,
        run_at: DateTime<Utc>,
    ) -> Result<bool, SequencerError> {
        let payload = serde_json::to_value(job).context("serialize job payload")?;
        let now = Utc::now();
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO sequence_jobs
                    (id, kind, payload, dedup_key, attempts, max_attempts, run_at, created_at)
                VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
                ON CONFLICT (dedup_key) WHERE processed_at IS NULL AND failed_at IS NULL
                DO NOTHING
                "#,
                [
                    Uuid::now_v7().into(),
                    job.kind().as_str().into(),
                    payload.into(),
                    job.dedup_key().into(),
                    self.max_attempts.into(),
                    run_at.into(),
                    now.into(),
                ],
            ))
            .await
            .context("enqueue sequence job")?;
        let inserted = result.rows_affected() > 0;
        if !inserted {
            tracing::debug!(dedup_key = %job.dedup_key(), "job already queued");
        }
        Ok(inserted)
    }
}

impl JobLease for PgJobQueue {
    async fn claim(&self, kind: JobKind, limit: u64) -> Result<Vec<ClaimedJob>, SequencerError> {
        let now = Utc::now();
        let rows = ClaimedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE sequence_jobs SET locked_at = $3
            WHERE id IN (
                SELECT id FROM sequence_jobs
                WHERE kind = $1
                  AND processed_at IS NULL
                  AND failed_at IS NULL
                  AND run_at <= $3
                  AND (locked_at IS NULL OR locked_at < $4)
                ORDER BY run_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, attempts, max_attempts
            "#,
            [
                kind.as_str().into(),
                (limit as i64).into(),
                now.into(),
                (now - self.lease).into(),
            ],
        ))
        .all(&self.db)
        .await
        .context("claim sequence jobs")?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<SequenceJob>(row.payload) {
                Ok(job) => claimed.push(ClaimedJob {
                    id: row.id,
                    job,
                    attempts: row.attempts,
                    max_attempts: row.max_attempts,
                }),
                Err(e) => {
                    tracing::error!(job_id = %row.id, error = %e, "undecodable job payload");
                    sequence_jobs::ActiveModel {
                        id: Set(row.id),
                        last_error: Set(Some(format!("undecodable payload: {e}"))),
                        failed_at: Set(Some(now)),
                        locked_at: Set(None),
                        ..Default::default()
                    }
                    .update(&self.db)
                    .await
                    .context("fail undecodable job")?;
                }
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, id: Uuid) -> Result<(), SequencerError> {
        sequence_jobs::ActiveModel {
            id: Set(id),
            processed_at: Set(Some(Utc::now())),
            locked_at: Set(None),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("complete sequence job")?;
        Ok(())
    }

    async fn defer(&self, id: Uuid, run_at: DateTime<Utc>) -> Result<(), SequencerError> {
        sequence_jobs::ActiveModel {
            id: Set(id),
            run_at: Set(run_at),
            locked_at: Set(None),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("defer sequence job")?;
        Ok(())
    }

    async fn fail(
        &self,
        job: &ClaimedJob,
        error: &str,
        retryable: bool,
    ) -> Result<(), SequencerError> {
        let now = Utc::now();
        let attempts = job.attempts + 1;
        let terminal = !retryable || attempts >= job.max_attempts;
        let mut model = sequence_jobs::ActiveModel {
            id: Set(job.id),
            attempts: Set(attempts),
            last_error: Set(Some(error.to_owned())),
            locked_at: Set(None),
            ..Default::default()
        };
        if terminal {
            model.failed_at = Set(Some(now));
        } else {
            model.run_at = Set(now + retry_backoff(attempts));
        }
        model.update(&self.db).await.context("fail sequence job")?;
        Ok(())
    }
}
