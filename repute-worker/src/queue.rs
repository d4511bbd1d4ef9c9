/// Reputation job queue
///
/// Jobs live in the `reputation_jobs` table. The worker claims due pending
/// jobs with `FOR UPDATE SKIP LOCKED` so several workers can drain the
/// same table without double-processing.
///
/// # Lifecycle
///
/// ```text
/// pending ──claim──> running ──> succeeded
///    ^                  │
///    └──retry/backoff───┴──> failed
/// ```
///
/// A claim increments `attempts`. A failed job goes back to pending with an
/// exponential delay while attempts remain, unless another pending job for
/// the same user already exists: that job will recompute the same score,
/// so this one is closed as superseded.
///
/// # Example
///
/// ```no_run
/// use repute_worker::queue::{ReputationJobQueue, RetryPolicy};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = ReputationJobQueue::new(pool, RetryPolicy::default());
/// for job in queue.claim_jobs(5).await? {
///     println!("Claimed job {} for user {}", job.id, job.user_id);
/// }
/// # Ok(())
/// # }
/// ```

use repute_shared::models::reputation_job::{JobState, ReputationJob};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on a single retry delay
pub const MAX_BACKOFF_SECS: u64 = 300;

const STALE_JOB_ERROR: &str = "Abandoned while running";

const CLAIMED_COLUMNS: &str = "j.id, j.tenant_id, j.user_id, j.reason, j.state, j.attempts, \
                               j.last_error, j.run_after, j.created_at, j.started_at, j.ended_at";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The job was not in the `running` state
    #[error("Job not running: {0}")]
    JobNotRunning(Uuid),
}

/// How failed jobs are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub base_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_backoff_secs: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` once attempts are used up
    ///
    /// `attempts` is the count including the attempt that just failed.
    pub fn next_delay(&self, attempts: i32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }

        let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
        let secs = self
            .base_backoff_secs
            .saturating_mul(1_u64 << exponent)
            .min(MAX_BACKOFF_SECS);
        Some(Duration::from_secs(secs))
    }
}

/// What happened to a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to pending after `delay`
    Retrying { delay: Duration },

    /// Another pending job for the same user will do the work
    Superseded,

    /// No attempts left, or the failure cannot succeed on retry
    Exhausted,
}

/// Result of returning abandoned jobs at start-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleReset {
    pub requeued: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct ReputationJobQueue {
    db: PgPool,
    retry: RetryPolicy,
}

impl ReputationJobQueue {
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        ReputationJobQueue { db, retry }
    }

    /// Claims up to `limit` due pending jobs, oldest first, and marks them running
    pub async fn claim_jobs(&self, limit: usize) -> Result<Vec<ReputationJob>, QueueError> {
        let query = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM reputation_jobs
                WHERE state = $1 AND run_after <= NOW()
                ORDER BY run_after ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE reputation_jobs j
            SET
                state = $3,
                attempts = j.attempts + 1,
                started_at = NOW(),
                ended_at = NULL
            FROM due
            WHERE j.id = due.id
            RETURNING {CLAIMED_COLUMNS}
            "#
        );

        let jobs = sqlx::query_as::<_, ReputationJob>(&query)
            .bind(JobState::Pending)
            .bind(limit as i64)
            .bind(JobState::Running)
            .fetch_all(&self.db)
            .await?;

        if !jobs.is_empty() {
            tracing::debug!(count = jobs.len(), "Claimed reputation jobs");
        }

        Ok(jobs)
    }

    pub async fn mark_succeeded(&self, job_id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE reputation_jobs
            SET state = $2, ended_at = NOW(), last_error = NULL
            WHERE id = $1 AND state = $3
            "#,
        )
        .bind(job_id)
        .bind(JobState::Succeeded)
        .bind(JobState::Running)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotRunning(job_id));
        }

        Ok(())
    }

    /// Records a failure and either schedules a retry or closes the job
    pub async fn mark_failed(
        &self,
        job: &ReputationJob,
        error: &str,
    ) -> Result<FailureOutcome, QueueError> {
        let Some(delay) = self.retry.next_delay(job.attempts) else {
            self.close_failed(job.id, error).await?;
            return Ok(FailureOutcome::Exhausted);
        };

        let requeue = sqlx::query(
            r#"
            UPDATE reputation_jobs j
            SET
                state = $2,
                last_error = $3,
                run_after = NOW() + make_interval(secs => $4),
                ended_at = NOW()
            WHERE j.id = $1
              AND j.state = $5
              AND NOT EXISTS (
                  SELECT 1 FROM reputation_jobs p
                  WHERE p.tenant_id = j.tenant_id
                    AND p.user_id = j.user_id
                    AND p.state = $2
              )
            "#,
        )
        .bind(job.id)
        .bind(JobState::Pending)
        .bind(error)
        .bind(delay.as_secs_f64())
        .bind(JobState::Running)
        .execute(&self.db)
        .await;

        match requeue {
            Ok(result) if result.rows_affected() > 0 => Ok(FailureOutcome::Retrying { delay }),
            Ok(_) => {
                self.close_failed(job.id, error).await?;
                Ok(FailureOutcome::Superseded)
            }
            // A pending job was enqueued between the check and the update
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                self.close_failed(job.id, error).await?;
                Ok(FailureOutcome::Superseded)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Closes a running job as failed without retry
    pub async fn close_failed(&self, job_id: Uuid, error: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE reputation_jobs
            SET state = $2, last_error = $3, ended_at = NOW()
            WHERE id = $1 AND state = $4
            "#,
        )
        .bind(job_id)
        .bind(JobState::Failed)
        .bind(error)
        .bind(JobState::Running)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotRunning(job_id));
        }

        Ok(())
    }

    /// Returns jobs left running by a stopped worker to the queue
    ///
    /// One stale job per user goes back to pending, and only when the user
    /// has no pending job already. The others are closed as failed.
    pub async fn reset_stale(&self, stale_after: Duration) -> Result<StaleReset, QueueError> {
        let requeued: Vec<bool> = sqlx::query_scalar(
            r#"
            WITH stale AS (
                SELECT id, tenant_id, user_id
                FROM reputation_jobs
                WHERE state = $1 AND started_at < NOW() - make_interval(secs => $2)
                FOR UPDATE SKIP LOCKED
            ),
            revived AS (
                SELECT DISTINCT ON (s.tenant_id, s.user_id) s.id
                FROM stale s
                WHERE NOT EXISTS (
                    SELECT 1 FROM reputation_jobs p
                    WHERE p.tenant_id = s.tenant_id
                      AND p.user_id = s.user_id
                      AND p.state = $3
                )
                ORDER BY s.tenant_id, s.user_id, s.id
            )
            UPDATE reputation_jobs j
            SET
                state = CASE WHEN j.id IN (SELECT id FROM revived) THEN $3 ELSE $4 END,
                last_error = CASE WHEN j.id IN (SELECT id FROM revived) THEN j.last_error ELSE $5 END,
                run_after = NOW(),
                ended_at = CASE WHEN j.id IN (SELECT id FROM revived) THEN NULL ELSE NOW() END
            FROM stale
            WHERE j.id = stale.id
            RETURNING j.state = $3
            "#,
        )
        .bind(JobState::Running)
        .bind(stale_after.as_secs_f64())
        .bind(JobState::Pending)
        .bind(JobState::Failed)
        .bind(STALE_JOB_ERROR)
        .fetch_all(&self.db)
        .await?;

        let reset = StaleReset {
            requeued: requeued.iter().filter(|r| **r).count() as u64,
            failed: requeued.iter().filter(|r| !**r).count() as u64,
        };

        if reset.requeued > 0 || reset.failed > 0 {
            tracing::warn!(
                requeued = reset.requeued,
                failed = reset.failed,
                "Reset stale reputation jobs"
            );
        }

        Ok(reset)
    }
}
