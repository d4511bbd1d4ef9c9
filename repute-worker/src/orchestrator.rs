/// Worker orchestrator
///
/// Drains the reputation job queue: claims due jobs, recomputes each score
/// through [`ReputationService`], records the outcome and publishes a
/// notification for every persisted score.
///
/// # Architecture
///
/// ```text
/// Orchestrator
///   ├─> ReputationJobQueue: claim due jobs
///   ├─> ReputationService: recompute + persist
///   ├─> ScoreNotifier: publish ReputationUpdated
///   └─> ReputationJobQueue: succeeded / retry / failed
/// ```
///
/// # Concurrency
///
/// At most `max_concurrent_jobs` recomputations run at once, each in its
/// own Tokio task holding a semaphore permit. Shutdown stops claiming and
/// waits up to `shutdown_grace_secs` for in-flight jobs; anything still
/// running after that is left for [`ReputationJobQueue::reset_stale`].
///
/// # Example
///
/// ```no_run
/// use repute_shared::events::NoopNotifier;
/// use repute_worker::orchestrator::{OrchestratorConfig, WorkerOrchestrator};
/// use repute_worker::queue::RetryPolicy;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let orchestrator = WorkerOrchestrator::new(
///     pool,
///     Arc::new(NoopNotifier),
///     OrchestratorConfig::default(),
///     RetryPolicy::default(),
/// );
///
/// let shutdown = orchestrator.shutdown_token();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::config::WorkerConfig;
use crate::queue::{FailureOutcome, ReputationJobQueue, RetryPolicy};
use repute_shared::{
    events::{Notification, ReputationUpdated, ScoreNotifier},
    models::reputation_job::ReputationJob,
    reputation::{service::ScoreUpdate, ReputationError, ReputationService},
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval_secs: u64,
    pub max_concurrent_jobs: usize,

    /// Most jobs claimed per poll
    pub batch_size: usize,

    pub stale_after_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 1,
            max_concurrent_jobs: 10,
            batch_size: 5,
            stale_after_secs: 300,
            shutdown_grace_secs: 30,
        }
    }
}

impl From<&WorkerConfig> for OrchestratorConfig {
    fn from(config: &WorkerConfig) -> Self {
        OrchestratorConfig {
            poll_interval_secs: config.poll_interval_secs,
            max_concurrent_jobs: config.max_concurrent_jobs,
            batch_size: config.batch_size,
            stale_after_secs: config.stale_after_secs,
            shutdown_grace_secs: config.shutdown_grace_secs,
        }
    }
}

/// Everything a spawned job needs
#[derive(Clone)]
struct JobContext {
    queue: ReputationJobQueue,
    service: ReputationService,
    notifier: Arc<dyn ScoreNotifier>,
}

pub struct WorkerOrchestrator {
    context: JobContext,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(
        db: PgPool,
        notifier: Arc<dyn ScoreNotifier>,
        config: OrchestratorConfig,
        retry: RetryPolicy,
    ) -> Self {
        WorkerOrchestrator {
            context: JobContext {
                queue: ReputationJobQueue::new(db.clone(), retry),
                service: ReputationService::new(db),
                notifier,
            },
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancel to stop the loop gracefully
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self) -> anyhow::Result<()> {
        let stale_after = Duration::from_secs(self.config.stale_after_secs);
        if let Err(e) = self.context.queue.reset_stale(stale_after).await {
            tracing::error!(error = %e, "Failed to reset stale jobs");
        }

        tracing::info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            batch_size = self.config.batch_size,
            "Worker orchestrator starting"
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut in_flight = JoinSet::new();
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);

        loop {
            while let Some(finished) = in_flight.try_join_next() {
                log_join_error(finished);
            }

            let available = permits.available_permits();
            if available == 0 {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => break,
                    Some(finished) = in_flight.join_next() => log_join_error(finished),
                }
                continue;
            }

            let claimed = self
                .context
                .queue
                .claim_jobs(available.min(self.config.batch_size))
                .await;

            let jobs = match claimed {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim jobs");
                    Vec::new()
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => break,
                    _ = sleep(poll_interval) => {}
                }
                continue;
            }

            for job in jobs {
                let permit = permits.clone().acquire_owned().await?;
                let context = self.context.clone();
                in_flight.spawn(process_job(context, job, permit));
            }
        }

        self.drain(in_flight).await;
        tracing::info!("Worker orchestrator shut down");
        Ok(())
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }

        tracing::info!(count = in_flight.len(), "Waiting for in-flight jobs");
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        let drained = tokio::time::timeout(grace, async {
            while let Some(finished) = in_flight.join_next().await {
                log_join_error(finished);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                count = in_flight.len(),
                "Grace period elapsed, abandoning in-flight jobs"
            );
            in_flight.abort_all();
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Job task panicked or was aborted");
    }
}

/// Recomputes one job's score and records the outcome
async fn process_job(context: JobContext, job: ReputationJob, _permit: OwnedSemaphorePermit) {
    tracing::debug!(
        job_id = %job.id,
        tenant_id = %job.tenant_id,
        user_id = %job.user_id,
        reason = %job.reason,
        attempt = job.attempts,
        "Processing reputation job"
    );

    match context.service.recompute(job.tenant_id, job.user_id).await {
        Ok(update) => {
            if let Err(e) = context.queue.mark_succeeded(job.id).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job succeeded");
            }
            publish(context.notifier.as_ref(), &update).await;
        }
        // Membership was removed after the job was queued
        Err(e @ ReputationError::NotAMember { .. }) => {
            tracing::warn!(job_id = %job.id, error = %e, "Dropping job for non-member");
            if let Err(e) = context.queue.close_failed(job.id, &e.to_string()).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to close job");
            }
        }
        Err(e) => {
            let message = e.to_string();
            match context.queue.mark_failed(&job, &message).await {
                Ok(FailureOutcome::Retrying { delay }) => tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    retry_in_secs = delay.as_secs(),
                    error = %message,
                    "Reputation job failed, retrying"
                ),
                Ok(outcome) => tracing::error!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    outcome = ?outcome,
                    error = %message,
                    "Reputation job failed"
                ),
                Err(queue_err) => tracing::error!(
                    job_id = %job.id,
                    error = %queue_err,
                    "Failed to record job failure"
                ),
            }
        }
    }
}

/// The score is already persisted, so a notify failure only costs the push
async fn publish(notifier: &dyn ScoreNotifier, update: &ScoreUpdate) {
    let notification = Notification::ReputationUpdated(ReputationUpdated::from(update));

    match notifier.notify(&notification).await {
        Ok(()) => tracing::info!(
            tenant_id = %update.tenant_id,
            user_id = %update.user_id,
            score = update.score,
            previous_score = ?update.previous_score,
            "Reputation updated"
        ),
        Err(e) => tracing::warn!(
            user_id = %update.user_id,
            error = %e,
            "Failed to publish reputation update"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repute_shared::events::InMemoryNotifier;
    use repute_shared::reputation::ReputationBreakdown;
    use uuid::Uuid;

    #[test]
    fn test_orchestrator_config_default() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.max_concurrent_jobs, 10);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.stale_after_secs, 300);
    }

    #[tokio::test]
    async fn test_publish_sends_reputation_updated() {
        let notifier = InMemoryNotifier::new();
        let update = ScoreUpdate {
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            score: 612.5,
            previous_score: Some(600.0),
            computed_at: Utc::now(),
            breakdown: ReputationBreakdown::default(),
        };

        publish(&notifier, &update).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id(), update.user_id);
        match &sent[0] {
            Notification::ReputationUpdated(event) => {
                assert_eq!(event.score, 612.5);
                assert_eq!(event.previous_score, Some(600.0));
            }
        }
    }
}
