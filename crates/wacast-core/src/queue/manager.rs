//! Queue Manager - Worker pool over the durable job queue

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wacast_common::config::WorkerConfig;
use wacast_storage::db::DatabasePool;
use wacast_storage::models::Job;
use wacast_storage::repository::JobRepository;

use super::{enqueue_reconcile, DispatchJob, ReconcileJob, DISPATCH_QUEUE, RECONCILE_QUEUE};
use crate::dispatch::{DispatchOutcome, DispatchWorker};
use crate::reconcile::WebhookReconciler;

/// Queue Manager
///
/// Pulls due jobs from the durable queue and executes them on a bounded
/// worker pool. Tasks are at-least-once: a claim that goes stale after a
/// crash is released back to pending, and both task kinds tolerate
/// duplicate delivery.
pub struct QueueManager {
    job_repo: JobRepository,
    dispatch_worker: Arc<DispatchWorker>,
    reconciler: Arc<WebhookReconciler>,
    config: WorkerConfig,
}

impl QueueManager {
    /// Create a new queue manager
    pub fn new(
        db_pool: DatabasePool,
        dispatch_worker: Arc<DispatchWorker>,
        reconciler: Arc<WebhookReconciler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            job_repo: JobRepository::new(db_pool.pool().clone()),
            dispatch_worker,
            reconciler,
            config,
        }
    }

    /// Enqueue a reconcile task for a stored webhook event
    ///
    /// This is the entry point the webhook receiving layer calls after
    /// persisting the event row.
    pub async fn enqueue_reconcile(&self, webhook_event_id: Uuid) -> Result<Uuid> {
        enqueue_reconcile(&self.job_repo, webhook_event_id, 5).await
    }

    /// Run the queue processor
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.config.poll_interval_secs));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        info!(
            "Queue processor started (concurrency: {}, batch: {}, interval: {}s)",
            self.config.concurrency, self.config.batch_size, self.config.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.release_stale().await {
                warn!("Error releasing stale jobs: {}", e);
            }

            if let Err(e) = self.process_due(&semaphore).await {
                error!("Error processing queue: {}", e);
            }
        }
    }

    /// Release jobs whose worker died mid-task
    async fn release_stale(&self) -> Result<()> {
        let cutoff = Utc::now() - Duration::seconds(self.config.stale_after_secs);
        let released = self.job_repo.release_stale(cutoff).await?;
        if released > 0 {
            warn!("Released {} stale jobs for redelivery", released);
        }
        Ok(())
    }

    /// Claim and execute all due jobs
    async fn process_due(&self, semaphore: &Arc<Semaphore>) -> Result<()> {
        let jobs = self.job_repo.fetch_due(self.config.batch_size).await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Processing {} due jobs", jobs.len());

        let mut handles = Vec::new();

        for job in jobs {
            // Conditional claim: another worker may have won this row.
            if !self.job_repo.mark_started(job.id).await? {
                continue;
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let job_repo = self.job_repo.clone();
            let dispatch_worker = self.dispatch_worker.clone();
            let reconciler = self.reconciler.clone();

            let handle = tokio::spawn(async move {
                Self::handle_job(&job_repo, &dispatch_worker, &reconciler, job).await;
                drop(permit);
            });

            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Task error: {}", e);
            }
        }

        Ok(())
    }

    /// Execute one claimed job and settle its queue row
    async fn handle_job(
        job_repo: &JobRepository,
        dispatch_worker: &DispatchWorker,
        reconciler: &WebhookReconciler,
        job: Job,
    ) {
        let job_id = job.id;
        // mark_started already incremented the stored counter
        let attempts = job.attempts + 1;

        match job.queue.as_str() {
            DISPATCH_QUEUE => {
                let parsed: DispatchJob = match serde_json::from_value(job.payload.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Job {} has invalid dispatch payload: {}", job_id, e);
                        let _ = job_repo.mark_failed(job_id, &e.to_string()).await;
                        return;
                    }
                };

                match dispatch_worker.dispatch(parsed.message_record_id).await {
                    Ok(DispatchOutcome::Retry { delay_secs }) => {
                        // The worker classified the failure as transient
                        // and already bounded it against the record's
                        // retry budget; the job budget is a backstop.
                        if attempts >= job.max_attempts {
                            error!("Job {} exhausted queue attempts", job_id);
                            let _ = job_repo
                                .mark_failed(job_id, "queue attempt budget exhausted")
                                .await;
                        } else {
                            let scheduled_at = Utc::now() + Duration::seconds(delay_secs);
                            info!(
                                "Job {} rescheduled for {} (attempt {})",
                                job_id, scheduled_at, attempts
                            );
                            let _ = job_repo
                                .schedule_retry(job_id, "transient provider failure", scheduled_at)
                                .await;
                        }
                    }
                    Ok(_) => {
                        if let Err(e) = job_repo.mark_completed(job_id).await {
                            error!("Failed to mark job {} as completed: {}", job_id, e);
                        }
                    }
                    Err(e) => {
                        Self::retry_or_fail(job_repo, &job, attempts, &e.to_string()).await;
                    }
                }
            }

            RECONCILE_QUEUE => {
                let parsed: ReconcileJob = match serde_json::from_value(job.payload.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Job {} has invalid reconcile payload: {}", job_id, e);
                        let _ = job_repo.mark_failed(job_id, &e.to_string()).await;
                        return;
                    }
                };

                match reconciler.reconcile(parsed.webhook_event_id).await {
                    Ok(outcome) => {
                        debug!("Job {} reconciled: {:?}", job_id, outcome);
                        if let Err(e) = job_repo.mark_completed(job_id).await {
                            error!("Failed to mark job {} as completed: {}", job_id, e);
                        }
                    }
                    Err(e) => {
                        Self::retry_or_fail(job_repo, &job, attempts, &e.to_string()).await;
                    }
                }
            }

            other => {
                warn!("Job {} on unknown queue {}", job_id, other);
                let _ = job_repo.mark_failed(job_id, "unknown queue").await;
            }
        }
    }

    /// Settle an infrastructure failure: reschedule with backoff until
    /// the job's attempt budget runs out
    async fn retry_or_fail(job_repo: &JobRepository, job: &Job, attempts: i32, error: &str) {
        if attempts >= job.max_attempts {
            error!("Job {} failed after {} attempts: {}", job.id, attempts, error);
            let _ = job_repo.mark_failed(job.id, error).await;
        } else {
            let scheduled_at = Utc::now() + calculate_backoff(attempts);
            warn!(
                "Job {} failed (attempt {}), retrying at {}: {}",
                job.id, attempts, scheduled_at, error
            );
            let _ = job_repo.schedule_retry(job.id, error, scheduled_at).await;
        }
    }
}

/// Infrastructure retry backoff: 30s doubling per attempt, capped at
/// one hour
fn calculate_backoff(attempts: i32) -> Duration {
    let exp = attempts.clamp(0, 30) as u32;
    let secs = 30_i64.saturating_mul(2_i64.saturating_pow(exp)).min(3600);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(1), Duration::seconds(60));
        assert_eq!(calculate_backoff(2), Duration::seconds(120));
        assert_eq!(calculate_backoff(3), Duration::seconds(240));
        assert_eq!(calculate_backoff(10), Duration::seconds(3600)); // capped
    }
}
