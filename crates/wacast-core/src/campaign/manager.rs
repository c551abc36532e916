//! Campaign Manager - Starts campaigns, recomputes aggregates, checks
//! completion

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use wacast_storage::db::DatabasePool;
use wacast_storage::models::{percentage, CampaignCounts, CampaignStats};
use wacast_storage::repository::{CampaignRepository, JobRepository, MessageRecordRepository};

use crate::queue::enqueue_dispatch;

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign has no message records")]
    NoRecords,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Campaign Manager
///
/// Both update paths (dispatch and reconcile) funnel through
/// `check_completion`, which recomputes the counters from the record
/// table instead of incrementing them, so concurrent writers cannot
/// drift the aggregate.
pub struct CampaignManager {
    campaign_repo: CampaignRepository,
    record_repo: MessageRecordRepository,
    job_repo: JobRepository,
    /// Job-level attempt budget handed to enqueued dispatch tasks
    dispatch_max_attempts: i32,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(db_pool: DatabasePool, max_retries: i32) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            record_repo: MessageRecordRepository::new(pool.clone()),
            job_repo: JobRepository::new(pool),
            // one initial attempt, max_retries re-deliveries, one spare
            // for queue-level redelivery after a crash
            dispatch_max_attempts: max_retries + 2,
        }
    }

    /// Start a campaign: enqueue one dispatch task per pending record
    ///
    /// Records are expected to already exist in `pending` status; this
    /// only schedules the work and flips the campaign to `processing`.
    /// Returns the number of tasks enqueued.
    pub async fn start_campaign(&self, campaign_id: Uuid) -> Result<usize, CampaignError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let pending = self.record_repo.pending_ids(campaign_id).await?;

        if pending.is_empty() {
            let counts = self.record_repo.count_by_campaign(campaign_id).await?;
            if counts.total == 0 {
                self.campaign_repo.mark_failed(campaign_id).await?;
                return Err(CampaignError::NoRecords);
            }
            // Records exist but none are pending: a restart after the
            // tasks were already enqueued. Fall through so the status
            // and counters still converge.
            debug!("Campaign {} has no pending records left", campaign_id);
        }

        for record_id in &pending {
            enqueue_dispatch(
                &self.job_repo,
                *record_id,
                Utc::now(),
                self.dispatch_max_attempts,
            )
            .await?;
        }

        self.campaign_repo.mark_processing(campaign_id).await?;
        self.refresh_counters(campaign_id).await?;

        info!(
            "Campaign {} ({}) started with {} dispatch tasks",
            campaign_id,
            campaign.name,
            pending.len()
        );

        Ok(pending.len())
    }

    /// Recompute the derived counters from message records and write
    /// them back wholesale
    pub async fn refresh_counters(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignCounts, CampaignError> {
        let counts = self.record_repo.count_by_campaign(campaign_id).await?;
        self.campaign_repo.write_counters(campaign_id, &counts).await?;
        Ok(counts)
    }

    /// Refresh the aggregate and complete the campaign when every record
    /// is terminal
    ///
    /// Run after any record status change, from either update path.
    /// Completion is applied at most once; returns whether the campaign
    /// is complete.
    pub async fn check_completion(&self, campaign_id: Uuid) -> Result<bool, CampaignError> {
        let counts = self.refresh_counters(campaign_id).await?;

        if !counts.is_complete() {
            return Ok(false);
        }

        if self.campaign_repo.mark_completed(campaign_id).await? {
            info!(
                "Campaign {} completed ({} delivered, {} read, {} failed)",
                campaign_id, counts.delivered, counts.read, counts.failed
            );
        }

        Ok(true)
    }

    /// Read campaign statistics
    pub async fn campaign_stats(&self, campaign_id: Uuid) -> Result<CampaignStats, CampaignError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let total = i64::from(campaign.total_messages);
        let delivered_or_read =
            i64::from(campaign.delivered_count) + i64::from(campaign.read_count);

        Ok(CampaignStats {
            campaign_id,
            status: campaign.status,
            total_messages: campaign.total_messages,
            sent_count: campaign.sent_count,
            delivered_count: campaign.delivered_count,
            read_count: campaign.read_count,
            failed_count: campaign.failed_count,
            delivery_percentage: percentage(delivered_or_read, total),
            failure_percentage: percentage(i64::from(campaign.failed_count), total),
        })
    }
}
