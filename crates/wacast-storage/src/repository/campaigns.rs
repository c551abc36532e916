//! Campaign repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Campaign, CampaignCounts, CreateCampaign};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in `pending` status
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (id, name, template_id, sender_number_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.template_id)
        .bind(input.sender_number_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Move a campaign from `pending` to `processing`
    pub async fn mark_processing(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = 'processing',
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a campaign completed; returns false when it already was
    ///
    /// `completed` is sticky: the conditional guard makes the transition
    /// happen exactly once and never revert.
    pub async fn mark_completed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'completed',
                completed_at = COALESCE(completed_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a campaign failed (never applied over `completed`)
    pub async fn mark_failed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = 'failed',
                completed_at = COALESCE(completed_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the derived counters wholesale
    ///
    /// Counters are never incremented in place; every refresh writes the
    /// full set recomputed from `message_records`.
    pub async fn write_counters(
        &self,
        id: Uuid,
        counts: &CampaignCounts,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                total_messages = $2,
                sent_count = $3,
                delivered_count = $4,
                read_count = $5,
                failed_count = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(counts.total as i32)
        .bind(counts.sent as i32)
        .bind(counts.delivered as i32)
        .bind(counts.read as i32)
        .bind(counts.failed as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
