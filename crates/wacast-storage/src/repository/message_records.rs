//! Message record repository

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;
use wacast_common::types::CampaignId;

use crate::models::{CampaignCounts, CreateMessageRecord, MessageRecord, MessageStatus};

// Rank of the row's current status, inlined where an update must only
// move the record forward in the state machine.
const CURRENT_RANK: &str =
    "CASE status WHEN 'pending' THEN 0 WHEN 'sent' THEN 1 WHEN 'delivered' THEN 2 ELSE 3 END";

/// Message record repository
#[derive(Clone)]
pub struct MessageRecordRepository {
    pool: PgPool,
}

impl MessageRecordRepository {
    /// Create a new message record repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new message record in `pending` status
    pub async fn create(&self, input: CreateMessageRecord) -> Result<MessageRecord, sqlx::Error> {
        let id = Uuid::new_v4();
        let variables =
            serde_json::to_value(&input.rendered_variables).unwrap_or_else(|_| serde_json::json!([]));

        sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO message_records (
                id, campaign_id, contact_id, sender_number_id, template_id,
                rendered_variables
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(input.contact_id)
        .bind(input.sender_number_id)
        .bind(input.template_id)
        .bind(&variables)
        .fetch_one(&self.pool)
        .await
    }

    /// Create multiple message records in one transaction
    pub async fn create_batch(
        &self,
        records: Vec<CreateMessageRecord>,
    ) -> Result<u64, sqlx::Error> {
        let mut count = 0u64;
        let mut tx = self.pool.begin().await?;

        for input in records {
            let id = Uuid::new_v4();
            let variables = serde_json::to_value(&input.rendered_variables)
                .unwrap_or_else(|_| serde_json::json!([]));

            let result = sqlx::query(
                r#"
                INSERT INTO message_records (
                    id, campaign_id, contact_id, sender_number_id, template_id,
                    rendered_variables
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(input.campaign_id)
            .bind(input.contact_id)
            .bind(input.sender_number_id)
            .bind(input.template_id)
            .bind(&variables)
            .execute(&mut *tx)
            .await?;

            count += result.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    /// Get a message record by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<MessageRecord>, sqlx::Error> {
        sqlx::query_as::<_, MessageRecord>("SELECT * FROM message_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a message record by its provider-assigned id
    ///
    /// This is the reconciliation lookup for inbound webhook events;
    /// `provider_message_id` is unique across live records.
    pub async fn get_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<MessageRecord>, sqlx::Error> {
        sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM message_records WHERE provider_message_id = $1",
        )
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List records for a campaign
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<MessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageRecord>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, MessageRecord>(
                r#"
                SELECT * FROM message_records
                WHERE campaign_id = $1 AND status = $2
                ORDER BY created_at ASC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(campaign_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, MessageRecord>(
                r#"
                SELECT * FROM message_records
                WHERE campaign_id = $1
                ORDER BY created_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(campaign_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// IDs of all pending records in a campaign, oldest first
    pub async fn pending_ids(&self, campaign_id: CampaignId) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM message_records
            WHERE campaign_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Record a successful provider submission
    ///
    /// Sets the provider id and backfills `sent_at`; the status advances
    /// only from `pending`, so a webhook that already moved the record
    /// further is never overwritten.
    pub async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
    ) -> Result<Option<MessageRecord>, sqlx::Error> {
        sqlx::query_as::<_, MessageRecord>(
            r#"
            UPDATE message_records SET
                provider_message_id = $2,
                status = CASE WHEN status = 'pending' THEN 'sent' ELSE status END,
                sent_at = COALESCE(sent_at, NOW()),
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a transient send failure that will be retried
    ///
    /// The record stays `pending` so the re-enqueued dispatch task can
    /// pick it up again; only the error and attempt counter move.
    pub async fn record_attempt_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<Option<MessageRecord>, sqlx::Error> {
        sqlx::query_as::<_, MessageRecord>(
            r#"
            UPDATE message_records SET
                retry_count = retry_count + 1,
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a terminal send failure
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<Option<MessageRecord>, sqlx::Error> {
        sqlx::query_as::<_, MessageRecord>(
            r#"
            UPDATE message_records SET
                status = 'failed',
                retry_count = retry_count + 1,
                error_message = $2,
                failed_at = COALESCE(failed_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apply a webhook-driven transition in one conditional write
    ///
    /// The status is written only when the target outranks the row's
    /// current status; the supplied timestamps are backfilled through
    /// COALESCE either way, so replaying an event cannot move anything.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_transition(
        &self,
        id: Uuid,
        target: MessageStatus,
        sent_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
        read_at: Option<DateTime<Utc>>,
        failed_at: Option<DateTime<Utc>>,
        error_message: Option<&str>,
    ) -> Result<Option<MessageRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE message_records SET
                status = CASE WHEN $3 > {rank} THEN $2 ELSE status END,
                sent_at = COALESCE(sent_at, $4),
                delivered_at = COALESCE(delivered_at, $5),
                read_at = COALESCE(read_at, $6),
                failed_at = COALESCE(failed_at, $7),
                error_message = COALESCE($8, error_message),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
            rank = CURRENT_RANK
        );

        sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(id)
            .bind(target.to_string())
            .bind(i32::from(target.rank()))
            .bind(sent_at)
            .bind(delivered_at)
            .bind(read_at)
            .bind(failed_at)
            .bind(error_message)
            .fetch_optional(&self.pool)
            .await
    }

    /// Per-status counts for a campaign in one scan
    pub async fn count_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<CampaignCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total,
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'delivered') as delivered,
                COUNT(*) FILTER (WHERE status = 'read') as read,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
            FROM message_records
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CampaignCounts {
            total: row.get::<Option<i64>, _>("total").unwrap_or(0),
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            delivered: row.get::<Option<i64>, _>("delivered").unwrap_or(0),
            read: row.get::<Option<i64>, _>("read").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
        })
    }
}
