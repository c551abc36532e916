//! Webhook event repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateWebhookEvent, WebhookEvent};

/// Webhook event repository
#[derive(Clone)]
pub struct WebhookEventRepository {
    pool: PgPool,
}

impl WebhookEventRepository {
    /// Create a new webhook event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist an inbound provider callback, unprocessed
    pub async fn create(&self, input: CreateWebhookEvent) -> Result<WebhookEvent, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (id, event_type, provider_message_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.event_type.to_string())
        .bind(&input.provider_message_id)
        .bind(&input.payload)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a webhook event by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<WebhookEvent>, sqlx::Error> {
        sqlx::query_as::<_, WebhookEvent>("SELECT * FROM webhook_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Mark an event processed; returns false when it already was
    ///
    /// The guard is what makes reprocessing detectable: only one caller
    /// ever flips the flag.
    pub async fn mark_processed(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                processed = TRUE,
                processed_at = NOW()
            WHERE id = $1 AND processed = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
