//! Job queue repository
//!
//! Durable task rows with at-least-once semantics: workers claim rows
//! with a conditional update, crashed claims go stale and are released
//! back to pending.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Job;

/// Job queue repository
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a job
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: &serde_json::Value,
        scheduled_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::now_v7();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, payload, scheduled_at, max_attempts)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(queue)
        .bind(payload)
        .bind(scheduled_at)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Fetch pending jobs that are due, oldest first
    pub async fn fetch_due(&self, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'pending'
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Claim a job for execution; returns false when another worker won
    pub async fn mark_started(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'processing',
                attempts = attempts + 1,
                started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as completed
    pub async fn mark_completed(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'completed',
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a job as failed
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'failed',
                last_error = $2,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reschedule a job for a later attempt
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        error: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'pending',
                last_error = $2,
                scheduled_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(scheduled_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Release jobs whose worker died mid-task
    ///
    /// Any job claimed before the cutoff goes back to pending for
    /// redelivery; the tasks it carries are idempotent.
    pub async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = 'pending'
            WHERE status = 'processing' AND started_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
