//! Sending number repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::SenderNumber;

/// Sending number repository
#[derive(Clone)]
pub struct SenderNumberRepository {
    pool: PgPool,
}

impl SenderNumberRepository {
    /// Create a new sending number repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a sending number
    pub async fn create(
        &self,
        display_number: &str,
        provider_number_id: &str,
    ) -> Result<SenderNumber, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, SenderNumber>(
            r#"
            INSERT INTO sender_numbers (id, display_number, provider_number_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_number)
        .bind(provider_number_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a sending number by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<SenderNumber>, sqlx::Error> {
        sqlx::query_as::<_, SenderNumber>("SELECT * FROM sender_numbers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
