//! Message template repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::MessageTemplate;

/// Message template repository
#[derive(Clone)]
pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    /// Create a new template repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new message template
    pub async fn create(
        &self,
        name: &str,
        language: &str,
        status: &str,
        components: &serde_json::Value,
    ) -> Result<MessageTemplate, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, MessageTemplate>(
            r#"
            INSERT INTO message_templates (id, name, language, status, components)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(language)
        .bind(status)
        .bind(components)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a template by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<MessageTemplate>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>("SELECT * FROM message_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
