//! Contact repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Contact;

/// Contact repository
#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    /// Create a new contact repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new contact
    pub async fn create(
        &self,
        name: Option<&str>,
        phone: &str,
    ) -> Result<Contact, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, name, phone)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a contact by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
