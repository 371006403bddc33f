//! Chatbot repository for database operations
//!
//! Ownership guards live in the `WHERE` clause of the mutating statements, so a
//! concurrent ownership change cannot slip between the service's check and the write.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Chatbot;
use crate::core::db::store::{ChatbotStore, StoreError};

/// Chatbot repository for database operations
#[derive(Clone)]
pub struct ChatbotRepository {
    pool: PgPool,
}

impl ChatbotRepository {
    /// Create a new chatbot repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatbotStore for ChatbotRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Chatbot>, StoreError> {
        let chatbot = sqlx::query_as::<_, Chatbot>(
            r#"
            SELECT id, user_id, name, description, context, temperature, model, max_tokens, created_at, updated_at
            FROM chatbots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chatbot)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Chatbot>, StoreError> {
        let chatbots = sqlx::query_as::<_, Chatbot>(
            r#"
            SELECT id, user_id, name, description, context, temperature, model, max_tokens, created_at, updated_at
            FROM chatbots
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chatbots)
    }

    async fn insert(&self, chatbot: &Chatbot) -> Result<Uuid, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO chatbots (id, user_id, name, description, context, temperature, model, max_tokens, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(chatbot.id)
        .bind(chatbot.user_id)
        .bind(&chatbot.name)
        .bind(&chatbot.description)
        .bind(&chatbot.context)
        .bind(chatbot.temperature)
        .bind(chatbot.model)
        .bind(chatbot.max_tokens)
        .bind(chatbot.created_at)
        .bind(chatbot.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(id)
    }

    async fn update(&self, chatbot: &Chatbot) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE chatbots
            SET
                name = $3,
                description = $4,
                context = $5,
                temperature = $6,
                model = $7,
                max_tokens = $8,
                updated_at = $9
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(chatbot.id)
        .bind(chatbot.user_id)
        .bind(&chatbot.name)
        .bind(&chatbot.description)
        .bind(&chatbot.context)
        .bind(chatbot.temperature)
        .bind(chatbot.model)
        .bind(chatbot.max_tokens)
        .bind(chatbot.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        // Messages go with the chatbot via ON DELETE CASCADE
        let result = sqlx::query(
            r#"
            DELETE FROM chatbots
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
