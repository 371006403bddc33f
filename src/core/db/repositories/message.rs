//! Message repository for database operations

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Message;
use crate::core::db::store::{MessageStore, StoreError};

/// Message repository for database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn find_by_chatbot(&self, chatbot_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chatbot_id, role, content, tokens_used, response_time_ms, created_at, updated_at
            FROM messages
            WHERE chatbot_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(chatbot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn insert(&self, message: &Message) -> Result<Uuid, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO messages (id, chatbot_id, role, content, tokens_used, response_time_ms, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(message.id)
        .bind(message.chatbot_id)
        .bind(message.role)
        .bind(&message.content)
        .bind(message.tokens_used)
        .bind(message.response_time_ms)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(id)
    }
}
