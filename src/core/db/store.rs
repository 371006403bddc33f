//! Store interfaces consumed by the services
//!
//! Services only see these traits. `repositories` implements them on PostgreSQL,
//! `memory` implements them in-process.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::db::models::{Chatbot, Message, User};

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a sqlx error, turning unique violations into `Conflict`
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `Conflict` if the email is already taken.
    async fn insert(&self, user: &User) -> Result<Uuid, StoreError>;

    /// Fails with `Conflict` if the new email belongs to another user.
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Deletes the user together with its chatbots and their messages.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait ChatbotStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Chatbot>, StoreError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Chatbot>, StoreError>;

    async fn insert(&self, chatbot: &Chatbot) -> Result<Uuid, StoreError>;

    /// Writes only if the stored row still belongs to `chatbot.user_id`.
    /// Returns false when no row matched.
    async fn update(&self, chatbot: &Chatbot) -> Result<bool, StoreError>;

    /// Deletes the chatbot and its messages if it belongs to `owner_id`.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages of a chatbot, oldest first.
    async fn find_by_chatbot(&self, chatbot_id: Uuid) -> Result<Vec<Message>, StoreError>;

    async fn insert(&self, message: &Message) -> Result<Uuid, StoreError>;
}
