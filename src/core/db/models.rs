//! Database models for chatbot-hub
//!
//! This module defines the entity structs that map to PostgreSQL tables,
//! plus the small enums stored alongside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// User Model
// ============================================================================

/// Column width of `users.name`
pub const MAX_USER_NAME_LEN: usize = 100;

/// Column width of `users.email`
pub const MAX_USER_EMAIL_LEN: usize = 150;

/// User entity representing a registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a new, not yet persisted user. The password must already be hashed.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Chatbot Model
// ============================================================================

/// Language models a chatbot can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR")]
pub enum ChatbotModel {
    #[default]
    Gpt35Turbo,
    Gpt4,
    Gpt4Turbo,
    Gpt4o,
    Gpt41Mini,
    Gpt41Nano,
}

impl ChatbotModel {
    /// Model identifier expected by the completion provider
    pub fn api_name(&self) -> &'static str {
        match self {
            ChatbotModel::Gpt35Turbo => "gpt-3.5-turbo",
            ChatbotModel::Gpt4 => "gpt-4",
            ChatbotModel::Gpt4Turbo => "gpt-4-turbo",
            ChatbotModel::Gpt4o => "gpt-4o",
            ChatbotModel::Gpt41Mini => "gpt-4.1-mini",
            ChatbotModel::Gpt41Nano => "gpt-4.1-nano",
        }
    }
}

impl std::fmt::Display for ChatbotModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Chatbot entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chatbot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// System prompt seeded as the first message of the conversation
    pub context: String,
    pub temperature: f32,
    pub model: ChatbotModel,
    pub max_tokens: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Message Model
// ============================================================================

/// Author of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message entity. Messages are immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub chatbot_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Tokens billed for this entry (0 for user/system messages)
    pub tokens_used: i32,
    /// Latency of the completion call in milliseconds (0 unless role is assistant)
    pub response_time_ms: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    fn build(chatbot_id: Uuid, role: MessageRole, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            chatbot_id,
            role,
            content,
            tokens_used: 0,
            response_time_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn system(chatbot_id: Uuid, content: impl Into<String>) -> Self {
        Self::build(chatbot_id, MessageRole::System, content.into())
    }

    pub fn user(chatbot_id: Uuid, content: impl Into<String>) -> Self {
        Self::build(chatbot_id, MessageRole::User, content.into())
    }

    pub fn assistant(
        chatbot_id: Uuid,
        content: impl Into<String>,
        tokens_used: i32,
        response_time_ms: i32,
    ) -> Self {
        Self {
            tokens_used: tokens_used.max(0),
            response_time_ms: response_time_ms.max(0),
            ..Self::build(chatbot_id, MessageRole::Assistant, content.into())
        }
    }
}
