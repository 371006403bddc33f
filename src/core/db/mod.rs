//! Database module for chatbot-hub
//!
//! This module provides database connectivity, models, the store traits the
//! services depend on, and their PostgreSQL and in-process implementations.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use memory::MemoryStore;
pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations, health_check};
pub use repositories::{ChatbotRepository, MessageRepository, UserRepository};
pub use store::{ChatbotStore, MessageStore, StoreError, UserStore};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
