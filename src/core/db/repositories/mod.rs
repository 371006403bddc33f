//! PostgreSQL implementations of the store traits
//!
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with the database.

pub mod chatbot;
pub mod message;
pub mod user;

pub use chatbot::ChatbotRepository;
pub use message::MessageRepository;
pub use user::UserRepository;
