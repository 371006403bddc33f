//! Domain services, persistence and HTTP endpoints for the chatbot hub

pub mod auth;
pub mod chatbots;
pub mod completion;
pub mod config;
pub mod db;
pub mod http;
pub mod usage;
pub mod users;
