//! Chatbot management and conversations

pub mod api;
pub mod service;

pub use api::{ChatbotApiState, chatbot_api_router};
pub use service::{
    ChatReply, ChatbotError, ChatbotService, ChatbotSettings, ChatbotView, MessageView,
};
