//! Chatbot Hub - multi-user chatbot management backend
//!
//! Users register, configure their own chatbots (system context, model,
//! temperature, token limit) and converse with them through an OpenAI-compatible
//! completion API. Conversations and per-chatbot usage statistics are persisted.

pub mod app;
pub mod core;
