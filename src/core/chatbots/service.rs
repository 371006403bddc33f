//! Chatbot service
//!
//! Chatbot CRUD, the send-message round trip through the completion client,
//! and per-chatbot usage views.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::completion::{CompletionClient, CompletionError};
use crate::core::db::models::{Chatbot, ChatbotModel, Message, MessageRole};
use crate::core::db::store::{ChatbotStore, MessageStore, StoreError};
use crate::core::usage::{UsageStats, format_response_time};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_CONTEXT_LEN: usize = 2000;
const MAX_MESSAGE_LEN: usize = 2000;
const MAX_TOKENS_LIMIT: i32 = 4096;

/// Chatbot service error types
#[derive(Debug, thiserror::Error)]
pub enum ChatbotError {
    #[error("Chatbot not found")]
    NotFound,

    #[error("Chatbot belongs to another user")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ChatbotError {
    fn from(err: StoreError) -> Self {
        ChatbotError::Internal(err.to_string())
    }
}

impl From<CompletionError> for ChatbotError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Timeout | CompletionError::Transport(_) => {
                ChatbotError::ProviderUnavailable(err.to_string())
            }
            CompletionError::Provider { .. } | CompletionError::InvalidResponse(_) => {
                ChatbotError::Provider(err.to_string())
            }
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> i32 {
    1024
}

/// Chatbot settings supplied on create and update
#[derive(Debug, Clone, Deserialize)]
pub struct ChatbotSettings {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub context: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub model: ChatbotModel,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
}

impl ChatbotSettings {
    pub fn validate(&self) -> Result<(), ChatbotError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(ChatbotError::Validation(format!(
                "Name must be between 1 and {} characters",
                MAX_NAME_LEN
            )));
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_DESCRIPTION_LEN
        {
            return Err(ChatbotError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let context_len = self.context.trim().chars().count();
        if context_len == 0 || self.context.chars().count() > MAX_CONTEXT_LEN {
            return Err(ChatbotError::Validation(format!(
                "Context must be between 1 and {} characters",
                MAX_CONTEXT_LEN
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatbotError::Validation(
                "Temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(ChatbotError::Validation(format!(
                "Max tokens must be between 1 and {}",
                MAX_TOKENS_LIMIT
            )));
        }

        Ok(())
    }
}

/// Chatbot with its usage statistics
#[derive(Debug, Clone, Serialize)]
pub struct ChatbotView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub context: String,
    pub temperature: f32,
    pub model: ChatbotModel,
    pub max_tokens: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub usage: UsageStats,
}

impl ChatbotView {
    fn new(chatbot: Chatbot, messages: &[Message]) -> Self {
        Self {
            id: chatbot.id,
            user_id: chatbot.user_id,
            name: chatbot.name,
            description: chatbot.description,
            context: chatbot.context,
            temperature: chatbot.temperature,
            model: chatbot.model,
            max_tokens: chatbot.max_tokens,
            created_at: chatbot.created_at,
            updated_at: chatbot.updated_at,
            usage: UsageStats::from_messages(messages),
        }
    }
}

/// One entry of a chatbot's history
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub tokens_used: i32,
    pub response_time: String,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            tokens_used: message.tokens_used,
            response_time: format_response_time(i64::from(message.response_time_ms)),
            created_at: message.created_at,
        }
    }
}

/// Result of a send-message round trip
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    /// Duration of the completion call alone, formatted
    pub response_time: String,
    /// Milliseconds spent on the whole operation
    pub total_time: i64,
}

fn elapsed_ms(since: Instant) -> i64 {
    i64::try_from(since.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Chatbot service
#[derive(Clone)]
pub struct ChatbotService {
    chatbots: Arc<dyn ChatbotStore>,
    messages: Arc<dyn MessageStore>,
    completion: Arc<dyn CompletionClient>,
}

impl ChatbotService {
    pub fn new(
        chatbots: Arc<dyn ChatbotStore>,
        messages: Arc<dyn MessageStore>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            chatbots,
            messages,
            completion,
        }
    }

    async fn find(&self, chatbot_id: Uuid) -> Result<Chatbot, ChatbotError> {
        self.chatbots
            .find_by_id(chatbot_id)
            .await?
            .ok_or(ChatbotError::NotFound)
    }

    async fn view(&self, chatbot: Chatbot) -> Result<ChatbotView, ChatbotError> {
        let messages = self.messages.find_by_chatbot(chatbot.id).await?;
        Ok(ChatbotView::new(chatbot, &messages))
    }

    /// Create a chatbot and seed its history with the system context
    pub async fn create(
        &self,
        settings: ChatbotSettings,
        owner_id: Uuid,
    ) -> Result<Uuid, ChatbotError> {
        settings.validate()?;

        let now = Utc::now();
        let chatbot = Chatbot {
            id: Uuid::new_v4(),
            user_id: owner_id,
            name: settings.name,
            description: settings.description,
            context: settings.context,
            temperature: settings.temperature,
            model: settings.model,
            max_tokens: settings.max_tokens,
            created_at: now,
            updated_at: now,
        };

        let id = self.chatbots.insert(&chatbot).await?;
        self.messages
            .insert(&Message::system(id, chatbot.context.as_str()))
            .await?;

        tracing::info!(chatbot_id = %id, owner_id = %owner_id, "Chatbot created");

        Ok(id)
    }

    /// Record the user message, ask the completion client, record the reply
    pub async fn send_message(
        &self,
        chatbot_id: Uuid,
        text: &str,
    ) -> Result<ChatReply, ChatbotError> {
        let started = Instant::now();

        let text_len = text.chars().count();
        if text.trim().is_empty() || text_len > MAX_MESSAGE_LEN {
            return Err(ChatbotError::Validation(format!(
                "Message must be between 1 and {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let chatbot = self.find(chatbot_id).await?;

        // Stored before the completion call so a failed call still leaves it in the log
        self.messages.insert(&Message::user(chatbot.id, text)).await?;

        let history = self.messages.find_by_chatbot(chatbot.id).await?;

        let call_started = Instant::now();
        let completion = self
            .completion
            .complete(&chatbot, &history)
            .await
            .inspect_err(|e| tracing::warn!(chatbot_id = %chatbot.id, "Completion failed: {}", e))?;
        let response_time = elapsed_ms(call_started);

        let reply = Message::assistant(
            chatbot.id,
            completion.text.as_str(),
            completion.total_tokens,
            i32::try_from(response_time).unwrap_or(i32::MAX),
        );
        self.messages.insert(&reply).await?;

        tracing::debug!(
            chatbot_id = %chatbot.id,
            tokens = completion.total_tokens,
            response_time_ms = response_time,
            "Completion stored"
        );

        Ok(ChatReply {
            response: completion.text,
            response_time: format_response_time(response_time),
            total_time: elapsed_ms(started),
        })
    }

    pub async fn get(&self, chatbot_id: Uuid) -> Result<ChatbotView, ChatbotError> {
        let chatbot = self.find(chatbot_id).await?;
        self.view(chatbot).await
    }

    pub async fn list_for_user(&self, owner_id: Uuid) -> Result<Vec<ChatbotView>, ChatbotError> {
        let chatbots = self.chatbots.list_by_owner(owner_id).await?;

        let mut views = Vec::with_capacity(chatbots.len());
        for chatbot in chatbots {
            views.push(self.view(chatbot).await?);
        }

        tracing::debug!(owner_id = %owner_id, count = views.len(), "Listed chatbots");

        Ok(views)
    }

    /// Full history, system message included, oldest first
    pub async fn messages(&self, chatbot_id: Uuid) -> Result<Vec<MessageView>, ChatbotError> {
        let chatbot = self.find(chatbot_id).await?;
        let messages = self.messages.find_by_chatbot(chatbot.id).await?;

        Ok(messages.into_iter().map(MessageView::from).collect())
    }

    /// Apply new settings. The seeded system message is left untouched.
    pub async fn update(
        &self,
        chatbot_id: Uuid,
        settings: ChatbotSettings,
        requester_id: Uuid,
    ) -> Result<ChatbotView, ChatbotError> {
        settings.validate()?;

        let mut chatbot = self.find(chatbot_id).await?;
        if chatbot.user_id != requester_id {
            tracing::warn!(%chatbot_id, %requester_id, "Update forbidden");
            return Err(ChatbotError::Forbidden);
        }

        chatbot.name = settings.name;
        chatbot.description = settings.description;
        chatbot.context = settings.context;
        chatbot.temperature = settings.temperature;
        chatbot.model = settings.model;
        chatbot.max_tokens = settings.max_tokens;
        chatbot.updated_at = Utc::now();

        // The write is guarded by owner id; no match means it was deleted meanwhile
        if !self.chatbots.update(&chatbot).await? {
            return Err(ChatbotError::NotFound);
        }

        self.view(chatbot).await
    }

    pub async fn delete(&self, chatbot_id: Uuid, requester_id: Uuid) -> Result<(), ChatbotError> {
        let chatbot = self.find(chatbot_id).await?;
        if chatbot.user_id != requester_id {
            tracing::warn!(%chatbot_id, %requester_id, "Delete forbidden");
            return Err(ChatbotError::Forbidden);
        }

        if !self.chatbots.delete(chatbot_id, requester_id).await? {
            return Err(ChatbotError::NotFound);
        }

        tracing::info!(chatbot_id = %chatbot_id, "Chatbot deleted");

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::completion::Completion;
    use crate::core::db::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Completion client that replays a fixed outcome and records what it was sent
    pub(crate) struct ScriptedCompletion {
        outcome: fn() -> Result<Completion, CompletionError>,
        pub calls: AtomicUsize,
        pub seen_roles: Mutex<Vec<Vec<MessageRole>>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(outcome: fn() -> Result<Completion, CompletionError>) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                seen_roles: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying() -> Self {
            Self::new(|| {
                Ok(Completion {
                    text: "Hello there".to_string(),
                    prompt_tokens: 12,
                    completion_tokens: 8,
                    total_tokens: 20,
                })
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(
            &self,
            _chatbot: &Chatbot,
            history: &[Message],
        ) -> Result<Completion, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_roles
                .lock()
                .unwrap()
                .push(history.iter().map(|m| m.role).collect());
            (self.outcome)()
        }
    }

    pub(crate) fn settings(name: &str) -> ChatbotSettings {
        ChatbotSettings {
            name: name.to_string(),
            description: Some("Answers questions".to_string()),
            context: "You are a helpful assistant.".to_string(),
            temperature: 0.7,
            model: ChatbotModel::Gpt41Mini,
            max_tokens: 512,
        }
    }

    fn setup(completion: ScriptedCompletion) -> (ChatbotService, Arc<ScriptedCompletion>) {
        let store = Arc::new(MemoryStore::new());
        let completion = Arc::new(completion);
        let service = ChatbotService::new(store.clone(), store, completion.clone());
        (service, completion)
    }

    // ========================================================================
    // Create Tests
    // ========================================================================

    #[tokio::test]
    async fn test_create_seeds_system_message() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();

        let id = service.create(settings("Helper"), owner).await.unwrap();

        let history = service.messages(id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::System);
        assert_eq!(history[0].content, "You are a helpful assistant.");

        let view = service.get(id).await.unwrap();
        assert_eq!(view.user_id, owner);
        assert_eq!(view.usage.total_messages, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_settings() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();

        let mut bad = settings("Helper");
        bad.temperature = 2.5;
        assert!(matches!(
            service.create(bad, owner).await,
            Err(ChatbotError::Validation(_))
        ));

        let mut bad = settings("Helper");
        bad.max_tokens = 0;
        assert!(matches!(
            service.create(bad, owner).await,
            Err(ChatbotError::Validation(_))
        ));

        let mut bad = settings("Helper");
        bad.context = "x".repeat(2001);
        assert!(matches!(
            service.create(bad, owner).await,
            Err(ChatbotError::Validation(_))
        ));

        assert!(matches!(
            service.create(settings(""), owner).await,
            Err(ChatbotError::Validation(_))
        ));
        assert!(service.list_for_user(owner).await.unwrap().is_empty());
    }

    #[test]
    fn test_settings_defaults() {
        let settings: ChatbotSettings =
            serde_json::from_str(r#"{"name": "Bot", "context": "Be kind"}"#).unwrap();

        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 1024);
        assert_eq!(settings.model, ChatbotModel::Gpt35Turbo);
        assert!(settings.description.is_none());
        assert!(settings.validate().is_ok());
    }

    // ========================================================================
    // Send Message Tests
    // ========================================================================

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let (service, completion) = setup(ScriptedCompletion::replying());
        let id = service
            .create(settings("Helper"), Uuid::new_v4())
            .await
            .unwrap();

        let reply = service.send_message(id, "Hi!").await.unwrap();

        assert_eq!(reply.response, "Hello there");
        let well_formed = match reply.response_time.strip_suffix("ms") {
            Some(ms) => ms.parse::<u32>().is_ok(),
            None => reply
                .response_time
                .strip_suffix('s')
                .is_some_and(|secs| secs.contains('.') && secs.parse::<f64>().is_ok()),
        };
        assert!(well_formed, "unexpected format: {}", reply.response_time);
        assert!(reply.total_time >= 0);

        // The completion saw system + user, in that order
        let seen = completion.seen_roles.lock().unwrap().clone();
        assert_eq!(seen, vec![vec![MessageRole::System, MessageRole::User]]);

        let history = service.messages(id).await.unwrap();
        let roles: Vec<MessageRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
        );
        // The reply reports the same latency that was stored with the assistant message
        assert_eq!(history[2].response_time, reply.response_time);
        assert_eq!(history[2].tokens_used, 20);

        let view = service.get(id).await.unwrap();
        assert_eq!(view.usage.user_messages, 1);
        assert_eq!(view.usage.assistant_messages, 1);
        assert_eq!(view.usage.total_tokens_used, 20);
    }

    #[tokio::test]
    async fn test_send_message_to_missing_chatbot() {
        let (service, completion) = setup(ScriptedCompletion::replying());
        let missing = Uuid::new_v4();

        let result = service.send_message(missing, "Hi").await;

        assert!(matches!(result, Err(ChatbotError::NotFound)));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
        assert!(service.messages.find_by_chatbot(missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_provider_failure_keeps_user_message() {
        let (service, _) = setup(ScriptedCompletion::new(|| {
            Err(CompletionError::Provider {
                status: 500,
                detail: "upstream exploded".to_string(),
            })
        }));
        let id = service
            .create(settings("Helper"), Uuid::new_v4())
            .await
            .unwrap();

        let result = service.send_message(id, "Hi").await;

        match result {
            Err(ChatbotError::Provider(message)) => assert!(message.contains("500")),
            other => panic!("expected provider error, got {:?}", other),
        }

        let history = service.messages(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_send_message_timeout_is_unavailable() {
        let (service, _) = setup(ScriptedCompletion::new(|| Err(CompletionError::Timeout)));
        let id = service
            .create(settings("Helper"), Uuid::new_v4())
            .await
            .unwrap();

        assert!(matches!(
            service.send_message(id, "Hi").await,
            Err(ChatbotError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_send_message_validates_length() {
        let (service, completion) = setup(ScriptedCompletion::replying());
        let id = service
            .create(settings("Helper"), Uuid::new_v4())
            .await
            .unwrap();

        assert!(matches!(
            service.send_message(id, "   ").await,
            Err(ChatbotError::Validation(_))
        ));
        assert!(matches!(
            service.send_message(id, &"a".repeat(2001)).await,
            Err(ChatbotError::Validation(_))
        ));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
    }

    // ========================================================================
    // Ownership Tests
    // ========================================================================

    #[tokio::test]
    async fn test_update_by_owner() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();
        let id = service.create(settings("Helper"), owner).await.unwrap();

        let mut changed = settings("Renamed");
        changed.context = "New context".to_string();
        let view = service.update(id, changed, owner).await.unwrap();

        assert_eq!(view.name, "Renamed");
        assert_eq!(view.context, "New context");
        assert!(view.updated_at >= view.created_at);

        // History keeps the original system message
        let history = service.messages(id).await.unwrap();
        assert_eq!(history[0].content, "You are a helpful assistant.");
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();
        let id = service.create(settings("Helper"), owner).await.unwrap();

        let result = service.update(id, settings("Hijacked"), Uuid::new_v4()).await;

        assert!(matches!(result, Err(ChatbotError::Forbidden)));
        assert_eq!(service.get(id).await.unwrap().name, "Helper");
    }

    #[tokio::test]
    async fn test_update_missing_chatbot() {
        let (service, _) = setup(ScriptedCompletion::replying());

        let result = service
            .update(Uuid::new_v4(), settings("Ghost"), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(ChatbotError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_forbidden() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();
        let id = service.create(settings("Helper"), owner).await.unwrap();

        let result = service.delete(id, Uuid::new_v4()).await;

        assert!(matches!(result, Err(ChatbotError::Forbidden)));
        assert!(service.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_cascades_messages() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();
        let id = service.create(settings("Helper"), owner).await.unwrap();
        service.send_message(id, "Hi").await.unwrap();

        service.delete(id, owner).await.unwrap();

        assert!(matches!(service.get(id).await, Err(ChatbotError::NotFound)));
        assert!(matches!(
            service.messages(id).await,
            Err(ChatbotError::NotFound)
        ));
        assert!(service.messages.find_by_chatbot(id).await.unwrap().is_empty());
    }

    // ========================================================================
    // Listing Tests
    // ========================================================================

    #[tokio::test]
    async fn test_list_for_user_only_returns_owned() {
        let (service, _) = setup(ScriptedCompletion::replying());
        let owner = Uuid::new_v4();
        service.create(settings("One"), owner).await.unwrap();
        service.create(settings("Two"), owner).await.unwrap();
        service.create(settings("Other"), Uuid::new_v4()).await.unwrap();

        let views = service.list_for_user(owner).await.unwrap();

        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.user_id == owner));
    }

    #[test]
    fn test_view_serializes_usage_flat() {
        let now = Utc::now();
        let chatbot = Chatbot {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Bot".to_string(),
            description: None,
            context: "ctx".to_string(),
            temperature: 0.5,
            model: ChatbotModel::Gpt4,
            max_tokens: 100,
            created_at: now,
            updated_at: now,
        };
        let messages = vec![Message::assistant(chatbot.id, "a", 5, 1200)];

        let json = serde_json::to_value(ChatbotView::new(chatbot, &messages)).unwrap();

        assert_eq!(json["total_messages"], 1);
        assert_eq!(json["total_tokens_used"], 5);
        assert_eq!(json["average_response_time"], 1200);
        assert_eq!(json["model"], "Gpt4");
    }

    #[test]
    fn test_message_view_formats_response_time() {
        let view = MessageView::from(Message::assistant(Uuid::new_v4(), "a", 1, 2500));
        assert_eq!(view.response_time, "2.5s");

        let view = MessageView::from(Message::user(Uuid::new_v4(), "q"));
        assert_eq!(view.response_time, "0ms");
    }
}
