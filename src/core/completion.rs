//! Chat completion client
//!
//! Sends a chatbot's configuration and conversation history to an
//! OpenAI-compatible `/chat/completions` endpoint and returns the reply text
//! together with the token usage the provider reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::config::ConfigError;
use crate::core::db::models::{Chatbot, Message};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Reply text used when the provider returns no content
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "[Empty response from the model]";

/// Completion provider configuration loaded from environment
#[derive(Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let api_base = lookup("OPENAI_API_BASE")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = match lookup("OPENAI_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("OPENAI_TIMEOUT_SECS"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            api_base,
            timeout_secs,
        })
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

/// Completion errors
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion provider returned {status}: {detail}")]
    Provider { status: u16, detail: String },

    #[error("Completion provider timed out")]
    Timeout,

    #[error("Failed to reach completion provider: {0}")]
    Transport(String),

    #[error("Malformed completion response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_decode() {
            CompletionError::InvalidResponse(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

/// Generated reply and its token usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

/// External text-generation call
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// `history` is the full conversation, oldest first, system message included.
    async fn complete(
        &self,
        chatbot: &Chatbot,
        history: &[Message],
    ) -> Result<Completion, CompletionError>;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'static str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: i32,
}

impl<'a> ChatRequest<'a> {
    fn new(chatbot: &Chatbot, history: &'a [Message]) -> Self {
        Self {
            model: chatbot.model.api_name(),
            messages: history
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: chatbot.temperature,
            max_tokens: chatbot.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i32,
    #[serde(default)]
    completion_tokens: i32,
    #[serde(default)]
    total_tokens: i32,
}

impl ChatResponse {
    fn into_completion(self) -> Result<Completion, CompletionError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            CompletionError::InvalidResponse("response has no choices".to_string())
        })?;

        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| EMPTY_RESPONSE_PLACEHOLDER.to_string());

        Ok(Completion {
            text,
            prompt_tokens: self.usage.prompt_tokens,
            completion_tokens: self.usage.completion_tokens,
            total_tokens: self.usage.total_tokens,
        })
    }
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// `CompletionClient` backed by an OpenAI-compatible HTTP API
#[derive(Clone)]
pub struct OpenAiClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        chatbot: &Chatbot,
        history: &[Message],
    ) -> Result<Completion, CompletionError> {
        let request = ChatRequest::new(chatbot, history);

        tracing::debug!(
            "Completion request: model={}, messages_count={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("Completion provider error {}: {}", status, detail);
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                detail,
            });
        }

        response.json::<ChatResponse>().await?.into_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::models::ChatbotModel;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use chrono::Utc;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn chatbot() -> Chatbot {
        let now = Utc::now();
        Chatbot {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Helper".to_string(),
            description: None,
            context: "Be brief.".to_string(),
            temperature: 0.2,
            model: ChatbotModel::Gpt4o,
            max_tokens: 256,
            created_at: now,
            updated_at: now,
        }
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// Serve `router` on an ephemeral port and return its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // ========================================================================
    // Config Tests
    // ========================================================================

    #[test]
    fn test_config_from_vars_defaults() {
        let config = CompletionConfig::from_vars(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.api_base, "https://api.openai.com/v1");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(
            config.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_config_from_vars_overrides() {
        let config = CompletionConfig::from_vars(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1/"),
            ("OPENAI_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_config_requires_api_key() {
        assert!(matches!(
            CompletionConfig::from_vars(lookup(&[])),
            Err(ConfigError::Missing("OPENAI_API_KEY"))
        ));
        assert!(matches!(
            CompletionConfig::from_vars(lookup(&[("OPENAI_API_KEY", " ")])),
            Err(ConfigError::Missing("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        let result = CompletionConfig::from_vars(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("OPENAI_TIMEOUT_SECS"))
        ));
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let debug = format!("{:?}", CompletionConfig::new("sk-very-secret"));
        assert!(!debug.contains("sk-very-secret"));
    }

    // ========================================================================
    // Wire Format Tests
    // ========================================================================

    #[test]
    fn test_request_body() {
        let bot = chatbot();
        let history = vec![
            Message::system(bot.id, "Be brief."),
            Message::user(bot.id, "Hi"),
        ];

        let body = serde_json::to_value(ChatRequest::new(&bot, &history)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_null_content_becomes_placeholder() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null}}]
        }))
        .unwrap();

        let completion = response.into_completion().unwrap();
        assert_eq!(completion.text, EMPTY_RESPONSE_PLACEHOLDER);
        assert_eq!(completion.total_tokens, 0);
    }

    #[test]
    fn test_missing_choices_is_invalid() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            response.into_completion(),
            Err(CompletionError::InvalidResponse(_))
        ));
    }

    // ========================================================================
    // Client Tests
    // ========================================================================

    #[tokio::test]
    async fn test_complete_success() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-4o");
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                    "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
                }))
            }),
        );
        let base = serve(router).await;
        let client =
            OpenAiClient::new(CompletionConfig::new("sk-test").api_base(format!("{}/v1", base)))
                .unwrap();

        let bot = chatbot();
        let completion = client
            .complete(&bot, &[Message::user(bot.id, "Hi")])
            .await
            .unwrap();

        assert_eq!(completion.text, "Hello!");
        assert_eq!(completion.prompt_tokens, 9);
        assert_eq!(completion.completion_tokens, 3);
        assert_eq!(completion.total_tokens, 12);
    }

    #[tokio::test]
    async fn test_complete_provider_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
        );
        let base = serve(router).await;
        let client =
            OpenAiClient::new(CompletionConfig::new("sk-test").api_base(format!("{}/v1", base)))
                .unwrap();

        let bot = chatbot();
        let result = client.complete(&bot, &[]).await;

        match result {
            Err(CompletionError::Provider { status, detail }) => {
                assert_eq!(status, 429);
                assert_eq!(detail, "rate limited");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_timeout() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(router).await;
        let client = OpenAiClient::new(
            CompletionConfig::new("sk-test")
                .api_base(format!("{}/v1", base))
                .timeout_secs(1),
        )
        .unwrap();

        let bot = chatbot();
        let result = client.complete(&bot, &[]).await;

        assert!(matches!(result, Err(CompletionError::Timeout)));
    }
}
