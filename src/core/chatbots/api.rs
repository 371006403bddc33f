//! Chatbot API endpoints
//!
//! All routes require a bearer access token:
//! - GET /api/chatbots - List the caller's chatbots
//! - POST /api/chatbots - Create a chatbot
//! - GET /api/chatbots/{id} - Get a chatbot with usage statistics
//! - PUT /api/chatbots/{id} - Update a chatbot (owner only)
//! - DELETE /api/chatbots/{id} - Delete a chatbot (owner only)
//! - GET /api/chatbots/{id}/messages - Message history
//! - POST /api/chatbots/{id}/messages - Send a message and get the reply

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::JwtService;
use crate::core::chatbots::service::{
    ChatReply, ChatbotError, ChatbotService, ChatbotSettings, ChatbotView, MessageView,
};
use crate::core::http::{AuthUser, error_response};

/// Chatbot API state
#[derive(Clone)]
pub struct ChatbotApiState {
    pub chatbot_service: ChatbotService,
    pub jwt_service: JwtService,
}

impl FromRef<Arc<ChatbotApiState>> for JwtService {
    fn from_ref(state: &Arc<ChatbotApiState>) -> Self {
        state.jwt_service.clone()
    }
}

impl IntoResponse for ChatbotError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ChatbotError::NotFound => (StatusCode::NOT_FOUND, "CHATBOT_NOT_FOUND"),
            ChatbotError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ChatbotError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ChatbotError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            ChatbotError::ProviderUnavailable(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "PROVIDER_UNAVAILABLE")
            }
            ChatbotError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        error_response(status, code, self.to_string())
    }
}

/// Response for chatbot creation
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

/// Request for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Create the chatbot API router
pub fn chatbot_api_router(state: ChatbotApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/chatbots", get(list_handler).post(create_handler))
        .route(
            "/api/chatbots/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route(
            "/api/chatbots/{id}/messages",
            get(messages_handler).post(send_message_handler),
        )
        .with_state(state)
}

/// GET /api/chatbots
async fn list_handler(
    State(state): State<Arc<ChatbotApiState>>,
    user: AuthUser,
) -> Result<Json<Vec<ChatbotView>>, ChatbotError> {
    let views = state.chatbot_service.list_for_user(user.id).await?;
    Ok(Json(views))
}

/// POST /api/chatbots
async fn create_handler(
    State(state): State<Arc<ChatbotApiState>>,
    user: AuthUser,
    Json(settings): Json<ChatbotSettings>,
) -> Result<(StatusCode, Json<CreatedResponse>), ChatbotError> {
    let id = state.chatbot_service.create(settings, user.id).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/chatbots/{id}
async fn get_handler(
    State(state): State<Arc<ChatbotApiState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatbotView>, ChatbotError> {
    let view = state.chatbot_service.get(id).await?;
    Ok(Json(view))
}

/// PUT /api/chatbots/{id}
async fn update_handler(
    State(state): State<Arc<ChatbotApiState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(settings): Json<ChatbotSettings>,
) -> Result<Json<ChatbotView>, ChatbotError> {
    let view = state.chatbot_service.update(id, settings, user.id).await?;
    Ok(Json(view))
}

/// DELETE /api/chatbots/{id}
async fn delete_handler(
    State(state): State<Arc<ChatbotApiState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ChatbotError> {
    state.chatbot_service.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chatbots/{id}/messages
async fn messages_handler(
    State(state): State<Arc<ChatbotApiState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, ChatbotError> {
    let messages = state.chatbot_service.messages(id).await?;
    Ok(Json(messages))
}

/// POST /api/chatbots/{id}/messages
async fn send_message_handler(
    State(state): State<Arc<ChatbotApiState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ChatReply>, ChatbotError> {
    let reply = state
        .chatbot_service
        .send_message(id, &request.message)
        .await?;
    Ok(Json(reply))
}
