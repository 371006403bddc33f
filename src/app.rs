//! HTTP application assembly: stores, services, routers and middleware.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::auth::{AuthApiState, AuthService, JwtService, PasswordHasher, auth_api_router};
use crate::core::chatbots::{ChatbotApiState, ChatbotService, chatbot_api_router};
use crate::core::completion::CompletionClient;
use crate::core::db::{
    ChatbotRepository, ChatbotStore, MemoryStore, MessageRepository, MessageStore, PgPool,
    UserRepository, UserStore, health_check,
};
use crate::core::users::{UserApiState, UserService, user_api_router};

/// Storage backends shared by all services
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub chatbots: Arc<dyn ChatbotStore>,
    pub messages: Arc<dyn MessageStore>,
    /// Probed by `/health`; `None` for the in-process store
    pub pool: Option<PgPool>,
}

impl Stores {
    /// PostgreSQL-backed stores
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            chatbots: Arc::new(ChatbotRepository::new(pool.clone())),
            messages: Arc::new(MessageRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// In-process stores; contents are lost on restart
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            chatbots: store.clone(),
            messages: store,
            pool: None,
        }
    }
}

/// Build the full application router
pub fn build_router(
    stores: Stores,
    jwt_service: JwtService,
    hasher: PasswordHasher,
    completion: Arc<dyn CompletionClient>,
    cors_allowed_origin: Option<&str>,
) -> Router {
    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(stores.pool.clone());

    let auth = auth_api_router(AuthApiState {
        auth_service: AuthService::new(stores.users.clone(), hasher, jwt_service.clone()),
    });

    let chatbots = chatbot_api_router(ChatbotApiState {
        chatbot_service: ChatbotService::new(
            stores.chatbots.clone(),
            stores.messages.clone(),
            completion,
        ),
        jwt_service: jwt_service.clone(),
    });

    let users = user_api_router(UserApiState {
        user_service: UserService::new(stores.users, stores.chatbots, hasher),
        jwt_service,
    });

    Router::new()
        .merge(health)
        .merge(auth)
        .merge(chatbots)
        .merge(users)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_allowed_origin))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            tracing::warn!("Ignoring malformed CORS origin; cross-origin requests are refused");
            layer
        }
        None => layer.allow_origin(Any),
    }
}

/// GET /health
async fn health_handler(State(pool): State<Option<PgPool>>) -> (StatusCode, Json<Value>) {
    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "memory" })),
        );
    };

    match health_check(&pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "database": "down" })),
            )
        }
    }
}
