//! User API endpoints
//!
//! - GET /api/users - List all users
//! - GET /api/users/profile - Caller's profile
//! - PUT /api/users/profile - Update caller's name and email
//! - PUT /api/users/profile/password - Change caller's password
//! - DELETE /api/users/{id} - Delete an account (own account only)

use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::JwtService;
use crate::core::http::{AuthUser, error_response};
use crate::core::users::service::{
    ChangePasswordRequest, UpdateProfileRequest, UserError, UserProfile, UserService, UserSummary,
};

/// User API state
#[derive(Clone)]
pub struct UserApiState {
    pub user_service: UserService,
    pub jwt_service: JwtService,
}

impl FromRef<Arc<UserApiState>> for JwtService {
    fn from_ref(state: &Arc<UserApiState>) -> Self {
        state.jwt_service.clone()
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            UserError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            UserError::DuplicateEmail => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
            UserError::InvalidPassword => (StatusCode::BAD_REQUEST, "INVALID_PASSWORD"),
            UserError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            UserError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            UserError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        error_response(status, code, self.to_string())
    }
}

/// Create the user API router
pub fn user_api_router(state: UserApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/users", get(list_handler))
        .route(
            "/api/users/profile",
            get(profile_handler).put(update_profile_handler),
        )
        .route("/api/users/profile/password", put(change_password_handler))
        .route("/api/users/{id}", delete(delete_handler))
        .with_state(state)
}

/// GET /api/users
async fn list_handler(
    State(state): State<Arc<UserApiState>>,
    _user: AuthUser,
) -> Result<Json<Vec<UserSummary>>, UserError> {
    Ok(Json(state.user_service.list_all().await?))
}

/// GET /api/users/profile
async fn profile_handler(
    State(state): State<Arc<UserApiState>>,
    user: AuthUser,
) -> Result<Json<UserProfile>, UserError> {
    Ok(Json(state.user_service.profile(user.id).await?))
}

/// PUT /api/users/profile
async fn update_profile_handler(
    State(state): State<Arc<UserApiState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, UserError> {
    Ok(Json(
        state.user_service.update_profile(user.id, request).await?,
    ))
}

/// PUT /api/users/profile/password
async fn change_password_handler(
    State(state): State<Arc<UserApiState>>,
    user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, UserError> {
    state.user_service.change_password(user.id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/{id}
async fn delete_handler(
    State(state): State<Arc<UserApiState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, UserError> {
    state.user_service.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::password::TEST_COST;
    use crate::core::auth::{JwtConfig, PasswordHasher};
    use crate::core::db::memory::MemoryStore;
    use crate::core::db::models::User;
    use crate::core::db::store::UserStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn setup() -> (Router, String, User) {
        let jwt = JwtService::new(JwtConfig::new("user_api_test_secret_key_32_bytes!", 15))
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::with_cost(TEST_COST);

        let user = User::new("Ada", "ada@example.com", hasher.hash("secret").unwrap());
        UserStore::insert(store.as_ref(), &user).await.unwrap();
        let token = jwt.issue_access_token(&user).unwrap().0;

        let router = user_api_router(UserApiState {
            user_service: UserService::new(store.clone(), store, hasher),
            jwt_service: jwt,
        });
        (router, token, user)
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    // ========================================================================
    // Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_profile_endpoint() {
        let (router, token, user) = setup().await;

        let (status, body) = send(&router, "GET", "/api/users/profile", &token, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user.id.to_string());
        assert_eq!(body["total_chatbots"], 0);
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_change_password_endpoint() {
        let (router, token, _) = setup().await;

        let (status, _) = send(
            &router,
            "PUT",
            "/api/users/profile/password",
            &token,
            Some(json!({"current_password": "secret", "new_password": "another-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &router,
            "PUT",
            "/api/users/profile/password",
            &token,
            Some(json!({"current_password": "secret", "new_password": "third-secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PASSWORD");
    }

    #[tokio::test]
    async fn test_delete_someone_else_is_forbidden() {
        let (router, token, _) = setup().await;

        let (status, _) = send(
            &router,
            "DELETE",
            &format!("/api/users/{}", Uuid::new_v4()),
            &token,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_self_then_profile_missing() {
        let (router, token, user) = setup().await;

        let (status, _) = send(
            &router,
            "DELETE",
            &format!("/api/users/{}", user.id),
            &token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // The access token is still valid until it expires, but the user is gone
        let (status, body) = send(&router, "GET", "/api/users/profile", &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_requires_token() {
        let (router, _, _) = setup().await;

        let request = Request::builder()
            .uri("/api/users")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
