//! Shared HTTP plumbing
//!
//! The JSON error body every handler returns, and the `AuthUser` extractor
//! that guards the bearer-protected routes.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Serialize;
use uuid::Uuid;

use crate::core::auth::jwt::{JwtError, JwtService};

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Build an error response. Internal detail goes to the log, never to the body.
pub fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("{}", message);
        "Internal server error".to_string()
    } else {
        message
    };

    (status, Json(ApiError::new(message, code))).into_response()
}

// ============================================================================
// Bearer Authentication
// ============================================================================

/// Caller identity taken from a validated access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Why a bearer-protected request was turned away
#[derive(Debug, thiserror::Error)]
pub enum BearerRejection {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Access token expired")]
    Expired,

    #[error("Invalid access token")]
    InvalidToken,
}

impl From<JwtError> for BearerRejection {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => BearerRejection::Expired,
            _ => BearerRejection::InvalidToken,
        }
    }
}

impl IntoResponse for BearerRejection {
    fn into_response(self) -> Response {
        let code = match &self {
            BearerRejection::MissingToken => "MISSING_TOKEN",
            BearerRejection::Expired => "TOKEN_EXPIRED",
            BearerRejection::InvalidToken => "INVALID_TOKEN",
        };

        error_response(StatusCode::UNAUTHORIZED, code, self.to_string())
    }
}

/// Only access tokens pass. A refresh token is rejected even though its
/// signature is valid.
impl<S> FromRequestParts<S> for AuthUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BearerRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| BearerRejection::MissingToken)?;

        let jwt = JwtService::from_ref(state);
        let claims = jwt.validate_access_token(bearer.token()).map_err(|e| {
            tracing::warn!("Bearer token rejected: {}", e);
            BearerRejection::from(e)
        })?;

        Ok(AuthUser {
            id: claims.subject(),
            name: claims.name().to_string(),
            email: claims.email().to_string(),
        })
    }
}
