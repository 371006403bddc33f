//! Authentication service
//!
//! Provides business logic for user registration, login, and token refresh.
//! Coordinates between the user store, the password hasher, and the JWT service.
//!
//! Tokens are stateless: nothing is persisted per session, and a refresh token
//! stays valid until it expires even after it has been rotated.

use std::sync::Arc;

use crate::core::auth::jwt::{JwtError, JwtService, TokenPair};
use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::db::models::{MAX_USER_EMAIL_LEN, MAX_USER_NAME_LEN, User};
use crate::core::db::store::{StoreError, UserStore};

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::DuplicateEmail,
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Signing failures only; validation failures are mapped explicitly by the caller.
impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Registration request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens plus the echoed identity of the user they were issued for
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub name: String,
    pub email: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    jwt_service: JwtService,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, jwt_service: JwtService) -> Self {
        Self {
            users,
            hasher,
            jwt_service,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Field limits match the `users` columns, so both stores reject the same input.
    fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
        let name_len = request.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_USER_NAME_LEN {
            return Err(AuthError::Validation(format!(
                "Name must be between 1 and {} characters",
                MAX_USER_NAME_LEN
            )));
        }

        let email_len = request.email.trim().chars().count();
        if email_len == 0 || email_len > MAX_USER_EMAIL_LEN {
            return Err(AuthError::Validation(format!(
                "Email must be between 1 and {} characters",
                MAX_USER_EMAIL_LEN
            )));
        }

        if request.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        Ok(())
    }

    fn respond(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let tokens = self.jwt_service.issue_token_pair(user)?;

        Ok(AuthResponse {
            tokens,
            name: user.name.clone(),
            email: user.email.clone(),
        })
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        Self::validate_registration(&request)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = User::new(request.name, request.email, password_hash);

        // A concurrent registration that slipped past the lookup fails here with Conflict
        self.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.respond(&user)
    }

    /// Login an existing user
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.users.find_by_email(&request.email).await? else {
            tracing::warn!("Login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(&request.password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");

        self.respond(&user)
    }

    /// Exchange a refresh token for a new access/refresh pair
    pub async fn refresh(&self, request: RefreshRequest) -> Result<AuthResponse, AuthError> {
        let claims = self
            .jwt_service
            .validate_refresh_token(&request.refresh_token)
            .map_err(|e| {
                tracing::warn!("Refresh token rejected: {}", e);
                AuthError::InvalidRefreshToken
            })?;

        let user = self
            .users
            .find_by_id(claims.subject())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::debug!(user_id = %user.id, "Tokens refreshed");

        self.respond(&user)
    }
}
