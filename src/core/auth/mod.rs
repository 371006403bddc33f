//! Authentication module for chatbot-hub
//!
//! This module provides authentication functionality including:
//! - Password hashing and verification
//! - JWT access/refresh token issuance and validation
//! - User registration, login and token refresh
//! - REST API endpoints for auth operations

pub mod api;
pub mod jwt;
pub mod password;
pub mod service;

pub use api::{AuthApiState, auth_api_router};
pub use jwt::{AccessClaims, Claims, JwtConfig, JwtError, JwtService, RefreshClaims, TokenPair};
pub use password::{PasswordError, PasswordHasher};
pub use service::{
    AuthError, AuthResponse, AuthService, LoginRequest, RefreshRequest, RegisterRequest,
};
