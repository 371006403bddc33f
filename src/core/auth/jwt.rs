//! JWT utilities for token issuance and validation
//!
//! Tokens are signed with HS256 using a single symmetric key.
//! Access tokens carry `{sub, name, email}` and expire after a configured number of minutes.
//! Refresh tokens carry `{sub, type: "refresh"}` and expire after a configured number of days.
//!
//! There is no server-side session store: a token is valid as long as its signature,
//! issuer, audience, expiry and claim shape check out.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::db::models::User;

/// Default refresh token expiration time (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

const DEFAULT_ISSUER: &str = "chatbot-hub";
const DEFAULT_AUDIENCE: &str = "chatbot-hub-clients";

/// Value of the `type` claim carried by refresh tokens
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Access token expiration in minutes
    pub access_token_expiration_minutes: i64,
    /// Refresh token expiration in days
    pub refresh_token_expiration_days: i64,
    /// Token issuer (`iss`)
    pub issuer: String,
    /// Token audience (`aud`)
    pub audience: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field(
                "access_token_expiration_minutes",
                &self.access_token_expiration_minutes,
            )
            .field(
                "refresh_token_expiration_days",
                &self.refresh_token_expiration_days,
            )
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>, access_token_expiration_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            access_token_expiration_minutes,
            refresh_token_expiration_days: REFRESH_TOKEN_EXPIRATION_DAYS,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, JwtError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(JwtError::MissingSecret)?;

        let access_exp = lookup("JWT_ACCESS_EXPIRATION_MINUTES")
            .ok_or(JwtError::MissingSetting("JWT_ACCESS_EXPIRATION_MINUTES"))?
            .trim()
            .parse::<i64>()
            .map_err(|_| JwtError::InvalidSetting("JWT_ACCESS_EXPIRATION_MINUTES"))?;

        let refresh_exp = match lookup("JWT_REFRESH_EXPIRATION_DAYS") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .map_err(|_| JwtError::InvalidSetting("JWT_REFRESH_EXPIRATION_DAYS"))?,
            None => REFRESH_TOKEN_EXPIRATION_DAYS,
        };

        let issuer = lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let audience = lookup("JWT_AUDIENCE").unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());

        Ok(Self {
            secret,
            access_token_expiration_minutes: access_exp,
            refresh_token_expiration_days: refresh_exp,
            issuer,
            audience,
        })
    }

    /// Set refresh token expiration
    pub fn refresh_token_expiration(mut self, days: i64) -> Self {
        self.refresh_token_expiration_days = days;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set audience
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_SECRET environment variable not set")]
    MissingSecret,

    #[error("{0} environment variable not set")]
    MissingSetting(&'static str),

    #[error("{0} must be an integer")]
    InvalidSetting(&'static str),

    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token decoding failed: {0}")]
    DecodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token type")]
    InvalidTokenType,

    #[error("Invalid token claims")]
    InvalidClaims,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::MissingRequiredClaim(_) => JwtError::InvalidToken,
            _ => JwtError::DecodingError(err.to_string()),
        }
    }
}

/// Wire-level claim set shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User display name (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// User email (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token type marker (`"refresh"` on refresh tokens, absent on access tokens)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// The `type` claim, if any
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Check if this is a refresh token
    pub fn is_refresh_token(&self) -> bool {
        self.token_type() == Some(REFRESH_TOKEN_TYPE)
    }
}

/// Validated access token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    subject: Uuid,
    name: String,
    email: String,
    expires_at: i64,
}

impl AccessClaims {
    pub fn subject(&self) -> Uuid {
        self.subject
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl TryFrom<Claims> for AccessClaims {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        // A refresh token shares the signing key, so the signature alone proves nothing here.
        if claims.token_type.is_some() {
            return Err(JwtError::InvalidTokenType);
        }

        let subject = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidClaims)?;
        let (Some(name), Some(email)) = (claims.name, claims.email) else {
            return Err(JwtError::InvalidClaims);
        };

        Ok(Self {
            subject,
            name,
            email,
            expires_at: claims.exp,
        })
    }
}

/// Validated refresh token claims
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshClaims {
    subject: Uuid,
    expires_at: i64,
}

impl RefreshClaims {
    pub fn subject(&self) -> Uuid {
        self.subject
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl TryFrom<Claims> for RefreshClaims {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if !claims.is_refresh_token() {
            return Err(JwtError::InvalidTokenType);
        }

        let subject = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidClaims)?;

        Ok(Self {
            subject,
            expires_at: claims.exp,
        })
    }
}

/// Token pair (access + refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token (short-lived)
    pub access_token: String,
    /// Refresh token (long-lived)
    pub refresh_token: String,
    /// Access token expiration (Unix timestamp)
    pub access_expires_at: i64,
    /// Refresh token expiration (Unix timestamp)
    pub refresh_expires_at: i64,
    /// Token type (always "Bearer")
    pub token_type: String,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service. An empty signing key is a configuration fault.
    pub fn new(config: JwtConfig) -> Result<Self, JwtError> {
        if config.secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Issue an access token for a user
    pub fn issue_access_token(&self, user: &User) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.access_token_expiration_minutes);

        let claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            token_type: None,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok((self.sign(&claims)?, exp.timestamp()))
    }

    /// Issue a refresh token for a user
    pub fn issue_refresh_token(&self, user: &User) -> Result<(String, i64), JwtError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.config.refresh_token_expiration_days);

        let claims = Claims {
            sub: user.id.to_string(),
            name: None,
            email: None,
            token_type: Some(REFRESH_TOKEN_TYPE.to_string()),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok((self.sign(&claims)?, exp.timestamp()))
    }

    /// Issue both access and refresh tokens
    pub fn issue_token_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        let (access_token, access_expires_at) = self.issue_access_token(user)?;
        let (refresh_token, refresh_expires_at) = self.issue_refresh_token(user)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify signature, issuer, audience and expiry, returning the raw claims
    pub fn decode_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Zero clock skew
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Validate an access token. Refresh tokens are rejected.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        AccessClaims::try_from(self.decode_token(token)?)
    }

    /// Validate a refresh token and extract its claims
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        RefreshClaims::try_from(self.decode_token(token)?)
    }
}
