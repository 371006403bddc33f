//! User profile service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::db::models::{MAX_USER_EMAIL_LEN, MAX_USER_NAME_LEN, User};
use crate::core::db::store::{ChatbotStore, StoreError, UserStore};

const MIN_PASSWORD_LEN: usize = 6;

/// User service error types
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Current password is incorrect")]
    InvalidPassword,

    #[error("Users may only delete their own account")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => UserError::DuplicateEmail,
            _ => UserError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for UserError {
    fn from(err: PasswordError) -> Self {
        UserError::Internal(err.to_string())
    }
}

/// Request for updating name and email
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<(), UserError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_USER_NAME_LEN {
            return Err(UserError::Validation(format!(
                "Name must be between 1 and {} characters",
                MAX_USER_NAME_LEN
            )));
        }

        let email_len = self.email.trim().chars().count();
        if email_len == 0 || email_len > MAX_USER_EMAIL_LEN {
            return Err(UserError::Validation(format!(
                "Email must be between 1 and {} characters",
                MAX_USER_EMAIL_LEN
            )));
        }

        Ok(())
    }
}

/// Request for changing password
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile of the calling user
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_chatbots: usize,
}

/// Entry of the user listing
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub total_chatbots: usize,
}

/// User service
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    chatbots: Arc<dyn ChatbotStore>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        chatbots: Arc<dyn ChatbotStore>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            chatbots,
            hasher,
        }
    }

    async fn find(&self, user_id: Uuid) -> Result<User, UserError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn chatbot_count(&self, user_id: Uuid) -> Result<usize, UserError> {
        Ok(self.chatbots.list_by_owner(user_id).await?.len())
    }

    async fn to_profile(&self, user: User) -> Result<UserProfile, UserError> {
        let total_chatbots = self.chatbot_count(user.id).await?;

        Ok(UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            total_chatbots,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, UserError> {
        let user = self.find(user_id).await?;
        self.to_profile(user).await
    }

    /// Change name and email. Emails are compared exactly as given.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, UserError> {
        request.validate()?;

        let mut user = self.find(user_id).await?;

        if let Some(existing) = self.users.find_by_email(&request.email).await?
            && existing.id != user_id
        {
            return Err(UserError::DuplicateEmail);
        }

        user.name = request.name;
        user.email = request.email;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        tracing::info!(user_id = %user_id, "Profile updated");

        self.to_profile(user).await
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), UserError> {
        let mut user = self.find(user_id).await?;

        if !self
            .hasher
            .verify(&request.current_password, &user.password_hash)
        {
            tracing::warn!(user_id = %user_id, "Password change rejected");
            return Err(UserError::InvalidPassword);
        }

        if request.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::Validation(format!(
                "New password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        user.password_hash = self.hasher.hash(&request.new_password)?;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        tracing::info!(user_id = %user_id, "Password changed");

        Ok(())
    }

    /// Delete an account together with its chatbots and their messages
    pub async fn delete(&self, user_id: Uuid, requester_id: Uuid) -> Result<(), UserError> {
        if user_id != requester_id {
            tracing::warn!(%user_id, %requester_id, "Account delete forbidden");
            return Err(UserError::Forbidden);
        }

        if !self.users.delete(user_id).await? {
            return Err(UserError::NotFound);
        }

        tracing::info!(user_id = %user_id, "Account deleted");

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<UserSummary>, UserError> {
        let users = self.users.list_all().await?;

        let mut summaries = Vec::with_capacity(users.len());
        for user in users {
            let total_chatbots = self.chatbot_count(user.id).await?;
            summaries.push(UserSummary {
                id: user.id,
                name: user.name,
                email: user.email,
                created_at: user.created_at,
                total_chatbots,
            });
        }

        Ok(summaries)
    }
}
