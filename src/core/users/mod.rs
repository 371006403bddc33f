//! User profile management

pub mod api;
pub mod service;

pub use api::{UserApiState, user_api_router};
pub use service::{
    ChangePasswordRequest, UpdateProfileRequest, UserError, UserProfile, UserService, UserSummary,
};
