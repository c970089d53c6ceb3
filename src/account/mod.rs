/// Account management system
///
/// Handles registration, credential checks, profile edits and the channel
/// view of an account. Token issuance lives in `auth::token`.

mod manager;
pub mod password;

pub use manager::AccountManager;
#[cfg(test)]
pub(crate) use manager::test_support;
pub use password::{Argon2Hasher, PasswordHasher};

use crate::db::account::AccountView;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(
        length(min = 1, max = 64, message = "username must be 1-64 characters"),
        does_not_contain(pattern = "@", message = "username cannot contain '@'")
    )]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

impl RegisterRequest {
    /// Trim surrounding whitespace and lower-case the username
    pub fn normalized(self) -> Self {
        Self {
            fullname: self.fullname.trim().to_string(),
            email: self.email.trim().to_string(),
            username: self.username.trim().to_lowercase(),
            password: self.password,
            avatar: self.avatar.filter(|s| !s.trim().is_empty()),
            cover_image: self.cover_image.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Login request - either username or email identifies the account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// Session response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: AccountView,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token refresh request; the cookie is used when the body omits the token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Rotated token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 1, message = "newPassword is required"))]
    pub new_password: String,
}

/// Profile update request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, message = "fullname cannot be empty"))]
    pub fullname: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

/// Account as a channel, with subscription counts relative to the viewer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}
