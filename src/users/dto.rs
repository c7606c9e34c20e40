use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::User;

/// Profile as seen through the API. Username and email are private and only
/// present when the user asks about themselves.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub displayed_name: String,
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserResponse {
    pub fn from_user(user: User, include_private: bool) -> Self {
        Self {
            id: user.id,
            displayed_name: user.displayed_name,
            profile_image: user.profile_image,
            username: include_private.then_some(user.username),
            email: if include_private { user.email } else { None },
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub displayed_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    pub profile_image: Option<String>,
}
