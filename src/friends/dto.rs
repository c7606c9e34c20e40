use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Request body for inviting a user by name.
#[derive(Debug, Deserialize)]
pub struct InviteFriendRequest {
    pub username: String,
}

/// A pending invitation joined with the inviter's public profile.
#[derive(Debug, Serialize, FromRow)]
pub struct PendingInvite {
    pub id: i64,
    pub user_id: i64,
    pub displayed_name: String,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Public profile of a confirmed friend.
#[derive(Debug, Serialize, FromRow)]
pub struct FriendProfile {
    pub id: i64,
    pub displayed_name: String,
    pub profile_image: Option<String>,
}
