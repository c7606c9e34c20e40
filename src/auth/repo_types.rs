use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub displayed_name: String,
    pub email: Option<String>,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Password record, one live row per user. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    pub id: i64,
    pub user_id: i64,
    pub password_hash: String,
    pub failed_attempts: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Session record. Holds only the SHA-256 digest of the bearer token;
/// the raw token exists solely in the login response.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    /// Freshness anchor: sessions expire a fixed 24h after this.
    pub updated_at: OffsetDateTime,
}
