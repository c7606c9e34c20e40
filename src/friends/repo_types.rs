use sqlx::FromRow;
use time::OffsetDateTime;

/// Directed invitation edge: `user_id` invited `with_user_id`.
/// Consumed (soft-deleted) exactly once, by acceptance or rejection.
#[derive(Debug, Clone, FromRow)]
pub struct FriendInvite {
    pub id: i64,
    pub user_id: i64,
    pub with_user_id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One side of a symmetric friendship; the counterpart row always exists.
#[derive(Debug, Clone, FromRow)]
pub struct Friend {
    pub id: i64,
    pub user_id: i64,
    pub with_user_id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
