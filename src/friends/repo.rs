use async_trait::async_trait;
use sqlx::PgConnection;

use crate::friends::dto::{FriendProfile, PendingInvite};
use crate::friends::repo_types::{Friend, FriendInvite};

/// Invitations and bidirectional friendship links. Same soft-delete contract
/// as the auth stores: reads see live rows only, deletes stamp `deleted_at`.
#[async_trait]
pub trait FriendStore: Send + Sync {
    async fn create_invite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<FriendInvite>;

    /// Live invite for the exact ordered pair, if any.
    async fn invite_between(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Option<FriendInvite>>;

    /// Invite by id, restricted to the given addressee. A forged id from
    /// someone else's inbox does not resolve.
    async fn invite_for_recipient(
        &self,
        conn: &mut PgConnection,
        recipient_id: i64,
        invite_id: i64,
    ) -> anyhow::Result<Option<FriendInvite>>;

    /// Soft-delete an invite the user participates in (either side).
    /// Returns false when no live row matched.
    async fn delete_invite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        invite_id: i64,
    ) -> anyhow::Result<bool>;

    /// Invites addressed to the user, oldest first, with inviter profiles.
    async fn pending_invites(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Vec<PendingInvite>>;

    async fn friend_between(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Option<Friend>>;

    /// Create both directions of the friendship in one statement.
    async fn create_link(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Vec<Friend>>;

    /// Friends of the user, oldest friendship first.
    async fn friends_of(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Vec<FriendProfile>>;
}

pub struct PgFriendStore;

#[async_trait]
impl FriendStore for PgFriendStore {
    async fn create_invite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<FriendInvite> {
        let invite = sqlx::query_as::<_, FriendInvite>(
            r#"
            INSERT INTO friend_invites (user_id, with_user_id)
            VALUES ($1, $2)
            RETURNING id, user_id, with_user_id, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(with_user_id)
        .fetch_one(conn)
        .await?;
        Ok(invite)
    }

    async fn invite_between(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Option<FriendInvite>> {
        let invite = sqlx::query_as::<_, FriendInvite>(
            r#"
            SELECT id, user_id, with_user_id, created_at, updated_at
            FROM friend_invites
            WHERE user_id = $1 AND with_user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(with_user_id)
        .fetch_optional(conn)
        .await?;
        Ok(invite)
    }

    async fn invite_for_recipient(
        &self,
        conn: &mut PgConnection,
        recipient_id: i64,
        invite_id: i64,
    ) -> anyhow::Result<Option<FriendInvite>> {
        let invite = sqlx::query_as::<_, FriendInvite>(
            r#"
            SELECT id, user_id, with_user_id, created_at, updated_at
            FROM friend_invites
            WHERE id = $1 AND with_user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(invite_id)
        .bind(recipient_id)
        .fetch_optional(conn)
        .await?;
        Ok(invite)
    }

    async fn delete_invite(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        invite_id: i64,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE friend_invites
            SET deleted_at = now()
            WHERE id = $1
              AND (user_id = $2 OR with_user_id = $2)
              AND deleted_at IS NULL
            "#,
        )
        .bind(invite_id)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn pending_invites(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Vec<PendingInvite>> {
        let rows = sqlx::query_as::<_, PendingInvite>(
            r#"
            SELECT fi.id, fi.user_id, u.displayed_name, u.profile_image, fi.created_at
            FROM friend_invites fi
            JOIN users u ON fi.user_id = u.id
            WHERE fi.with_user_id = $1
              AND fi.deleted_at IS NULL
              AND u.deleted_at IS NULL
            ORDER BY fi.id
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    async fn friend_between(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Option<Friend>> {
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            SELECT id, user_id, with_user_id, created_at, updated_at
            FROM friends
            WHERE user_id = $1 AND with_user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(with_user_id)
        .fetch_optional(conn)
        .await?;
        Ok(friend)
    }

    async fn create_link(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        with_user_id: i64,
    ) -> anyhow::Result<Vec<Friend>> {
        let rows = sqlx::query_as::<_, Friend>(
            r#"
            INSERT INTO friends (user_id, with_user_id)
            VALUES ($1, $2), ($2, $1)
            RETURNING id, user_id, with_user_id, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(with_user_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    async fn friends_of(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Vec<FriendProfile>> {
        let rows = sqlx::query_as::<_, FriendProfile>(
            r#"
            SELECT u.id, u.displayed_name, u.profile_image
            FROM friends f
            JOIN users u ON f.with_user_id = u.id
            WHERE f.user_id = $1
              AND f.deleted_at IS NULL
              AND u.deleted_at IS NULL
            ORDER BY f.id
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }
}
