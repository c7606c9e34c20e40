use async_trait::async_trait;
use sqlx::PgConnection;

use crate::auth::repo_types::{Credential, Session, User};

/// Store traits take a `&mut PgConnection` so a service can run several
/// store calls inside one transaction (`&mut *tx`), which is the only
/// concurrency-control mechanism in this subsystem.
///
/// Every read filters on `deleted_at IS NULL` and every delete sets the
/// timestamp instead of removing the row.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn by_id(&self, conn: &mut PgConnection, id: i64) -> anyhow::Result<Option<User>>;
    async fn by_username(
        &self,
        conn: &mut PgConnection,
        username: &str,
    ) -> anyhow::Result<Option<User>>;
    async fn create(
        &self,
        conn: &mut PgConnection,
        username: &str,
        displayed_name: &str,
    ) -> anyhow::Result<User>;
    async fn update_profile(
        &self,
        conn: &mut PgConnection,
        id: i64,
        displayed_name: &str,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>>;
    async fn update_image(
        &self,
        conn: &mut PgConnection,
        id: i64,
        profile_image: Option<&str>,
    ) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        password_hash: &str,
    ) -> anyhow::Result<Credential>;
    async fn by_user_id(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Option<Credential>>;
    async fn update_hash(
        &self,
        conn: &mut PgConnection,
        id: i64,
        password_hash: &str,
    ) -> anyhow::Result<Credential>;
    async fn bump_failed_attempts(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> anyhow::Result<Credential>;
    async fn reset_failed_attempts(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> anyhow::Result<Credential>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session for the user, or replace the live one in place.
    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        token_hash: &str,
    ) -> anyhow::Result<Session>;
    async fn by_token_hash(
        &self,
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> anyhow::Result<Option<Session>>;
    /// Soft-delete by id. Returns false when no live row matched.
    async fn delete(&self, conn: &mut PgConnection, id: i64) -> anyhow::Result<bool>;
}

pub struct PgUserStore;

#[async_trait]
impl UserStore for PgUserStore {
    async fn by_id(&self, conn: &mut PgConnection, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, displayed_name, email, profile_image, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    async fn by_username(
        &self,
        conn: &mut PgConnection,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, displayed_name, email, profile_image, created_at, updated_at
            FROM users
            WHERE username = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        conn: &mut PgConnection,
        username: &str,
        displayed_name: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, displayed_name)
            VALUES ($1, $2)
            RETURNING id, username, displayed_name, email, profile_image, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(displayed_name)
        .fetch_one(conn)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        conn: &mut PgConnection,
        id: i64,
        displayed_name: &str,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET displayed_name = $2, email = $3, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, displayed_name, email, profile_image, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(displayed_name)
        .bind(email)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    async fn update_image(
        &self,
        conn: &mut PgConnection,
        id: i64,
        profile_image: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET profile_image = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, displayed_name, email, profile_image, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(profile_image)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }
}

pub struct PgCredentialStore;

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        password_hash: &str,
    ) -> anyhow::Result<Credential> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (user_id, password_hash)
            VALUES ($1, $2)
            RETURNING id, user_id, password_hash, failed_attempts, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .fetch_one(conn)
        .await?;
        Ok(cred)
    }

    async fn by_user_id(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
    ) -> anyhow::Result<Option<Credential>> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"
            SELECT id, user_id, password_hash, failed_attempts, created_at, updated_at
            FROM credentials
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(cred)
    }

    async fn update_hash(
        &self,
        conn: &mut PgConnection,
        id: i64,
        password_hash: &str,
    ) -> anyhow::Result<Credential> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"
            UPDATE credentials
            SET password_hash = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, user_id, password_hash, failed_attempts, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_one(conn)
        .await?;
        Ok(cred)
    }

    async fn bump_failed_attempts(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> anyhow::Result<Credential> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"
            UPDATE credentials
            SET failed_attempts = failed_attempts + 1, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, user_id, password_hash, failed_attempts, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(cred)
    }

    async fn reset_failed_attempts(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> anyhow::Result<Credential> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"
            UPDATE credentials
            SET failed_attempts = 0, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, user_id, password_hash, failed_attempts, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await?;
        Ok(cred)
    }
}

pub struct PgSessionStore;

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn upsert(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        token_hash: &str,
    ) -> anyhow::Result<Session> {
        // Conflict target is the partial unique index on live sessions, so a
        // re-login replaces the current token while past (soft-deleted)
        // sessions are left untouched.
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash)
            VALUES ($1, $2)
            ON CONFLICT (user_id) WHERE deleted_at IS NULL
            DO UPDATE SET token_hash = EXCLUDED.token_hash, updated_at = now()
            RETURNING id, user_id, token_hash, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(conn)
        .await?;
        Ok(session)
    }

    async fn by_token_hash(
        &self,
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, token_hash, created_at, updated_at
            FROM sessions
            WHERE token_hash = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await?;
        Ok(session)
    }

    async fn delete(&self, conn: &mut PgConnection, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE sessions
            SET deleted_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
