use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{
    CredentialStore, PgCredentialStore, PgSessionStore, PgUserStore, SessionStore, UserStore,
};
use crate::auth::repo_types::{Session, User};
use crate::auth::token::{digest_token, generate_token};
use crate::config::AuthConfig;
use crate::error::AppError;

/// Sessions expire a fixed 24h after their last refresh, independent of the
/// configurable lockout window.
const SESSION_TTL: Duration = Duration::hours(24);

/// Registration, login with brute-force lockout, and session issuance.
///
/// Every multi-step operation runs inside one transaction; concurrent logins
/// for the same user serialize on the credential row.
pub struct AuthService {
    db: PgPool,
    cfg: AuthConfig,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(db: PgPool, cfg: AuthConfig) -> Self {
        Self {
            db,
            cfg,
            users: Arc::new(PgUserStore),
            credentials: Arc::new(PgCredentialStore),
            sessions: Arc::new(PgSessionStore),
        }
    }

    /// Create a user together with its credential, or fail without leaving
    /// either row behind.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        displayed_name: &str,
    ) -> Result<User, AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        if self
            .users
            .by_username(&mut tx, username)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("username already exists".into()));
        }

        let hash = hash_password(password)?;
        let user = self.users.create(&mut tx, username, displayed_name).await?;
        self.credentials.create(&mut tx, user.id, &hash).await?;

        tx.commit().await.context("commit transaction")?;
        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Check credentials, applying the failed-attempt lockout.
    ///
    /// Unknown username and wrong password surface as the same
    /// `InvalidCredentials` so the endpoint cannot confirm which usernames
    /// exist.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        let user = self
            .users
            .by_username(&mut tx, username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let mut cred = self
            .credentials
            .by_user_id(&mut tx, user.id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if cred.failed_attempts >= self.cfg.max_failed_attempts {
            let window = Duration::hours(self.cfg.block_duration_hours);
            if OffsetDateTime::now_utc() - cred.updated_at <= window {
                warn!(user_id = user.id, "login attempt on blocked credential");
                return Err(AppError::UserBlocked);
            }
            // Block window has elapsed; the counter starts over.
            cred = self.credentials.reset_failed_attempts(&mut tx, cred.id).await?;
        }

        if !verify_password(password, &cred.password_hash)? {
            self.credentials.bump_failed_attempts(&mut tx, cred.id).await?;
            // The increment must survive the failed login.
            tx.commit().await.context("commit transaction")?;
            warn!(user_id = user.id, "login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if cred.failed_attempts > 0 {
            self.credentials.reset_failed_attempts(&mut tx, cred.id).await?;
        }

        tx.commit().await.context("commit transaction")?;
        info!(user_id = user.id, "user logged in");
        Ok(user)
    }

    /// Soft-delete the session. Deleting an already-deleted or missing row is
    /// not an error; repeated logouts are harmless.
    pub async fn logout(&self, session_id: i64) -> Result<(), AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        self.sessions.delete(&mut conn, session_id).await?;
        Ok(())
    }

    /// Issue a fresh bearer token for the user, replacing any live session.
    /// The raw token is returned exactly once and is unrecoverable after
    /// that; only its digest is stored.
    pub async fn generate_cookie(&self, user_id: i64) -> Result<(Session, String), AppError> {
        let token = generate_token()?;
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let session = self
            .sessions
            .upsert(&mut conn, user_id, &digest_token(&token))
            .await?;
        Ok((session, token))
    }

    /// Resolve a presented bearer token to its session, rejecting unknown
    /// and stale tokens alike.
    pub async fn validate_cookie(&self, token: &str) -> Result<Session, AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let session = self
            .sessions
            .by_token_hash(&mut conn, &digest_token(token))
            .await?
            .ok_or(AppError::SessionInvalid)?;

        if OffsetDateTime::now_utc() - session.updated_at > SESSION_TTL {
            return Err(AppError::SessionInvalid);
        }
        Ok(session)
    }

    pub async fn user_info(&self, user_id: i64) -> Result<User, AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        self.users
            .by_id(&mut conn, user_id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(pool: PgPool) -> AuthService {
        AuthService::new(
            pool,
            AuthConfig {
                max_failed_attempts: 3,
                block_duration_hours: 24,
            },
        )
    }

    async fn failed_attempts(pool: &PgPool, user_id: i64) -> i32 {
        sqlx::query_scalar("SELECT failed_attempts FROM credentials WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .expect("credential row")
    }

    #[sqlx::test]
    async fn register_rejects_duplicate_username(pool: PgPool) {
        let auth = service(pool.clone());
        auth.register("alice", "pw1", "Alice").await.expect("first");

        let err = auth.register("alice", "other", "Alice 2").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM users WHERE username = 'alice' AND deleted_at IS NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn login_checks_password(pool: PgPool) {
        let auth = service(pool);
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();

        let logged_in = auth.login("alice", "pw1").await.expect("correct password");
        assert_eq!(logged_in.id, user.id);

        let err = auth.login("alice", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[sqlx::test]
    async fn unknown_user_and_wrong_password_look_the_same(pool: PgPool) {
        let auth = service(pool);
        auth.register("alice", "pw1", "Alice").await.unwrap();

        let unknown = auth.login("nobody", "pw1").await.unwrap_err();
        let wrong = auth.login("alice", "bad").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[sqlx::test]
    async fn lockout_after_repeated_failures(pool: PgPool) {
        let auth = service(pool.clone());
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();

        for _ in 0..3 {
            let err = auth.login("alice", "bad").await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
        }
        assert_eq!(failed_attempts(&pool, user.id).await, 3);

        // Even the correct password is rejected while the block holds.
        let err = auth.login("alice", "pw1").await.unwrap_err();
        assert!(matches!(err, AppError::UserBlocked));

        // Pretend the block window elapsed.
        sqlx::query(
            "UPDATE credentials SET updated_at = now() - interval '25 hours' WHERE user_id = $1",
        )
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

        auth.login("alice", "pw1").await.expect("login after window");
        assert_eq!(failed_attempts(&pool, user.id).await, 0);
    }

    #[sqlx::test]
    async fn counter_resets_after_successful_login(pool: PgPool) {
        let auth = service(pool.clone());
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();

        auth.login("alice", "bad").await.unwrap_err();
        assert_eq!(failed_attempts(&pool, user.id).await, 1);

        auth.login("alice", "pw1").await.unwrap();
        assert_eq!(failed_attempts(&pool, user.id).await, 0);
    }

    #[sqlx::test]
    async fn cookie_round_trip(pool: PgPool) {
        let auth = service(pool);
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();

        let (session, token) = auth.generate_cookie(user.id).await.unwrap();
        let resolved = auth.validate_cookie(&token).await.expect("fresh token");
        assert_eq!(resolved.id, session.id);
        assert_eq!(resolved.user_id, user.id);

        let err = auth.validate_cookie("never-issued").await.unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));
    }

    #[sqlx::test]
    async fn relogin_supersedes_previous_token(pool: PgPool) {
        let auth = service(pool);
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();

        let (first_session, first_token) = auth.generate_cookie(user.id).await.unwrap();
        let (second_session, second_token) = auth.generate_cookie(user.id).await.unwrap();
        // Upsert reuses the single live row per user.
        assert_eq!(first_session.id, second_session.id);

        auth.validate_cookie(&second_token).await.expect("current token");
        let err = auth.validate_cookie(&first_token).await.unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));
    }

    #[sqlx::test]
    async fn session_expires_after_a_day(pool: PgPool) {
        let auth = service(pool.clone());
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();
        let (session, token) = auth.generate_cookie(user.id).await.unwrap();

        sqlx::query("UPDATE sessions SET updated_at = now() - interval '25 hours' WHERE id = $1")
            .bind(session.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = auth.validate_cookie(&token).await.unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));
    }

    #[sqlx::test]
    async fn logout_is_idempotent(pool: PgPool) {
        let auth = service(pool);
        let user = auth.register("alice", "pw1", "Alice").await.unwrap();
        let (session, token) = auth.generate_cookie(user.id).await.unwrap();

        auth.logout(session.id).await.expect("first logout");
        auth.logout(session.id).await.expect("second logout");

        let err = auth.validate_cookie(&token).await.unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));
    }
}
