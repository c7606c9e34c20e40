use std::sync::Arc;

use anyhow::{anyhow, Context};
use base64::{engine::general_purpose::STANDARD, Engine};
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{CredentialStore, PgCredentialStore, PgUserStore, UserStore};
use crate::error::AppError;
use crate::users::dto::UserResponse;

const MAX_IMAGE_CHARS: usize = 10_000;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Profile reads and updates, plus the password-change path which shares the
/// credential store with `AuthService`.
pub struct UserService {
    db: PgPool,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            users: Arc::new(PgUserStore),
            credentials: Arc::new(PgCredentialStore),
        }
    }

    /// Fetch a profile. Private fields are included only when users look at
    /// their own profile.
    pub async fn get(&self, id: i64, requester_id: i64) -> Result<UserResponse, AppError> {
        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let user = self
            .users
            .by_id(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        Ok(UserResponse::from_user(user, id == requester_id))
    }

    /// Replace the password after checking the old one.
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await.context("begin transaction")?;

        let cred = self
            .credentials
            .by_user_id(&mut tx, user_id)
            .await?
            .ok_or_else(|| anyhow!("no credential for user {user_id}"))?;

        if !verify_password(old_password, &cred.password_hash)? {
            return Err(AppError::BadRequest("invalid old password".into()));
        }

        let hash = hash_password(new_password)?;
        self.credentials.update_hash(&mut tx, cred.id, &hash).await?;
        tx.commit().await.context("commit transaction")?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        displayed_name: &str,
        email: Option<&str>,
    ) -> Result<UserResponse, AppError> {
        if let Some(email) = email {
            if !is_valid_email(email) {
                return Err(AppError::BadRequest("invalid email".into()));
            }
        }

        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let user = self
            .users
            .update_profile(&mut conn, user_id, displayed_name, email)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        Ok(UserResponse::from_user(user, true))
    }

    pub async fn update_image(
        &self,
        user_id: i64,
        profile_image: Option<&str>,
    ) -> Result<UserResponse, AppError> {
        if let Some(image) = profile_image {
            if image.len() > MAX_IMAGE_CHARS || STANDARD.decode(image).is_err() {
                return Err(AppError::BadRequest("invalid profile image".into()));
            }
        }

        let mut conn = self.db.acquire().await.context("acquire connection")?;
        let user = self
            .users
            .update_image(&mut conn, user_id, profile_image)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        Ok(UserResponse::from_user(user, true))
    }
}

#[cfg(test)]
mod email_tests {
    use super::is_valid_email;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+tag@sub.domain.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("nodomain@"));
    }
}
