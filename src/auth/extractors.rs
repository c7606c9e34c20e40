use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::auth::repo_types::Session;
use crate::error::AppError;
use crate::state::AppState;

/// Request-scoped identity for private routes.
///
/// Extracts the bearer token from `Authorization`, validates it against the
/// session store, and hands the handler a typed struct instead of loose
/// context values.
pub struct AuthSession {
    pub user_id: i64,
    pub session: Session,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::SessionInvalid)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AppError::SessionInvalid)?;

        let session = state.auth.validate_cookie(token).await?;
        Ok(AuthSession {
            user_id: session.user_id,
            session,
        })
    }
}
