use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthSession,
    error::AppError,
    state::AppState,
    users::dto::{UpdateImageRequest, UpdatePasswordRequest, UpdateProfileRequest, UserResponse},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user/:id", get(get_user))
        .route("/user/password", put(update_password))
        .route("/user/profile", put(update_profile))
        .route("/user/image", put(update_image))
}

#[instrument(skip(state, auth))]
async fn get_user(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get(id, auth.user_id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, auth, payload))]
async fn update_password(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(AppError::BadRequest(
            "old_password and new_password are required".into(),
        ));
    }
    if payload.new_password == payload.old_password {
        return Err(AppError::BadRequest(
            "new password must differ from the old one".into(),
        ));
    }

    state
        .users
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, auth, payload))]
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if payload.displayed_name.trim().is_empty() {
        return Err(AppError::BadRequest("displayed_name is required".into()));
    }

    let user = state
        .users
        .update_profile(
            auth.user_id,
            &payload.displayed_name,
            payload.email.as_deref(),
        )
        .await?;
    Ok(Json(user))
}

#[instrument(skip(state, auth, payload))]
async fn update_image(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .update_image(auth.user_id, payload.profile_image.as_deref())
        .await?;
    Ok(Json(user))
}
