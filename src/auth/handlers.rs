use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        extractors::AuthSession,
        repo_types::User,
    },
    error::AppError,
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn private_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(current_user))
}

fn require(field: &str, name: &str) -> Result<(), AppError> {
    if field.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{name} is required")));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    require(&payload.username, "username")?;
    require(&payload.password, "password")?;
    require(&payload.displayed_name, "displayed_name")?;

    let user = state
        .auth
        .register(&payload.username, &payload.password, &payload.displayed_name)
        .await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    require(&payload.username, "username")?;
    require(&payload.password, "password")?;

    let user = state.auth.login(&payload.username, &payload.password).await?;
    let (_, token) = state.auth.generate_cookie(user.id).await?;
    Ok(Json(LoginResponse { token, user }))
}

#[instrument(skip(state, auth))]
async fn logout(State(state): State<AppState>, auth: AuthSession) -> Result<StatusCode, AppError> {
    state.auth.logout(auth.session.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, auth))]
async fn current_user(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<User>, AppError> {
    let user = state.auth.user_info(auth.user_id).await?;
    Ok(Json(user))
}
