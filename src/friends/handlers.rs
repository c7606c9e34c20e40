use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthSession,
    error::AppError,
    friends::dto::{FriendProfile, InviteFriendRequest, PendingInvite},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/friends", get(friend_list))
        .route("/friends/invites", post(invite_friend).get(invite_list))
        .route(
            "/friends/invites/:id",
            post(invite_accept).delete(invite_reject),
        )
}

#[instrument(skip(state, auth))]
async fn friend_list(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Vec<FriendProfile>>, AppError> {
    let friends = state.friends.list_of_friends(auth.user_id).await?;
    Ok(Json(friends))
}

#[instrument(skip(state, auth, payload))]
async fn invite_friend(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(payload): Json<InviteFriendRequest>,
) -> Result<StatusCode, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }
    state
        .friends
        .invite_friend(auth.user_id, &payload.username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, auth))]
async fn invite_list(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Vec<PendingInvite>>, AppError> {
    let invites = state.friends.pending_invites(auth.user_id).await?;
    Ok(Json(invites))
}

#[instrument(skip(state, auth))]
async fn invite_accept(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.friends.accept_friendship(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, auth))]
async fn invite_reject(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.friends.reject_friendship(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
