use axum::{extract::State, http::header, response::IntoResponse};
use tracing::instrument;

use crate::{error::AppError, state::AppState};

/// Serve the API description document.
///
/// The document is read once at startup into `AppState` and treated as
/// immutable afterwards; there is no runtime cache to populate or invalidate.
#[instrument(skip(state))]
pub async fn openapi(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let doc = state
        .openapi
        .as_ref()
        .ok_or(AppError::NotFound("openapi document"))?;
    Ok((
        [(header::CONTENT_TYPE, "application/yaml")],
        doc.as_ref().clone(),
    ))
}
