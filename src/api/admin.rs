//! Admin API endpoints
//!
//! Operational endpoints gated behind the admin role. The whole router is
//! wrapped in `require_admin`, which answers 403 for anyone else.

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};

/// Response for a session purge
#[derive(Debug, Serialize)]
pub struct PurgeSessionsResponse {
    pub deleted: i64,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new().route("/sessions/purge", post(purge_sessions))
}

/// POST /api/v1/admin/sessions/purge - Remove expired session rows
///
/// Expired sessions are otherwise cleaned up lazily, one at a time, when
/// their cookie is next presented. This removes the leftovers in bulk.
async fn purge_sessions(
    State(state): State<AppState>,
) -> Result<Json<PurgeSessionsResponse>, ApiError> {
    let deleted = state.auth_service.purge_expired_sessions().await?;
    tracing::info!(deleted, "purged expired sessions");
    Ok(Json(PurgeSessionsResponse { deleted }))
}
