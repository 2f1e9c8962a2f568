//! Similarity graph handlers
//!
//! Starts recompute passes and reports the outcome of the last one.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::recompute::RecomputeStatus;

/// Recompute options
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecomputeQuery {
    /// Wait for the pass to finish instead of returning 202 immediately
    #[param(default = false)]
    pub wait: Option<bool>,
}

/// Start a similarity recompute pass
///
/// Links every pair of books with exactly the same genre. The pass runs in
/// one transaction: it commits all missing edges or none. Existing edges are
/// kept, so rerunning on an unchanged catalog writes nothing.
#[utoipa::path(
    post,
    path = "/api/v1/similarities/recompute",
    tag = "Similarities",
    params(RecomputeQuery),
    responses(
        (status = 202, description = "Pass started", body = RecomputeStatus),
        (status = 200, description = "Pass finished (wait=true)", body = RecomputeStatus),
        (status = 409, description = "A pass is already running"),
        (status = 500, description = "Pass failed and was rolled back (wait=true)"),
        (status = 503, description = "Pass timed out (wait=true)")
    )
)]
pub async fn start_recompute(
    State(state): State<AppState>,
    Query(query): Query<RecomputeQuery>,
) -> Result<(StatusCode, Json<RecomputeStatus>), ApiError> {
    let handle = state
        .recompute
        .spawn(state.graph.clone(), state.recompute_timeout)
        .await?;

    if !query.wait.unwrap_or(false) {
        tracing::info!("Similarity recompute scheduled");
        return Ok((StatusCode::ACCEPTED, Json(state.recompute.current().await)));
    }

    // The pass keeps running on its task if this request is dropped
    handle
        .await
        .map_err(|e| ApiError::internal(format!("Recompute task failed: {e}")))??;

    Ok((StatusCode::OK, Json(state.recompute.current().await)))
}

/// Status of the last recompute pass
#[utoipa::path(
    get,
    path = "/api/v1/similarities/recompute",
    tag = "Similarities",
    responses(
        (status = 200, description = "Current status", body = RecomputeStatus)
    )
)]
pub async fn recompute_status(State(state): State<AppState>) -> Json<RecomputeStatus> {
    Json(state.recompute.current().await)
}
