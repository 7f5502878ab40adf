//! Live graph and on-demand sweep endpoints.

use crate::{
    errors::AppError, models::graph::LiveGraph, services::sweep_service::SweepReport,
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};

/// GET `/state`
pub async fn get_state(State(state): State<AppState>) -> Result<Json<LiveGraph>, AppError> {
    Ok(Json(state.graph.snapshot().await?))
}

/// PUT `/state`: replace the live graph.
pub async fn put_state(
    State(state): State<AppState>,
    Json(graph): Json<LiveGraph>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(sessions = graph.sessions.len(), "replacing live graph");
    state.graph.replace(graph).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/sweep`: run one sweep now. 409 if one is already running.
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, AppError> {
    Ok(Json(state.sweeper.run_sweep().await?))
}
