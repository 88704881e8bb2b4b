//! Graph layout endpoints.

use axum::{extract::State, routing::get, Json, Router};
use fleetdeck_depgraph::{apply_saved_positions, Grid};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::graph::dependency_graph;
use crate::layout::Positions;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/graph/positions",
            get(get_positions).post(save_positions).delete(reset_positions),
        )
        .route("/graph/layout", get(get_layout))
}

#[derive(Debug, Serialize)]
struct SaveResponse {
    success: bool,
    message: String,
}

async fn get_positions(State(state): State<AppState>) -> Json<Positions> {
    Json(state.layout().get().await)
}

async fn save_positions(
    State(state): State<AppState>,
    Json(positions): Json<Positions>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.layout().save(positions).await?;
    Ok(Json(SaveResponse {
        success: true,
        message: "Positions saved".to_string(),
    }))
}

async fn reset_positions(State(state): State<AppState>) -> Result<Json<SaveResponse>, ApiError> {
    state.layout().reset().await?;
    Ok(Json(SaveResponse {
        success: true,
        message: "Positions reset".to_string(),
    }))
}

/// Computed layered layout with saved positions on top.
async fn get_layout(State(state): State<AppState>) -> Result<Json<Positions>, ApiError> {
    let fleet = state.reconciler().current_fleet().await?;
    let graph = dependency_graph(state.engine(), &fleet, state.rules()).await;
    let saved = state.layout().get().await;
    Ok(Json(apply_saved_positions(
        graph.positions(Grid::default()),
        &saved,
    )))
}
