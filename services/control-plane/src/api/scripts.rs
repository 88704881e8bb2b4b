//! Rebuild script endpoints.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::rebuild::RebuildRequest;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scripts", get(list_scripts))
        .route("/scripts/execute", post(execute_script))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    success: bool,
    message: String,
    container_id: String,
    container_name: String,
}

async fn list_scripts(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.scripts().discover().await)
}

/// Acknowledged once the rebuild is running; progress arrives on the live
/// channel.
async fn execute_script(
    State(state): State<AppState>,
    Json(request): Json<RebuildRequest>,
) -> Result<(StatusCode, Json<ExecuteResponse>), ApiError> {
    let job = state.rebuilds().execute(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            success: true,
            message: "Script execution started".to_string(),
            container_id: job.container_id,
            container_name: job.container_name,
        }),
    ))
}
