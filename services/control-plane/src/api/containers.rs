//! Container endpoints.
//!
//! - GET /containers (fleet view with rebuild flags)
//! - GET /containers/dependencies
//! - GET/DELETE /containers/{id}, POST /containers/{id}/{start,stop,restart}
//! - GET /containers/{id}/logs, /containers/{id}/export-logs, /containers/{id}/stats
//! - GET /info
//! - DELETE /cache/containers

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use fleetdeck_depgraph::NodeReport;
use fleetdeck_logframe::demux_lines;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::api::error::ApiError;
use crate::engine::LogsQuery;
use crate::fleet::{ContainerRecord, ContainerState};
use crate::graph::dependency_graph;
use crate::state::AppState;

/// Lines returned by the plain logs endpoint.
const LOGS_TAIL: usize = 100;

/// Default lines in a log export.
const EXPORT_TAIL: usize = 5000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/dependencies", get(list_dependencies))
        .route(
            "/containers/{id}",
            get(inspect_container).delete(remove_container),
        )
        .route("/containers/{id}/start", post(start_container))
        .route("/containers/{id}/stop", post(stop_container))
        .route("/containers/{id}/restart", post(restart_container))
        .route("/containers/{id}/logs", get(container_logs))
        .route("/containers/{id}/export-logs", get(export_logs))
        .route("/containers/{id}/stats", get(container_stats))
        .route("/info", get(engine_info))
        .route("/cache/containers", delete(clear_cache))
}

/// A fleet entry as served to clients.
#[derive(Debug, Serialize)]
struct ContainerView {
    #[serde(flatten)]
    record: ContainerRecord,
    #[serde(rename = "Rebuilding")]
    rebuilding: bool,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

async fn list_containers(State(state): State<AppState>) -> Result<Json<Vec<ContainerView>>, ApiError> {
    let fleet = state.reconciler().current_fleet().await?;
    let running = state.rebuilds().registry().running_ids().await;

    let view = fleet
        .into_iter()
        .map(|record| {
            let rebuilding =
                record.state != ContainerState::Unavailable && running.contains(&record.id);
            ContainerView { record, rebuilding }
        })
        .collect();
    Ok(Json(view))
}

async fn list_dependencies(State(state): State<AppState>) -> Result<Json<Vec<NodeReport>>, ApiError> {
    let fleet = state.reconciler().current_fleet().await?;
    let graph = dependency_graph(state.engine(), &fleet, state.rules()).await;
    Ok(Json(graph.nodes))
}

async fn inspect_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let details = state.engine().inspect_container(&id).await?;
    Ok(Json(details.into_raw()))
}

async fn start_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.engine().start_container(&id).await?;
    info!(container_id = %id, "Container started");
    Ok(message("Container started successfully"))
}

async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.engine().stop_container(&id).await?;
    info!(container_id = %id, "Container stopped");
    Ok(message("Container stopped successfully"))
}

async fn restart_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.engine().restart_container(&id).await?;
    info!(container_id = %id, "Container restarted");
    Ok(message("Container restarted successfully"))
}

async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.engine().remove_container(&id).await?;
    info!(container_id = %id, "Container removed");
    Ok(message("Container removed successfully"))
}

async fn container_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .engine()
        .container_logs(
            &id,
            LogsQuery {
                tail: LOGS_TAIL,
                timestamps: false,
            },
        )
        .await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        demux_lines(&body).join("\n"),
    ))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    tail: Option<usize>,
}

async fn export_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tail = query.tail.filter(|t| *t > 0).unwrap_or(EXPORT_TAIL);
    let body = state
        .engine()
        .container_logs(
            &id,
            LogsQuery {
                tail,
                timestamps: true,
            },
        )
        .await?;
    let text = demux_lines(&body).join("\n");

    let details = state.engine().inspect_container(&id).await?;
    let name = details.name().unwrap_or(&id);
    let filename = export_filename(name, Utc::now());

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        text,
    ))
}

fn export_filename(name: &str, at: chrono::DateTime<Utc>) -> String {
    format!("{name}_logs_{}.txt", at.format("%Y-%m-%dT%H-%M-%S"))
}

async fn container_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.engine().container_stats(&id).await?))
}

async fn engine_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.engine().info().await?))
}

async fn clear_cache(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    state.cache().clear().await?;
    info!("Fleet cache cleared");
    Ok(message("Container cache cleared"))
}
