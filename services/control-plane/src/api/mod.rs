//! HTTP API handlers and routing.

mod containers;
pub mod error;
mod graph;
mod health;
mod live;
mod scripts;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    let api = Router::new()
        .merge(containers::routes())
        .merge(graph::routes())
        .merge(scripts::routes())
        .merge(live::routes());

    Router::new()
        .merge(health::routes())
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
