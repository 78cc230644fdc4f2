//! API route table
//!
//! - GET  /api/v1/health     - liveness and artifact count
//! - GET  /api/v1/artifacts  - registered decision artifacts
//! - POST /api/v1/ingest     - CSV body → synchronized dataset
//! - POST /api/v1/analyze    - CSV body → report + render data

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/artifacts", get(handlers::list_artifacts))
        .route("/ingest", post(handlers::ingest))
        .route("/analyze", post(handlers::analyze))
        .with_state(state)
}
