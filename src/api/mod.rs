//! REST API module using Axum
//!
//! Exposes the ingest, analyze and render-data interfaces over HTTP. Every
//! response uses the `{data, meta}` / `{error, meta}` envelope.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `ORDERSCOPE_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for a separately served charting front end.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var("ORDERSCOPE_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router. Request bodies above `max_upload_bytes`
/// are rejected with 413.
pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer())
}
