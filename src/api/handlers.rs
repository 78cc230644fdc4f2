//! API request handlers
//!
//! CSV bodies are parsed and analyzed on the blocking pool so the async
//! runtime never runs FFTs.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::acquisition::read_table;
use crate::classifier::ArtifactSummary;
use crate::error::AnalysisResult;
use crate::pipeline::{AnalysisReport, Analyzer, RenderData};

/// Shared state for all handlers. Cloning shares the analyzer.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }
}

#[derive(Debug, Deserialize)]
pub struct MachineQuery {
    pub machine_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub artifacts_loaded: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub report: AnalysisReport,
    pub render: RenderData,
}

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        artifacts_loaded: state.analyzer.registry().len(),
    })
}

/// GET /api/v1/artifacts
pub async fn list_artifacts(State(state): State<AppState>) -> Response {
    let summaries: Vec<ArtifactSummary> = state.analyzer.registry().summaries();
    ApiResponse::ok(summaries)
}

/// POST /api/v1/ingest?machine_id=..
pub async fn ingest(
    State(state): State<AppState>,
    Query(query): Query<MachineQuery>,
    body: Bytes,
) -> Response {
    let Some(machine_id) = query.machine_id else {
        return ApiErrorResponse::bad_request("machine_id query parameter is required");
    };

    let analyzer = state.analyzer.clone();
    let id = machine_id.clone();
    let result = tokio::task::spawn_blocking(move || -> AnalysisResult<_> {
        let table = read_table(body.as_ref())?;
        analyzer.ingest(&table, &id)
    })
    .await;

    match result {
        Ok(Ok(dataset)) => ApiResponse::ok(dataset),
        Ok(Err(e)) => {
            warn!(machine_id = %machine_id, code = e.code(), "Ingest rejected: {e}");
            ApiErrorResponse::analysis(&e)
        }
        Err(e) => {
            error!("Ingest task failed: {e}");
            ApiErrorResponse::internal("ingest task failed")
        }
    }
}

/// POST /api/v1/analyze?machine_id=..
pub async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<MachineQuery>,
    body: Bytes,
) -> Response {
    let Some(machine_id) = query.machine_id else {
        return ApiErrorResponse::bad_request("machine_id query parameter is required");
    };

    let analyzer = state.analyzer.clone();
    let id = machine_id.clone();
    let result = tokio::task::spawn_blocking(move || -> AnalysisResult<_> {
        let table = read_table(body.as_ref())?;
        let (dataset, report) = analyzer.run(&table, &id)?;
        let render = RenderData::build(
            &dataset,
            &report.spectrogram,
            analyzer.config().render.max_series_points,
        );
        Ok(AnalyzeResponse { report, render })
    })
    .await;

    match result {
        Ok(Ok(response)) => ApiResponse::ok(response),
        Ok(Err(e)) => {
            warn!(machine_id = %machine_id, code = e.code(), "Analysis failed: {e}");
            ApiErrorResponse::analysis(&e)
        }
        Err(e) => {
            error!("Analysis task failed: {e}");
            ApiErrorResponse::internal("analysis task failed")
        }
    }
}
