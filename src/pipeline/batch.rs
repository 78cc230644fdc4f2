//! Batch analysis of independent recordings on the rayon pool.
//!
//! Each job owns its table and produces its own dataset and report; only the
//! analyzer (config + registry) is shared, read-only.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::{AnalysisReport, Analyzer};
use crate::error::AnalysisError;
use crate::types::RawTable;

#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Caller's label for the job, usually the source file name
    pub label: String,
    pub machine_id: String,
    pub table: RawTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub label: String,
    pub machine_id: String,
    #[serde(flatten)]
    pub result: BatchResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResult {
    Completed { report: Box<AnalysisReport> },
    Failed { code: &'static str, message: String },
}

impl From<Result<AnalysisReport, AnalysisError>> for BatchResult {
    fn from(result: Result<AnalysisReport, AnalysisError>) -> Self {
        match result {
            Ok(report) => Self::Completed {
                report: Box::new(report),
            },
            Err(e) => Self::Failed {
                code: e.code(),
                message: e.to_string(),
            },
        }
    }
}

/// Analyze every job in parallel. Output order matches input order; one
/// failing job never affects the others.
pub fn analyze_batch(analyzer: &Analyzer, jobs: Vec<BatchJob>) -> Vec<BatchOutcome> {
    let total = jobs.len();
    let outcomes: Vec<BatchOutcome> = jobs
        .into_par_iter()
        .map(|job| {
            let result = analyzer
                .run(&job.table, &job.machine_id)
                .map(|(_, report)| report);
            if let Err(e) = &result {
                warn!(label = %job.label, machine_id = %job.machine_id, code = e.code(), "Batch job failed: {e}");
            }
            BatchOutcome {
                label: job.label,
                machine_id: job.machine_id,
                result: result.into(),
            }
        })
        .collect();

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.result, BatchResult::Failed { .. }))
        .count();
    info!(total, failed, "Batch analysis finished");
    outcomes
}
