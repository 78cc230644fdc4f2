//! Error taxonomy for the analysis pipeline.
//!
//! Every stage fails fast with a specific kind. The pipeline surfaces the
//! first failure untouched and never substitutes defaults for bad data.

use thiserror::Error;

/// Failure raised by ingest, spectrogram, feature or classification stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Missing or invalid channels, rows, or identifiers.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A timing gap in the raw recording that cannot be bridged.
    #[error("Signal gap of {duration:.6}s at t={at:.6}s exceeds threshold {threshold:.6}s")]
    SignalGap {
        at: f64,
        duration: f64,
        threshold: f64,
    },

    /// Too little synchronized data for a single analysis window.
    #[error("Insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A feature rule references an order band the spectrogram cannot serve.
    #[error("Feature spec mismatch: {0}")]
    SpecMismatch(String),

    /// No decision artifact is registered for the machine class.
    #[error("No decision artifact registered for machine class '{machine_class}'")]
    ModelUnavailable { machine_class: String },

    /// Feature vector keys differ from what the artifact expects.
    #[error("Feature mismatch: artifact expects {expected:?}, got {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Analysis parameters that cannot be honoured for this dataset.
    #[error("Invalid analysis parameters: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Stable machine-readable code, used by the HTTP envelope and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "MALFORMED_INPUT",
            Self::SignalGap { .. } => "SIGNAL_GAP",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::SpecMismatch(_) => "SPEC_MISMATCH",
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::FeatureMismatch { .. } => "FEATURE_MISMATCH",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
