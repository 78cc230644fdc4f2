//! orderscope: order-tracking vibration analysis
//!
//! Health assessment for rotating machinery from acceleration recordings.
//!
//! ## Architecture
//!
//! - **Acquisition**: CSV tables and machine-profile column mapping
//! - **Processing**: speed synchronization, order spectrogram, order-band features
//! - **Classifier**: versioned decision artifacts per machine class
//! - **Pipeline**: `ingest` / `analyze` entry points, batch runs, render data
//! - **API**: HTTP surface over the same pipeline

pub mod acquisition;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod processing;
pub mod synthetic;
pub mod types;

// Re-export configuration
pub use config::{AnalyzerConfig, MachineProfile};

// Re-export errors
pub use error::{AnalysisError, AnalysisResult};

// Re-export commonly used types
pub use types::{
    ClassificationResult, FeatureVector, OrderSpectrogram, RawRecording, RawTable,
    SynchronizedDataset, Verdict,
};

// Re-export pipeline entry points
pub use pipeline::{AnalysisReport, Analyzer, RenderData};
