//! Analysis pipeline
//!
//! ```text
//! ingest:  RawTable ─► column mapping ─► SignalSynchronizer ─► SynchronizedDataset
//! analyze: SynchronizedDataset ─► OrderSpectrogramEngine ─► FeatureExtractor
//!                              ─► Classifier ─► AnalysisReport
//! ```
//!
//! Each request runs as one synchronous call chain. Parallelism only exists
//! across requests (see [`batch`]).

mod analyzer;
pub mod batch;
pub mod render;

pub use analyzer::{AnalysisReport, Analyzer};
pub use batch::{analyze_batch, BatchJob, BatchOutcome, BatchResult};
pub use render::RenderData;
