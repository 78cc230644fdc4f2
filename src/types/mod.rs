//! Shared data structures for the order-analysis pipeline
//!
//! Stage outputs, leaf-first:
//! - `RawTable` / `RawRecording`: acquisition rows as uploaded
//! - `SynchronizedDataset`: angle- or time-uniform resampled signal + speed curve
//! - `OrderSpectrogram`: order × step energy matrix
//! - `FeatureVector` / `ClassificationResult`: classifier input and verdict
//!
//! Every entity is plain owned data (serializable, no handles) and is never
//! shared mutably between stages.

mod analysis;
mod signal;
mod spectrogram;

pub use analysis::*;
pub use signal::*;
pub use spectrogram::*;
