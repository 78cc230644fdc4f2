//! Signal processing: synchronization, order spectrograms and features
//!
//! Stages run in order and each one only reads the previous stage's output:
//!
//! ```text
//! RawRecording ─► SignalSynchronizer ─► SynchronizedDataset
//!              ─► OrderSpectrogramEngine ─► OrderSpectrogram
//!              ─► FeatureExtractor ─► FeatureVector
//! ```

pub mod features;
pub mod fft;
pub mod order_spectrogram;
pub mod synchronizer;

pub use features::{FeatureExtractor, FeatureRule, FeatureSpec, OrderBand};
pub use fft::FftProcessor;
pub use order_spectrogram::OrderSpectrogramEngine;
pub use synchronizer::SignalSynchronizer;
