//! System-wide default constants.
//!
//! Centralises the numbers the config structs fall back to when a key is
//! absent. Grouped by pipeline stage.

// ============================================================================
// Synchronization
// ============================================================================

/// Angle-grid density. 64 points per revolution resolves orders up to 32.
pub const SAMPLES_PER_REVOLUTION: usize = 64;

/// Width of the centered moving average applied to the speed curve (seconds).
pub const SPEED_SMOOTHING_SECONDS: f64 = 0.02;

/// A raw interval longer than this multiple of the median interval is a gap.
pub const GAP_FACTOR: f64 = 5.0;

/// Minimum shaft revolutions a recording must cover.
pub const MIN_REVOLUTIONS: f64 = 1.0;

/// Minimum raw rows before any processing is attempted.
pub const MIN_SAMPLES: usize = 16;

/// Consecutive tach-interval ratio above which the pulse train is ambiguous.
pub const MAX_PULSE_INTERVAL_RATIO: f64 = 1.6;

/// Running-median length over per-interval pulse speeds.
pub const PULSE_MEDIAN_INTERVALS: usize = 5;

// ============================================================================
// Spectrogram
// ============================================================================

/// Analysis window length in shaft revolutions.
pub const WINDOW_REVOLUTIONS: f64 = 8.0;

/// Fractional overlap between consecutive windows.
pub const OVERLAP: f64 = 0.5;

/// Highest order kept in the output grid.
pub const MAX_ORDER: f64 = 20.0;

/// Order-grid bins per order (step = 1 / bins_per_order).
pub const BINS_PER_ORDER: usize = 4;

/// Energy floor substituted before taking logarithms.
pub const ENERGY_FLOOR: f64 = 1e-12;

// ============================================================================
// Classifier / render / server
// ============================================================================

/// Directory scanned for `*.json` decision artifacts at startup.
pub const ARTIFACT_DIR: &str = "artifacts";

/// Time-series points exposed to the rendering layer per channel.
pub const MAX_SERIES_POINTS: usize = 5_000;

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Largest accepted CSV upload (bytes).
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "ORDERSCOPE_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "orderscope.toml";
