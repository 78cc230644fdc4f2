//! Analyzer Configuration Module
//!
//! Provides analyzer configuration loaded from TOML files: synchronization,
//! spectrogram and classifier parameters plus per-machine-class profiles.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag (explicit path, errors are fatal)
//! 2. `ORDERSCOPE_CONFIG` environment variable (path to TOML file)
//! 3. `orderscope.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded config is wrapped in an `Arc` by the caller and shared
//! read-only with every analysis request.

mod analyzer_config;
pub mod defaults;
pub mod validation;

pub use analyzer_config::*;
