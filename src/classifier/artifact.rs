//! Decision artifact format and model evaluation
//!
//! An artifact is a JSON file produced by an offline training process. It
//! names the machine class it applies to, the exact feature names it expects,
//! and one of three model families:
//!
//! - `threshold`: per-feature `[min, max]` envelopes
//! - `logistic`: standardized linear score, optionally Platt-calibrated
//! - `gaussian`: per-feature normal model with a z-score limit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Verdict;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("reading artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("machine class '{class}' is defined by both {first} and {second}")]
    DuplicateClass {
        class: String,
        first: PathBuf,
        second: PathBuf,
    },
}

// ============================================================================
// Artifact Format
// ============================================================================

/// Accepted range of one feature. Open ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FeatureLimit {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// Platt calibration `p = sigmoid(a·score + b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

fn default_decision_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionModel {
    Threshold {
        limits: BTreeMap<String, FeatureLimit>,
    },
    /// Score is the log-odds of NOT_OK.
    Logistic {
        means: Vec<f64>,
        scales: Vec<f64>,
        weights: Vec<f64>,
        bias: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platt: Option<PlattScaling>,
        #[serde(default = "default_decision_threshold")]
        decision_threshold: f64,
    },
    Gaussian {
        means: Vec<f64>,
        stds: Vec<f64>,
        z_limit: f64,
    },
}

impl DecisionModel {
    pub fn family(&self) -> &'static str {
        match self {
            Self::Threshold { .. } => "threshold",
            Self::Logistic { .. } => "logistic",
            Self::Gaussian { .. } => "gaussian",
        }
    }
}

/// Serialized decision logic for one machine class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionArtifact {
    pub machine_class: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Feature names in the order the model's vectors use
    pub feature_names: Vec<String>,
    pub model: DecisionModel,
}

impl DecisionArtifact {
    /// Structural checks: names unique, vector lengths consistent, scales
    /// positive.
    pub fn validate(&self) -> Result<(), String> {
        if self.machine_class.trim().is_empty() {
            return Err("machine_class is empty".to_string());
        }
        if self.feature_names.is_empty() {
            return Err("feature_names is empty".to_string());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(format!("duplicate feature name '{dup}'"));
        }

        let n = self.feature_names.len();
        let check_len = |label: &str, v: &[f64]| -> Result<(), String> {
            if v.len() == n {
                Ok(())
            } else {
                Err(format!("{label} has {} entries, expected {n}", v.len()))
            }
        };

        match &self.model {
            DecisionModel::Threshold { limits } => {
                if let Some(unknown) = limits.keys().find(|k| !seen.contains(k.as_str())) {
                    return Err(format!("limit for unknown feature '{unknown}'"));
                }
                if limits.values().any(|l| matches!((l.min, l.max), (Some(lo), Some(hi)) if lo > hi)) {
                    return Err("limit with min > max".to_string());
                }
            }
            DecisionModel::Logistic {
                means,
                scales,
                weights,
                decision_threshold,
                ..
            } => {
                check_len("means", means)?;
                check_len("scales", scales)?;
                check_len("weights", weights)?;
                if scales.iter().any(|s| !(*s > 0.0)) {
                    return Err("scales must be positive".to_string());
                }
                if !(*decision_threshold > 0.0 && *decision_threshold < 1.0) {
                    return Err("decision_threshold must be in (0, 1)".to_string());
                }
            }
            DecisionModel::Gaussian { means, stds, z_limit } => {
                check_len("means", means)?;
                check_len("stds", stds)?;
                if stds.iter().any(|s| !(*s > 0.0)) {
                    return Err("stds must be positive".to_string());
                }
                if !(*z_limit > 0.0) {
                    return Err("z_limit must be positive".to_string());
                }
            }
        }
        Ok(())
    }

    /// Verdict and optional confidence for `values`, ordered as
    /// `feature_names`. Deterministic for identical inputs.
    pub fn evaluate(&self, values: &[f64]) -> (Verdict, Option<f64>) {
        match &self.model {
            DecisionModel::Threshold { limits } => {
                let violated = self
                    .feature_names
                    .iter()
                    .zip(values)
                    .any(|(name, &v)| limits.get(name).is_some_and(|l| !l.contains(v)));
                (if violated { Verdict::NotOk } else { Verdict::Ok }, None)
            }
            DecisionModel::Logistic {
                means,
                scales,
                weights,
                bias,
                platt,
                decision_threshold,
            } => {
                let score: f64 = values
                    .iter()
                    .zip(means)
                    .zip(scales)
                    .zip(weights)
                    .map(|(((x, m), s), w)| w * (x - m) / s)
                    .sum::<f64>()
                    + bias;
                let calibrated = platt.map_or(score, |p| p.a * score + p.b);
                let p_not_ok = sigmoid(calibrated);
                if p_not_ok >= *decision_threshold {
                    (Verdict::NotOk, Some(p_not_ok))
                } else {
                    (Verdict::Ok, Some(1.0 - p_not_ok))
                }
            }
            DecisionModel::Gaussian { means, stds, z_limit } => {
                let max_z = values
                    .iter()
                    .zip(means)
                    .zip(stds)
                    .map(|((x, m), s)| ((x - m) / s).abs())
                    .fold(0.0_f64, f64::max);
                // Two-sided tail probability of the most extreme feature
                let p_healthy = Normal::new(0.0, 1.0)
                    .ok()
                    .map(|n| 2.0 * (1.0 - n.cdf(max_z)));
                if max_z > *z_limit {
                    (Verdict::NotOk, p_healthy.map(|p| 1.0 - p))
                } else {
                    (Verdict::Ok, p_healthy)
                }
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

// ============================================================================
// Loading
// ============================================================================

/// A parsed artifact plus where it came from and its content fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: DecisionArtifact,
    /// `md5:<hex>` of the raw file bytes
    pub fingerprint: String,
    pub path: PathBuf,
}

pub fn fingerprint(bytes: &[u8]) -> String {
    format!("md5:{:x}", md5::compute(bytes))
}

impl LoadedArtifact {
    /// Parse and validate artifact JSON.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, ArtifactError> {
        let artifact: DecisionArtifact =
            serde_json::from_slice(bytes).map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.validate().map_err(|message| ArtifactError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(Self {
            artifact,
            fingerprint: fingerprint(bytes),
            path: path.to_path_buf(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }
}
