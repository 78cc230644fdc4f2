//! Feature vector and classification verdict.

use serde::{Deserialize, Serialize};

/// One named scalar feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: f64,
}

/// Fixed-length, ordered mapping from feature name to value.
///
/// Order follows the machine-class feature specification that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub machine_class: String,
    pub features: Vec<Feature>,
}

impl FeatureVector {
    pub fn new(machine_class: impl Into<String>) -> Self {
        Self {
            machine_class: machine_class.into(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.features.push(Feature {
            name: name.into(),
            value,
        });
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.iter().find(|f| f.name == name).map(|f| f.value)
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Binary machine health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ok,
    NotOk,
}

impl Verdict {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NotOk => write!(f, "NOT_OK"),
        }
    }
}

/// Classifier output for one analyzed dataset. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub machine_id: String,
    pub machine_class: String,
    pub verdict: Verdict,
    /// Probability of `verdict`, when the model family is calibrated
    pub confidence: Option<f64>,
    pub artifact_version: String,
    /// Content fingerprint of the decision artifact file
    pub artifact_fingerprint: String,
}
