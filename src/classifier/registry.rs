//! Artifact registry: every decision artifact, loaded once at startup.
//!
//! The registry is immutable after construction and shared behind an `Arc`,
//! so concurrent analyses read it without locking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::artifact::{ArtifactError, LoadedArtifact};
use crate::error::{AnalysisError, AnalysisResult};

/// Public description of a registered artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub machine_class: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub model_type: &'static str,
    pub feature_names: Vec<String>,
    pub fingerprint: String,
}

#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    by_class: BTreeMap<String, Arc<LoadedArtifact>>,
}

impl ArtifactRegistry {
    /// Registry with no artifacts. Every classification reports
    /// `ModelUnavailable`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir` (sorted by file name). A missing
    /// directory yields an empty registry; a broken artifact is an error.
    pub fn load_dir(dir: &Path) -> Result<Self, ArtifactError> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Artifact directory not found, no decision models loaded");
            return Ok(Self::empty());
        }

        let entries = std::fs::read_dir(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut registry = Self::empty();
        for path in paths {
            registry.insert(LoadedArtifact::load(&path)?)?;
        }

        info!(
            dir = %dir.display(),
            classes = registry.len(),
            "Loaded decision artifacts"
        );
        Ok(registry)
    }

    /// Register one artifact. Two artifacts for one class are rejected.
    pub fn insert(&mut self, loaded: LoadedArtifact) -> Result<(), ArtifactError> {
        let class = loaded.artifact.machine_class.clone();
        if let Some(existing) = self.by_class.get(&class) {
            return Err(ArtifactError::DuplicateClass {
                class,
                first: existing.path.clone(),
                second: loaded.path,
            });
        }
        info!(
            machine_class = %class,
            version = %loaded.artifact.version,
            model = loaded.artifact.model.family(),
            fingerprint = %loaded.fingerprint,
            "Registered decision artifact"
        );
        self.by_class.insert(class, Arc::new(loaded));
        Ok(())
    }

    pub fn get(&self, machine_class: &str) -> AnalysisResult<Arc<LoadedArtifact>> {
        self.by_class
            .get(machine_class)
            .cloned()
            .ok_or_else(|| AnalysisError::ModelUnavailable {
                machine_class: machine_class.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    pub fn summaries(&self) -> Vec<ArtifactSummary> {
        self.by_class
            .values()
            .map(|l| ArtifactSummary {
                machine_class: l.artifact.machine_class.clone(),
                version: l.artifact.version.clone(),
                created_at: l.artifact.created_at,
                model_type: l.artifact.model.family(),
                feature_names: l.artifact.feature_names.clone(),
                fingerprint: l.fingerprint.clone(),
            })
            .collect()
    }
}
