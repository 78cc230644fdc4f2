//! Analyzer: the ingest and analyze entry points over one shared config and
//! artifact registry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::acquisition::{map_columns, validate_machine_id};
use crate::classifier::{self, ArtifactError, ArtifactRegistry};
use crate::config::{AnalyzerConfig, ProfileResolver};
use crate::error::AnalysisResult;
use crate::processing::{FeatureExtractor, OrderSpectrogramEngine, SignalSynchronizer};
use crate::types::{ClassificationResult, FeatureVector, OrderSpectrogram, RawTable, SynchronizedDataset};

/// Everything `analyze` produces for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub machine_id: String,
    pub machine_class: String,
    pub spectrogram: OrderSpectrogram,
    pub features: FeatureVector,
    pub classification: ClassificationResult,
}

/// Stateless pipeline front door. Cheap to clone; clones share the config and
/// the registry.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    profiles: Arc<ProfileResolver>,
    registry: Arc<ArtifactRegistry>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, registry: ArtifactRegistry) -> Self {
        Self {
            profiles: Arc::new(ProfileResolver::new(&config.machines)),
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    /// Build an analyzer, loading artifacts from `classifier.artifact_dir`.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, ArtifactError> {
        let registry = ArtifactRegistry::load_dir(&config.classifier.artifact_dir)?;
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Raw table → synchronized dataset. The machine identifier only selects
    /// column conventions.
    pub fn ingest(&self, table: &RawTable, machine_id: &str) -> AnalysisResult<SynchronizedDataset> {
        validate_machine_id(machine_id)?;
        let profile = self.profiles.resolve(machine_id);
        debug!(machine_id, machine_class = %profile.class, rows = table.row_count(), "Ingesting recording");

        let recording = map_columns(table, machine_id, profile)?;
        SignalSynchronizer::new(self.config.synchronization.clone()).synchronize(&recording)
    }

    /// Synchronized dataset → spectrogram, features and verdict. The first
    /// failing stage is returned as-is.
    pub fn analyze(
        &self,
        dataset: &SynchronizedDataset,
        machine_id: &str,
    ) -> AnalysisResult<AnalysisReport> {
        validate_machine_id(machine_id)?;
        let start = Instant::now();
        let profile = self.profiles.resolve(machine_id);
        let artifact = self.registry.get(&profile.class)?;

        let spectrogram = OrderSpectrogramEngine::new(self.config.spectrogram.clone()).compute(dataset)?;
        let features =
            FeatureExtractor::new(&profile.features, &profile.class).extract(&spectrogram, Some(dataset))?;
        let classification = classifier::classify(&features, &artifact, machine_id)?;

        info!(
            machine_id,
            machine_class = %profile.class,
            verdict = %classification.verdict,
            steps = spectrogram.n_steps(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(AnalysisReport {
            machine_id: machine_id.to_string(),
            machine_class: profile.class.clone(),
            spectrogram,
            features,
            classification,
        })
    }

    /// `ingest` followed by `analyze`, returning the dataset alongside the
    /// report for rendering.
    pub fn run(
        &self,
        table: &RawTable,
        machine_id: &str,
    ) -> AnalysisResult<(SynchronizedDataset, AnalysisReport)> {
        let dataset = self.ingest(table, machine_id)?;
        let report = self.analyze(&dataset, machine_id)?;
        Ok((dataset, report))
    }
}
