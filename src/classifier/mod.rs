//! Classifier: feature vector + decision artifact → OK / NOT_OK
//!
//! The classifier never guesses. A vector whose feature names differ from the
//! artifact's (missing, extra or renamed) fails with `FeatureMismatch`; values
//! are looked up by name, so ordering differences are harmless.

pub mod artifact;
pub mod registry;

pub use artifact::{
    ArtifactError, DecisionArtifact, DecisionModel, FeatureLimit, LoadedArtifact, PlattScaling,
};
pub use registry::{ArtifactRegistry, ArtifactSummary};

use std::collections::BTreeSet;
use tracing::info;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{ClassificationResult, FeatureVector};

/// Classify `features` for `machine_id` with an already-selected artifact.
pub fn classify(
    features: &FeatureVector,
    loaded: &LoadedArtifact,
    machine_id: &str,
) -> AnalysisResult<ClassificationResult> {
    let artifact = &loaded.artifact;
    if features.machine_class != artifact.machine_class {
        return Err(AnalysisError::ModelUnavailable {
            machine_class: features.machine_class.clone(),
        });
    }

    let expected: BTreeSet<&str> = artifact.feature_names.iter().map(String::as_str).collect();
    let actual: BTreeSet<&str> = features.features.iter().map(|f| f.name.as_str()).collect();
    if expected != actual || actual.len() != features.len() {
        return Err(AnalysisError::FeatureMismatch {
            expected: artifact.feature_names.clone(),
            actual: features.names(),
        });
    }

    let mut values = Vec::with_capacity(artifact.feature_names.len());
    for name in &artifact.feature_names {
        let value = features.get(name).ok_or_else(|| AnalysisError::FeatureMismatch {
            expected: artifact.feature_names.clone(),
            actual: features.names(),
        })?;
        if !value.is_finite() {
            return Err(AnalysisError::malformed(format!("feature '{name}' is not finite")));
        }
        values.push(value);
    }

    let (verdict, confidence) = artifact.evaluate(&values);

    info!(
        machine_id,
        machine_class = %artifact.machine_class,
        verdict = %verdict,
        confidence = ?confidence,
        artifact_version = %artifact.version,
        "Classified recording"
    );

    Ok(ClassificationResult {
        machine_id: machine_id.to_string(),
        machine_class: artifact.machine_class.clone(),
        verdict,
        confidence,
        artifact_version: artifact.version.clone(),
        artifact_fingerprint: loaded.fingerprint.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verdict;
    use std::path::Path;

    fn loaded() -> LoadedArtifact {
        let json = br#"{"machine_class":"pump","version":"7","created_at":"2024-01-01T00:00:00Z",
            "feature_names":["peak_1x","peak_5x"],
            "model":{"type":"threshold","limits":{"peak_5x":{"max":0.2}}}}"#;
        LoadedArtifact::from_bytes(json, Path::new("pump.json")).unwrap()
    }

    fn vector(pairs: &[(&str, f64)]) -> FeatureVector {
        let mut fv = FeatureVector::new("pump");
        for (n, v) in pairs {
            fv.push(*n, *v);
        }
        fv
    }

    #[test]
    fn test_lookup_by_name_ignores_order() {
        let result = classify(&vector(&[("peak_5x", 0.5), ("peak_1x", 1.0)]), &loaded(), "P-1").unwrap();
        assert_eq!(result.verdict, Verdict::NotOk);
        assert_eq!(result.artifact_version, "7");
        assert_eq!(result.machine_id, "P-1");
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_missing_feature_is_mismatch() {
        let err = classify(&vector(&[("peak_1x", 1.0)]), &loaded(), "P-1").unwrap_err();
        assert!(matches!(err, AnalysisError::FeatureMismatch { .. }));
    }

    #[test]
    fn test_extra_feature_is_mismatch() {
        let fv = vector(&[("peak_1x", 1.0), ("peak_5x", 0.1), ("rms", 0.3)]);
        assert!(matches!(
            classify(&fv, &loaded(), "P-1"),
            Err(AnalysisError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn test_deterministic() {
        let fv = vector(&[("peak_1x", 1.0), ("peak_5x", 0.1)]);
        let a = classify(&fv, &loaded(), "P-1").unwrap();
        let b = classify(&fv, &loaded(), "P-1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.verdict, Verdict::Ok);
    }
}
