//! Feature extraction from order spectrograms
//!
//! A [`FeatureSpec`] names order bands and the rules evaluated on them. Rules
//! run in declaration order against the time-averaged energy spectrum, so the
//! produced [`FeatureVector`] always has the same names in the same order for
//! a given machine class.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{FeatureVector, OrderSpectrogram, SynchronizedDataset};

/// Tolerance when comparing band edges with order-bin centers
const EDGE_TOLERANCE: f64 = 1e-9;

/// Closed order interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBand {
    pub low: f64,
    pub high: f64,
}

impl OrderBand {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, order: f64) -> bool {
        order >= self.low - EDGE_TOLERANCE && order <= self.high + EDGE_TOLERANCE
    }
}

/// One scalar feature definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureRule {
    /// Square root of the largest mean energy inside the band (an amplitude)
    BandPeak { name: String, band: String },
    /// Mean energy over the bins inside the band
    BandMeanEnergy { name: String, band: String },
    /// RMS of the mean-removed synchronized channel
    BroadbandRms {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Summed energy of one band over another
    BandRatio {
        name: String,
        numerator: String,
        denominator: String,
    },
}

impl FeatureRule {
    pub fn name(&self) -> &str {
        match self {
            Self::BandPeak { name, .. }
            | Self::BandMeanEnergy { name, .. }
            | Self::BroadbandRms { name, .. }
            | Self::BandRatio { name, .. } => name,
        }
    }

    fn bands(&self) -> Vec<&str> {
        match self {
            Self::BandPeak { band, .. } | Self::BandMeanEnergy { band, .. } => vec![band.as_str()],
            Self::BandRatio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            Self::BroadbandRms { .. } => Vec::new(),
        }
    }
}

/// Per-machine-class feature specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    #[serde(default)]
    pub bands: BTreeMap<String, OrderBand>,
    #[serde(default)]
    pub rules: Vec<FeatureRule>,
}

impl Default for FeatureSpec {
    /// Shaft harmonics 1×, 2× and the 5× fault order plus broadband level.
    fn default() -> Self {
        let bands = [
            ("one_x", OrderBand::new(0.75, 1.25)),
            ("two_x", OrderBand::new(1.75, 2.25)),
            ("five_x", OrderBand::new(4.75, 5.25)),
            ("broadband", OrderBand::new(0.5, 20.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let peak = |name: &str, band: &str| FeatureRule::BandPeak {
            name: name.into(),
            band: band.into(),
        };
        let rules = vec![
            peak("peak_1x", "one_x"),
            peak("peak_2x", "two_x"),
            peak("peak_5x", "five_x"),
            FeatureRule::BandMeanEnergy {
                name: "energy_broadband".into(),
                band: "broadband".into(),
            },
            FeatureRule::BroadbandRms {
                name: "rms".into(),
                channel: None,
            },
            FeatureRule::BandRatio {
                name: "ratio_5x_1x".into(),
                numerator: "five_x".into(),
                denominator: "one_x".into(),
            },
        ];

        Self { bands, rules }
    }
}

impl FeatureSpec {
    /// Static consistency problems, one message each.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.rules.is_empty() {
            errors.push("feature spec has no rules".to_string());
        }
        for (name, band) in &self.bands {
            if !(band.low.is_finite() && band.high.is_finite()) || band.low < 0.0 || band.low > band.high {
                errors.push(format!(
                    "band '{name}' [{}, {}] must satisfy 0 <= low <= high",
                    band.low, band.high
                ));
            }
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.name().trim().is_empty() {
                errors.push("feature rule with empty name".to_string());
            } else if !seen.insert(rule.name()) {
                errors.push(format!("duplicate feature name '{}'", rule.name()));
            }
            for band in rule.bands() {
                if !self.bands.contains_key(band) {
                    errors.push(format!("feature '{}' references unknown band '{band}'", rule.name()));
                }
            }
        }
        errors
    }

    /// Feature names in output order.
    pub fn feature_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_string()).collect()
    }
}

/// Evaluates a [`FeatureSpec`] against spectrograms.
pub struct FeatureExtractor<'a> {
    spec: &'a FeatureSpec,
    machine_class: &'a str,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(spec: &'a FeatureSpec, machine_class: &'a str) -> Self {
        Self { spec, machine_class }
    }

    /// Extract the feature vector. `dataset` is needed by time-domain rules
    /// (`broadband_rms`); without it those rules fail with `SpecMismatch`.
    pub fn extract(
        &self,
        spectrogram: &OrderSpectrogram,
        dataset: Option<&SynchronizedDataset>,
    ) -> AnalysisResult<FeatureVector> {
        if let Some(problem) = self.spec.validate().into_iter().next() {
            return Err(AnalysisError::SpecMismatch(problem));
        }
        if spectrogram.n_steps() == 0 || !spectrogram.is_rectangular() {
            return Err(AnalysisError::SpecMismatch(
                "spectrogram has no complete columns".to_string(),
            ));
        }

        let mean_energy = spectrogram.mean_energy_spectrum();
        let mut out = FeatureVector::new(self.machine_class);

        for rule in &self.spec.rules {
            let value = match rule {
                FeatureRule::BandPeak { band, .. } => self
                    .band_energies(band, spectrogram, &mean_energy)?
                    .into_iter()
                    .fold(0.0_f64, f64::max)
                    .sqrt(),
                FeatureRule::BandMeanEnergy { band, .. } => {
                    let e = self.band_energies(band, spectrogram, &mean_energy)?;
                    e.iter().sum::<f64>() / e.len() as f64
                }
                FeatureRule::BroadbandRms { name, channel } => {
                    let ds = dataset.ok_or_else(|| {
                        AnalysisError::SpecMismatch(format!(
                            "feature '{name}' needs the synchronized signal"
                        ))
                    })?;
                    let signal = ds.channel(channel.as_deref()).ok_or_else(|| {
                        AnalysisError::SpecMismatch(format!(
                            "feature '{name}' references unknown channel '{}'",
                            channel.as_deref().unwrap_or_default()
                        ))
                    })?;
                    rms_about_mean(signal)
                }
                FeatureRule::BandRatio {
                    numerator,
                    denominator,
                    ..
                } => {
                    let num: f64 = self.band_energies(numerator, spectrogram, &mean_energy)?.iter().sum();
                    let den: f64 = self.band_energies(denominator, spectrogram, &mean_energy)?.iter().sum();
                    num / den.max(f64::MIN_POSITIVE)
                }
            };
            out.push(rule.name(), value);
        }

        debug!(
            machine_class = self.machine_class,
            features = out.len(),
            "Extracted features"
        );
        Ok(out)
    }

    /// Mean energies of the order bins inside `band_name`.
    fn band_energies(
        &self,
        band_name: &str,
        spectrogram: &OrderSpectrogram,
        mean_energy: &[f64],
    ) -> AnalysisResult<Vec<f64>> {
        let band = self
            .spec
            .bands
            .get(band_name)
            .ok_or_else(|| AnalysisError::SpecMismatch(format!("unknown band '{band_name}'")))?;

        let (first, last) = match (spectrogram.order_bins.first(), spectrogram.order_bins.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => return Err(AnalysisError::SpecMismatch("spectrogram has no order bins".to_string())),
        };
        if band.low < first - EDGE_TOLERANCE || band.high > last + EDGE_TOLERANCE {
            return Err(AnalysisError::SpecMismatch(format!(
                "band '{band_name}' [{}, {}] lies outside the spectrogram order range [{first}, {last}]",
                band.low, band.high
            )));
        }

        let energies: Vec<f64> = spectrogram
            .order_bins
            .iter()
            .zip(mean_energy)
            .filter(|(order, _)| band.contains(**order))
            .map(|(_, &e)| e)
            .collect();
        if energies.is_empty() {
            return Err(AnalysisError::SpecMismatch(format!(
                "band '{band_name}' [{}, {}] contains no order bin",
                band.low, band.high
            )));
        }
        Ok(energies)
    }
}

fn rms_about_mean(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    (signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpectrogramScale, StepAxis, SyncDomain};

    fn spectrogram(energy_at: &[(f64, f64)]) -> OrderSpectrogram {
        let order_bins: Vec<f64> = (0..=80).map(|j| j as f64 / 4.0).collect();
        let values = order_bins
            .iter()
            .map(|&o| {
                let e = energy_at
                    .iter()
                    .find(|(order, _)| (order - o).abs() < 1e-9)
                    .map_or(1e-6, |(_, e)| *e);
                vec![e, e]
            })
            .collect();
        OrderSpectrogram {
            order_bins,
            steps: vec![1800.0, 1800.0],
            axis: StepAxis::Speed,
            step_times: vec![0.1, 0.2],
            step_speeds: vec![1800.0, 1800.0],
            scale: SpectrogramScale::Energy,
            values,
        }
    }

    fn dataset() -> SynchronizedDataset {
        SynchronizedDataset::new(
            "M1".into(),
            SyncDomain::Angle { samples_per_revolution: 4 },
            vec!["acc".into()],
            vec![0.0, 0.1, 0.2, 0.3],
            vec![1800.0; 4],
            vec![vec![11.0, 9.0, 11.0, 9.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_default_spec_is_valid() {
        let spec = FeatureSpec::default();
        assert!(spec.validate().is_empty());
        assert_eq!(spec.feature_names()[0], "peak_1x");
    }

    #[test]
    fn test_default_features_in_order() {
        let spec = FeatureSpec::default();
        let s = spectrogram(&[(1.0, 4.0), (5.0, 0.25)]);
        let fv = FeatureExtractor::new(&spec, "default")
            .extract(&s, Some(&dataset()))
            .unwrap();
        assert_eq!(fv.names(), spec.feature_names());
        assert!((fv.get("peak_1x").unwrap() - 2.0).abs() < 1e-9);
        assert!((fv.get("peak_5x").unwrap() - 0.5).abs() < 1e-9);
        assert!((fv.get("rms").unwrap() - 1.0).abs() < 1e-9);
        let ratio = fv.get("ratio_5x_1x").unwrap();
        assert!(ratio > 0.05 && ratio < 0.07, "ratio {ratio}");
    }

    #[test]
    fn test_band_outside_range_is_mismatch() {
        let mut spec = FeatureSpec::default();
        spec.bands.insert("high".into(), OrderBand::new(30.0, 31.0));
        spec.rules.push(FeatureRule::BandPeak {
            name: "peak_high".into(),
            band: "high".into(),
        });
        let err = FeatureExtractor::new(&spec, "default")
            .extract(&spectrogram(&[]), Some(&dataset()))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::SpecMismatch(_)));
    }

    #[test]
    fn test_band_between_bins_is_mismatch() {
        let spec = FeatureSpec {
            bands: [("narrow".to_string(), OrderBand::new(1.05, 1.1))].into_iter().collect(),
            rules: vec![FeatureRule::BandMeanEnergy {
                name: "e".into(),
                band: "narrow".into(),
            }],
        };
        let err = FeatureExtractor::new(&spec, "default")
            .extract(&spectrogram(&[]), None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::SpecMismatch(ref m) if m.contains("no order bin")));
    }

    #[test]
    fn test_rms_without_dataset_is_mismatch() {
        let spec = FeatureSpec::default();
        let err = FeatureExtractor::new(&spec, "default")
            .extract(&spectrogram(&[]), None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::SpecMismatch(_)));
    }

    #[test]
    fn test_validate_reports_unknown_band_and_duplicates() {
        let spec = FeatureSpec {
            bands: BTreeMap::new(),
            rules: vec![
                FeatureRule::BandPeak { name: "a".into(), band: "nope".into() },
                FeatureRule::BroadbandRms { name: "a".into(), channel: None },
            ],
        };
        let errors = spec.validate();
        assert!(errors.iter().any(|e| e.contains("unknown band")));
        assert!(errors.iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn test_rule_toml_shape() {
        let spec: FeatureSpec = toml::from_str(
            r#"
[bands]
one_x = { low = 0.75, high = 1.25 }

[[rules]]
kind = "band_peak"
name = "peak_1x"
band = "one_x"
"#,
        )
        .unwrap();
        assert!(spec.validate().is_empty());
        assert_eq!(spec.rules.len(), 1);
    }
}
