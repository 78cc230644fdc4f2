//! Analyzer configuration: every pipeline parameter as an operator-tunable TOML value
//!
//! Each struct implements `Default` with the values in [`super::defaults`], so
//! an empty or missing file yields a working analyzer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::processing::features::FeatureSpec;
use crate::types::{SpectrogramScale, StepAxis};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an analyzer deployment.
///
/// Load with `AnalyzerConfig::load()` which searches:
/// 1. `$ORDERSCOPE_CONFIG` env var
/// 2. `./orderscope.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Resampling against the rotational reference
    #[serde(default)]
    pub synchronization: SyncConfig,

    /// Order spectrogram windowing and binning
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,

    /// Decision artifact location
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Render-data shaping
    #[serde(default)]
    pub render: RenderConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Machine profiles, first matching `id_pattern` wins
    #[serde(default)]
    pub machines: Vec<MachineProfile>,
}

impl AnalyzerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ORDERSCOPE_CONFIG` environment variable
    /// 2. `./orderscope.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analyzer config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from env path, falling back");
                    }
                }
            } else {
                warn!(path = %path, "Config env var points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analyzer config from ./{}", defaults::CONFIG_FILE_NAME);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::CONFIG_FILE_NAME);
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all parameters for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let s = &self.synchronization;
        if s.samples_per_revolution < 4 {
            errors.push("synchronization.samples_per_revolution must be >= 4".to_string());
        }
        if s.speed_smoothing_seconds < 0.0 {
            errors.push("synchronization.speed_smoothing_seconds must be >= 0".to_string());
        }
        if s.gap_factor <= 1.0 {
            errors.push(format!(
                "synchronization.gap_factor ({:.2}) must be > 1",
                s.gap_factor
            ));
        }
        Self::check_positive_opt(s.max_gap_seconds, "synchronization.max_gap_seconds", &mut errors);
        Self::check_positive_opt(s.time_sample_rate_hz, "synchronization.time_sample_rate_hz", &mut errors);
        if s.min_revolutions <= 0.0 {
            errors.push("synchronization.min_revolutions must be > 0".to_string());
        }
        if s.min_samples < 2 {
            errors.push("synchronization.min_samples must be >= 2".to_string());
        }
        if s.max_pulse_interval_ratio <= 1.0 {
            errors.push("synchronization.max_pulse_interval_ratio must be > 1".to_string());
        }

        let sp = &self.spectrogram;
        if sp.window_revolutions <= 0.0 {
            errors.push("spectrogram.window_revolutions must be > 0".to_string());
        }
        if matches!(sp.window_samples, Some(n) if n < 8) {
            errors.push("spectrogram.window_samples must be >= 8".to_string());
        }
        if !(0.0..1.0).contains(&sp.overlap) {
            errors.push(format!("spectrogram.overlap ({:.3}) must be in [0, 1)", sp.overlap));
        }
        if sp.max_order <= 0.0 {
            errors.push("spectrogram.max_order must be > 0".to_string());
        }
        if sp.bins_per_order == 0 {
            errors.push("spectrogram.bins_per_order must be > 0".to_string());
        }
        if sp.floor <= 0.0 {
            errors.push("spectrogram.floor must be > 0".to_string());
        }
        let angle_nyquist = s.samples_per_revolution as f64 / 2.0;
        if sp.max_order > angle_nyquist {
            errors.push(format!(
                "spectrogram.max_order ({:.1}) exceeds the angle-grid Nyquist order ({:.1}); raise synchronization.samples_per_revolution",
                sp.max_order, angle_nyquist
            ));
        }

        if self.render.max_series_points < 2 {
            errors.push("render.max_series_points must be >= 2".to_string());
        }
        if self.server.max_upload_bytes == 0 {
            errors.push("server.max_upload_bytes must be > 0".to_string());
        }

        for (idx, m) in self.machines.iter().enumerate() {
            let label = format!("machines[{idx}] ({})", m.class);
            if m.class.trim().is_empty() {
                errors.push(format!("machines[{idx}].class must not be empty"));
            }
            if let Err(e) = Regex::new(&m.id_pattern) {
                errors.push(format!("{label}: invalid id_pattern: {e}"));
            }
            if m.pulses_per_revolution <= 0.0 {
                errors.push(format!("{label}: pulses_per_revolution must be > 0"));
            }
            if m.time_scale <= 0.0 {
                errors.push(format!("{label}: time_scale must be > 0"));
            }
            if m.acceleration_scale == 0.0 {
                errors.push(format!("{label}: acceleration_scale must be non-zero"));
            }
            if m.acceleration_columns.is_empty() && m.acceleration_prefixes.is_empty() {
                errors.push(format!(
                    "{label}: needs acceleration_columns or acceleration_prefixes"
                ));
            }
            errors.extend(m.features.validate().into_iter().map(|e| format!("{label}: {e}")));
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any config value
        if let Ok(value) = toml::Value::try_from(self) {
            if !super::validation::all_floats_finite(&value) {
                errors.push("Config contains NaN or Inf values, all parameters must be finite numbers".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive_opt(value: Option<f64>, name: &str, errors: &mut Vec<String>) {
        if let Some(v) = value {
            if !(v > 0.0) {
                errors.push(format!("{name} must be > 0 when set (got {v})"));
            }
        }
    }

    /// Profile for a machine identifier: the first configured profile whose
    /// `id_pattern` matches, else the built-in default profile.
    ///
    /// Compiles every pattern per call; long-lived callers hold a
    /// [`ProfileResolver`] instead.
    pub fn resolve_profile(&self, machine_id: &str) -> MachineProfile {
        ProfileResolver::new(&self.machines).resolve(machine_id).clone()
    }
}

/// Machine profiles with their `id_pattern`s compiled once.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    profiles: Vec<(Regex, MachineProfile)>,
    fallback: MachineProfile,
}

impl ProfileResolver {
    /// Profiles whose pattern does not compile are skipped with a warning;
    /// `AnalyzerConfig::validate` rejects them at load time.
    pub fn new(machines: &[MachineProfile]) -> Self {
        let profiles = machines
            .iter()
            .filter_map(|profile| match Regex::new(&profile.id_pattern) {
                Ok(re) => Some((re, profile.clone())),
                Err(e) => {
                    warn!(class = %profile.class, error = %e, "Skipping machine profile with invalid id_pattern");
                    None
                }
            })
            .collect();
        Self {
            profiles,
            fallback: MachineProfile::default(),
        }
    }

    pub fn resolve(&self, machine_id: &str) -> &MachineProfile {
        self.profiles
            .iter()
            .find(|(re, _)| re.is_match(machine_id))
            .map_or(&self.fallback, |(_, profile)| profile)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Synchronization
// ============================================================================

/// Which resampling base the synchronizer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPreference {
    /// Angle grid unless the reference pulses are ambiguous
    #[default]
    Auto,
    Angle,
    Time,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub domain: DomainPreference,

    /// Points per shaft revolution on the angle grid
    #[serde(default = "default_samples_per_revolution")]
    pub samples_per_revolution: usize,

    /// Uniform rate for the time grid; median raw rate when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_sample_rate_hz: Option<f64>,

    /// Centered moving-average width for the speed curve (seconds)
    #[serde(default = "default_speed_smoothing_seconds")]
    pub speed_smoothing_seconds: f64,

    /// Gap threshold as a multiple of the median raw interval
    #[serde(default = "default_gap_factor")]
    pub gap_factor: f64,

    /// Absolute gap ceiling (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gap_seconds: Option<f64>,

    #[serde(default = "default_min_revolutions")]
    pub min_revolutions: f64,

    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Consecutive pulse-interval ratio that marks the pulse train ambiguous
    #[serde(default = "default_max_pulse_interval_ratio")]
    pub max_pulse_interval_ratio: f64,
}

fn default_samples_per_revolution() -> usize {
    defaults::SAMPLES_PER_REVOLUTION
}
fn default_speed_smoothing_seconds() -> f64 {
    defaults::SPEED_SMOOTHING_SECONDS
}
fn default_gap_factor() -> f64 {
    defaults::GAP_FACTOR
}
fn default_min_revolutions() -> f64 {
    defaults::MIN_REVOLUTIONS
}
fn default_min_samples() -> usize {
    defaults::MIN_SAMPLES
}
fn default_max_pulse_interval_ratio() -> f64 {
    defaults::MAX_PULSE_INTERVAL_RATIO
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            domain: DomainPreference::default(),
            samples_per_revolution: default_samples_per_revolution(),
            time_sample_rate_hz: None,
            speed_smoothing_seconds: default_speed_smoothing_seconds(),
            gap_factor: default_gap_factor(),
            max_gap_seconds: None,
            min_revolutions: default_min_revolutions(),
            min_samples: default_min_samples(),
            max_pulse_interval_ratio: default_max_pulse_interval_ratio(),
        }
    }
}

// ============================================================================
// Spectrogram
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Window length in shaft revolutions (ignored when `window_samples` is set)
    #[serde(default = "default_window_revolutions")]
    pub window_revolutions: f64,

    /// Window length in synchronized samples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_samples: Option<usize>,

    #[serde(default = "default_overlap")]
    pub overlap: f64,

    #[serde(default = "default_max_order")]
    pub max_order: f64,

    #[serde(default = "default_bins_per_order")]
    pub bins_per_order: usize,

    #[serde(default)]
    pub scale: SpectrogramScale,

    #[serde(default)]
    pub axis: StepAxis,

    #[serde(default = "default_floor")]
    pub floor: f64,

    /// Acceleration channel to analyze; first channel when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

fn default_window_revolutions() -> f64 {
    defaults::WINDOW_REVOLUTIONS
}
fn default_overlap() -> f64 {
    defaults::OVERLAP
}
fn default_max_order() -> f64 {
    defaults::MAX_ORDER
}
fn default_bins_per_order() -> usize {
    defaults::BINS_PER_ORDER
}
fn default_floor() -> f64 {
    defaults::ENERGY_FLOOR
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_revolutions: default_window_revolutions(),
            window_samples: None,
            overlap: default_overlap(),
            max_order: default_max_order(),
            bins_per_order: default_bins_per_order(),
            scale: SpectrogramScale::default(),
            axis: StepAxis::default(),
            floor: default_floor(),
            channel: None,
        }
    }
}

// ============================================================================
// Classifier / Render / Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(defaults::ARTIFACT_DIR)
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_max_series_points")]
    pub max_series_points: usize,
}

fn default_max_series_points() -> usize {
    defaults::MAX_SERIES_POINTS
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_series_points: default_max_series_points(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}
fn default_max_upload_bytes() -> usize {
    defaults::MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ============================================================================
// Machine Profiles
// ============================================================================

/// How a machine class encodes its rotational reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceConvention {
    #[default]
    Rpm,
    Pulses,
}

/// Channel-naming and unit conventions plus the feature specification of
/// one machine class. Selects conventions only, never algorithm branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineProfile {
    #[serde(default = "default_class")]
    pub class: String,

    /// Regex matched against the machine identifier
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,

    /// Timestamp column; common names are tried when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_column: Option<String>,

    /// Multiplier converting the time column to seconds
    #[serde(default = "default_unit_scale")]
    pub time_scale: f64,

    /// Explicit acceleration column names
    #[serde(default)]
    pub acceleration_columns: Vec<String>,

    /// Header prefixes identifying acceleration columns
    #[serde(default = "default_acceleration_prefixes")]
    pub acceleration_prefixes: Vec<String>,

    /// Reference column; common rpm/tach names are tried when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_column: Option<String>,

    #[serde(default)]
    pub reference: ReferenceConvention,

    #[serde(default = "default_unit_scale")]
    pub pulses_per_revolution: f64,

    /// Multiplier converting acceleration values to the analysis unit
    #[serde(default = "default_unit_scale")]
    pub acceleration_scale: f64,

    #[serde(default)]
    pub features: FeatureSpec,
}

fn default_class() -> String {
    "default".to_string()
}
fn default_id_pattern() -> String {
    ".*".to_string()
}
fn default_unit_scale() -> f64 {
    1.0
}
fn default_acceleration_prefixes() -> Vec<String> {
    ["acc", "accel", "vib"].iter().map(|s| s.to_string()).collect()
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            class: default_class(),
            id_pattern: default_id_pattern(),
            time_column: None,
            time_scale: default_unit_scale(),
            acceleration_columns: Vec::new(),
            acceleration_prefixes: default_acceleration_prefixes(),
            reference_column: None,
            reference: ReferenceConvention::default(),
            pulses_per_revolution: default_unit_scale(),
            acceleration_scale: default_unit_scale(),
            features: FeatureSpec::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: AnalyzerConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.synchronization.samples_per_revolution, 64);
        assert_eq!(config.spectrogram.bins_per_order, 4);
        assert_eq!(config.spectrogram.scale, SpectrogramScale::Magnitude);
        assert_eq!(config.spectrogram.axis, StepAxis::Speed);
        assert!(config.machines.is_empty());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[spectrogram]
overlap = 0.75
scale = "decibel"

[[machines]]
class = "pump"
id_pattern = "^P-"
reference = "pulses"
pulses_per_revolution = 2.0
"#;
        let config = AnalyzerConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.spectrogram.overlap, 0.75);
        assert_eq!(config.spectrogram.scale, SpectrogramScale::Decibel);
        assert_eq!(config.spectrogram.max_order, 20.0);
        assert_eq!(config.machines.len(), 1);
        assert_eq!(config.machines[0].reference, ReferenceConvention::Pulses);
        assert!(!config.machines[0].features.rules.is_empty());
    }

    #[test]
    fn test_resolve_profile_first_match_then_default() {
        let mut config = AnalyzerConfig::default();
        config.machines.push(MachineProfile {
            class: "pump".into(),
            id_pattern: "^P-".into(),
            ..Default::default()
        });
        assert_eq!(config.resolve_profile("P-101").class, "pump");
        assert_eq!(config.resolve_profile("FAN7").class, "default");
    }

    #[test]
    fn test_resolver_skips_uncompilable_pattern() {
        let machines = vec![
            MachineProfile {
                class: "broken".into(),
                id_pattern: "([unclosed".into(),
                ..Default::default()
            },
            MachineProfile {
                class: "pump".into(),
                id_pattern: "^P-".into(),
                ..Default::default()
            },
        ];
        let resolver = ProfileResolver::new(&machines);
        assert_eq!(resolver.resolve("P-7").class, "pump");
        assert_eq!(resolver.resolve("([unclosed").class, "default");
    }

    #[test]
    fn test_validation_catches_bad_overlap() {
        let mut config = AnalyzerConfig::default();
        config.spectrogram.overlap = 1.0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref e)) if e.iter().any(|m| m.contains("overlap"))));
    }

    #[test]
    fn test_validation_catches_order_above_nyquist() {
        let mut config = AnalyzerConfig::default();
        config.synchronization.samples_per_revolution = 16;
        config.spectrogram.max_order = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_catches_bad_pattern() {
        let mut config = AnalyzerConfig::default();
        config.machines.push(MachineProfile {
            id_pattern: "([unclosed".into(),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = AnalyzerConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: AnalyzerConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(
            original.synchronization.gap_factor,
            roundtripped.synchronization.gap_factor
        );
        assert_eq!(original.server.addr, roundtripped.server.addr);
    }
}
