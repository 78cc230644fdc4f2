//! Config validation: unknown-key detection with Levenshtein suggestions
//! and analysis-parameter sanity checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Tables whose keys are user-chosen names (not walked).
const FREE_FORM_TABLES: &[&str] = &["machines.features.bands"];

/// Returns the complete set of valid dotted key paths for AnalyzerConfig.
///
/// Array-of-table entries share their parent's path (`machines.class`).
/// Any new field added to AnalyzerConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [synchronization]
        "synchronization",
        "synchronization.domain",
        "synchronization.samples_per_revolution",
        "synchronization.time_sample_rate_hz",
        "synchronization.speed_smoothing_seconds",
        "synchronization.gap_factor",
        "synchronization.max_gap_seconds",
        "synchronization.min_revolutions",
        "synchronization.min_samples",
        "synchronization.max_pulse_interval_ratio",
        // [spectrogram]
        "spectrogram",
        "spectrogram.window_revolutions",
        "spectrogram.window_samples",
        "spectrogram.overlap",
        "spectrogram.max_order",
        "spectrogram.bins_per_order",
        "spectrogram.scale",
        "spectrogram.axis",
        "spectrogram.floor",
        "spectrogram.channel",
        // [classifier]
        "classifier",
        "classifier.artifact_dir",
        // [render]
        "render",
        "render.max_series_points",
        // [server]
        "server",
        "server.addr",
        "server.max_upload_bytes",
        // [[machines]]
        "machines",
        "machines.class",
        "machines.id_pattern",
        "machines.time_column",
        "machines.time_scale",
        "machines.acceleration_columns",
        "machines.acceleration_prefixes",
        "machines.reference_column",
        "machines.reference",
        "machines.pulses_per_revolution",
        "machines.acceleration_scale",
        // [machines.features]
        "machines.features",
        "machines.features.bands",
        "machines.features.rules",
        "machines.features.rules.kind",
        "machines.features.rules.name",
        "machines.features.rules.band",
        "machines.features.rules.channel",
        "machines.features.rules.numerator",
        "machines.features.rules.denominator",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the array's
/// own path.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if FREE_FORM_TABLES.contains(&prefix) {
        return keys;
    }
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        keys.extend(walk_toml_keys(item, &path));
                    }
                }
                _ => {}
            }
        }
    }
    keys
}

/// True when every float anywhere in the tree is finite.
pub fn all_floats_finite(value: &toml::Value) -> bool {
    match value {
        toml::Value::Float(f) => f.is_finite(),
        toml::Value::Table(t) => t.values().all(all_floats_finite),
        toml::Value::Array(a) => a.iter().all(all_floats_finite),
        _ => true,
    }
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    // Sorted so ties resolve the same way on every run
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    for k in candidates {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, d)| dist < d) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for key in found {
        if !known.contains(key.as_str()) && seen.insert(key.clone()) {
            let suggestion = suggest_correction(&key, &known);
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Parameter Range Validation
// ============================================================================

/// Check analysis parameters that are legal but numerically questionable.
///
/// Returns (errors, warnings). Errors are values the pipeline cannot run
/// with; warnings are suspicious but not fatal.
pub fn validate_ranges(
    config: &super::AnalyzerConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let s = &config.synchronization;
    let sp = &config.spectrogram;

    if s.samples_per_revolution > 4096 {
        errors.push(format!(
            "synchronization.samples_per_revolution ({}) is above 4096",
            s.samples_per_revolution
        ));
    } else if !s.samples_per_revolution.is_power_of_two() {
        warnings.push(ValidationWarning {
            field: "synchronization.samples_per_revolution".into(),
            message: format!(
                "samples_per_revolution = {} is not a power of two; windows will be zero-padded",
                s.samples_per_revolution
            ),
            suggestion: None,
        });
    }

    if sp.window_samples.is_none() && sp.window_revolutions < 2.0 {
        warnings.push(ValidationWarning {
            field: "spectrogram.window_revolutions".into(),
            message: format!(
                "window_revolutions = {:.2} gives an order resolution coarser than 0.5",
                sp.window_revolutions
            ),
            suggestion: None,
        });
    }

    if sp.overlap > 0.9 {
        warnings.push(ValidationWarning {
            field: "spectrogram.overlap".into(),
            message: format!(
                "overlap = {:.2} produces many nearly identical columns",
                sp.overlap
            ),
            suggestion: None,
        });
    }

    if s.speed_smoothing_seconds > 1.0 {
        warnings.push(ValidationWarning {
            field: "synchronization.speed_smoothing_seconds".into(),
            message: format!(
                "speed_smoothing_seconds = {:.2} will lag real speed changes",
                s.speed_smoothing_seconds
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basic() {
        assert_eq!(levenshtein("overlap", "overlap"), 0);
        assert_eq!(levenshtein("overlpa", "overlap"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_walk_skips_band_names() {
        let value: toml::Value = r#"
[[machines]]
class = "pump"
[machines.features.bands]
one_x = { low = 0.75, high = 1.25 }
"#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&value, "");
        assert!(keys.contains(&"machines.class".to_string()));
        assert!(keys.contains(&"machines.features.bands".to_string()));
        assert!(!keys.iter().any(|k| k.contains("one_x")));
    }

    #[test]
    fn test_non_finite_detected() {
        let value: toml::Value = "a = { b = nan }".parse().unwrap();
        assert!(!all_floats_finite(&value));
        let value: toml::Value = "a = { b = 1.5 }".parse().unwrap();
        assert!(all_floats_finite(&value));
    }
}
