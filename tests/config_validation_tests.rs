//! Config Validation Tests
//!
//! Typo detection, range checks and machine-profile validation, exercised
//! through the public config API independently from the pipeline.

use orderscope::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use orderscope::config::{AnalyzerConfig, ConfigError, DomainPreference, ReferenceConvention};
use orderscope::processing::{FeatureRule, OrderBand};
use std::io::Write;

fn validation_errors(toml_str: &str) -> Vec<String> {
    match AnalyzerConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_spectrogram_key_warns_with_suggestion() {
    let toml_str = r#"
[spectrogram]
overlpa = 0.5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("overlpa"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("spectrogram.overlap"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_machine_profile_warns() {
    let toml_str = r#"
[[machines]]
class = "pump"
id_patern = "^P-"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("machines.id_pattern"));
}

#[test]
fn unrelated_key_warns_without_suggestion() {
    let warnings = validate_unknown_keys("[spectrogram]\ncompletely_different = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let config = AnalyzerConfig::from_toml_str("[server]\nadress = \"127.0.0.1:1\"\n")
        .expect("unknown keys only warn");
    assert_eq!(config.server.addr, "0.0.0.0:8080");
}

#[test]
fn band_names_are_free_form() {
    let toml_str = r#"
[[machines]]
class = "fan"

[machines.features.bands]
blade_pass = { low = 6.5, high = 7.5 }

[[machines.features.rules]]
kind = "band_peak"
name = "peak_bpf"
band = "blade_pass"
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn every_known_key_is_its_own_best_suggestion() {
    let known = known_config_keys();
    for key in &known {
        assert_eq!(suggest_correction(key, &known).as_deref(), Some(*key));
    }
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn default_config_has_no_range_errors() {
    let (errors, warnings) = validate_ranges(&AnalyzerConfig::default());
    assert!(errors.is_empty());
    assert!(warnings.is_empty(), "defaults should not warn: {warnings:?}");
}

#[test]
fn odd_angle_grid_warns_but_loads() {
    let config = AnalyzerConfig::from_toml_str("[synchronization]\nsamples_per_revolution = 48\n")
        .expect("non power of two is allowed");
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "synchronization.samples_per_revolution"));
}

#[test]
fn max_order_above_angle_nyquist_is_rejected() {
    let errors = validation_errors(
        r#"
[synchronization]
samples_per_revolution = 32

[spectrogram]
max_order = 20.0
"#,
    );
    assert!(errors.iter().any(|e| e.contains("Nyquist")));
}

#[test]
fn several_problems_are_reported_together() {
    let errors = validation_errors(
        r#"
[synchronization]
gap_factor = 0.5

[spectrogram]
overlap = 1.5
bins_per_order = 0
"#,
    );
    assert!(errors.len() >= 3, "got {errors:?}");
}

#[test]
fn non_finite_values_are_rejected() {
    let errors = validation_errors("[synchronization]\nspeed_smoothing_seconds = nan\n");
    assert!(errors.iter().any(|e| e.contains("NaN")), "got {errors:?}");
}

// ============================================================================
// Machine Profiles
// ============================================================================

#[test]
fn feature_rule_referencing_unknown_band_is_rejected() {
    let errors = validation_errors(
        r#"
[[machines]]
class = "fan"

[machines.features.bands]
one_x = { low = 0.75, high = 1.25 }

[[machines.features.rules]]
kind = "band_ratio"
name = "r"
numerator = "one_x"
denominator = "missing"
"#,
    );
    assert!(errors.iter().any(|e| e.contains("fan") && e.contains("unknown band")), "got {errors:?}");
}

#[test]
fn full_profile_parses() {
    let config = AnalyzerConfig::from_toml_str(
        r#"
[synchronization]
domain = "time"

[[machines]]
class = "pump"
id_pattern = "^PUMP-"
time_column = "time_ms"
time_scale = 0.001
reference = "pulses"
pulses_per_revolution = 2.0

[machines.features.bands]
three_x = { low = 2.75, high = 3.25 }

[[machines.features.rules]]
kind = "band_peak"
name = "peak_3x"
band = "three_x"

[[machines.features.rules]]
kind = "broadband_rms"
name = "rms"
"#,
    )
    .expect("profile should parse");

    assert_eq!(config.synchronization.domain, DomainPreference::Time);
    let pump = config.resolve_profile("PUMP-3");
    assert_eq!(pump.class, "pump");
    assert_eq!(pump.reference, ReferenceConvention::Pulses);
    assert_eq!(pump.features.feature_names(), vec!["peak_3x", "rms"]);
    assert_eq!(pump.features.bands["three_x"], OrderBand::new(2.75, 3.25));
    assert!(matches!(pump.features.rules[1], FeatureRule::BroadbandRms { channel: None, .. }));
    assert_eq!(config.resolve_profile("FAN-1").class, "default");
}

#[test]
fn example_config_file_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("orderscope.example.toml");
    let config = AnalyzerConfig::load_from_file(&path).expect("shipped example should load");
    assert_eq!(config.machines.len(), 1);
    assert_eq!(config.resolve_profile("PUMP-12").time_scale, 0.001);
}

#[test]
fn parse_error_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[spectrogram\noverlap = ").unwrap();
    let err = AnalyzerConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref p, _) if p == file.path()));
    assert!(err.to_string().contains("Config parse error"));
}
