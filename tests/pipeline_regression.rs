//! Pipeline Regression Tests
//!
//! End-to-end runs of `ingest` + `analyze` over seeded synthetic recordings
//! and the shipped `artifacts/default.json` decision model. Asserts on
//! verdicts, order content across speeds, error kinds and determinism.

use orderscope::acquisition::{read_table, write_table};
use orderscope::config::{AnalyzerConfig, DomainPreference, MachineProfile};
use orderscope::pipeline::{analyze_batch, BatchJob, BatchResult};
use orderscope::synthetic::SyntheticRecording;
use orderscope::{AnalysisError, Analyzer, RawTable, RenderData, Verdict};
use std::path::PathBuf;

fn artifact_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

fn analyzer_with(mut config: AnalyzerConfig) -> Analyzer {
    config.classifier.artifact_dir = artifact_dir();
    Analyzer::from_config(config).expect("shipped artifacts should load")
}

fn analyzer() -> Analyzer {
    analyzer_with(AnalyzerConfig::default())
}

fn table(recording: SyntheticRecording) -> RawTable {
    recording.generate().expect("synthetic recording should generate")
}

// ============================================================================
// Verdicts
// ============================================================================

#[test]
fn healthy_constant_speed_is_ok() {
    let (dataset, report) = analyzer()
        .run(&table(SyntheticRecording::nominal(1800.0)), "FAN-01")
        .unwrap();

    assert_eq!(dataset.domain.label(), "angle");
    assert_eq!(report.machine_class, "default");
    assert!(report.spectrogram.is_rectangular());
    assert_eq!(report.spectrogram.peak_order(), Some(1.0));
    assert_eq!(report.classification.verdict, Verdict::Ok);
    assert!(report.classification.artifact_fingerprint.starts_with("md5:"));

    let peak_1x = report.features.get("peak_1x").unwrap();
    assert!((peak_1x - 1.0).abs() < 0.1, "peak_1x = {peak_1x}");
    let rms = report.features.get("rms").unwrap();
    assert!((rms - 0.79).abs() < 0.05, "rms = {rms}");
}

#[test]
fn fifth_order_fault_is_not_ok() {
    let rec = SyntheticRecording::nominal(1800.0).with_fault(5.0, 0.5);
    let (_, report) = analyzer().run(&table(rec), "FAN-01").unwrap();

    let peak_5x = report.features.get("peak_5x").unwrap();
    assert!((peak_5x - 0.5).abs() < 0.05, "peak_5x = {peak_5x}");
    assert_eq!(report.classification.verdict, Verdict::NotOk);
}

#[test]
fn order_content_does_not_depend_on_speed() {
    let a = analyzer();
    let slow = a
        .run(&table(SyntheticRecording::nominal(1200.0).with_fault(5.0, 0.5)), "FAN-01")
        .unwrap()
        .1;
    let fast = a
        .run(&table(SyntheticRecording::nominal(2400.0).with_fault(5.0, 0.5)), "FAN-01")
        .unwrap()
        .1;

    for name in ["peak_1x", "peak_2x", "peak_5x"] {
        let s = slow.features.get(name).unwrap();
        let f = fast.features.get(name).unwrap();
        assert!((s - f).abs() / s < 0.1, "{name}: {s} at 1200 rpm vs {f} at 2400 rpm");
    }
    assert_eq!(slow.spectrogram.order_bins, fast.spectrogram.order_bins);
}

#[test]
fn run_up_keeps_orders_sharp() {
    let rec = SyntheticRecording::nominal(900.0)
        .with_ramp(900.0, 2700.0)
        .with_fault(5.0, 0.5);
    let (dataset, report) = analyzer().run(&table(rec), "FAN-01").unwrap();

    assert_eq!(dataset.domain.label(), "angle");
    let peak_5x = report.features.get("peak_5x").unwrap();
    assert!((peak_5x - 0.5).abs() < 0.1, "peak_5x = {peak_5x}");
    assert_eq!(report.classification.verdict, Verdict::NotOk);

    // Speed axis rises across the run-up
    let steps = &report.spectrogram.steps;
    assert!(steps.windows(2).all(|w| w[1] > w[0]));
    assert!(steps[0] < 1200.0 && *steps.last().unwrap() > 2400.0);
}

#[test]
fn tach_pulse_reference_uses_angle_grid() {
    let a = analyzer();
    let healthy = a
        .run(&table(SyntheticRecording::nominal(1800.0).with_pulses(1)), "FAN-01")
        .unwrap();
    assert_eq!(healthy.0.domain.label(), "angle");
    assert_eq!(healthy.1.classification.verdict, Verdict::Ok);

    let faulty = a
        .run(
            &table(SyntheticRecording::nominal(1800.0).with_pulses(1).with_fault(5.0, 0.5)),
            "FAN-01",
        )
        .unwrap();
    assert_eq!(faulty.1.classification.verdict, Verdict::NotOk);
}

#[test]
fn time_domain_resampling_still_separates_fault() {
    let mut config = AnalyzerConfig::default();
    config.synchronization.domain = DomainPreference::Time;
    let a = analyzer_with(config);

    let (dataset, healthy) = a.run(&table(SyntheticRecording::nominal(1800.0)), "FAN-01").unwrap();
    assert_eq!(dataset.domain.label(), "time");
    assert_eq!(healthy.classification.verdict, Verdict::Ok);

    let (_, faulty) = a
        .run(&table(SyntheticRecording::nominal(1800.0).with_fault(5.0, 0.5)), "FAN-01")
        .unwrap();
    assert_eq!(faulty.classification.verdict, Verdict::NotOk);
}

#[test]
fn analysis_is_deterministic() {
    let a = analyzer();
    let t = table(SyntheticRecording::nominal(1500.0).with_fault(3.0, 0.2));
    let first = a.run(&t, "FAN-01").unwrap();
    let second = a.run(&t, "FAN-01").unwrap();
    assert_eq!(first, second);
}

#[test]
fn csv_text_round_trip_gives_same_report() {
    let a = analyzer();
    let t = table(SyntheticRecording::nominal(1800.0).with_duration(4.0));
    let mut buf = Vec::new();
    write_table(&t, &mut buf).unwrap();
    let parsed = read_table(buf.as_slice()).unwrap();

    let direct = a.run(&t, "FAN-01").unwrap().1;
    let via_csv = a.run(&parsed, "FAN-01").unwrap().1;
    assert_eq!(direct.classification.verdict, via_csv.classification.verdict);
    let d = direct.features.get("peak_1x").unwrap();
    let c = via_csv.features.get("peak_1x").unwrap();
    assert!((d - c).abs() < 1e-6);
}

// ============================================================================
// Failure kinds
// ============================================================================

#[test]
fn short_recording_is_insufficient_data() {
    let rec = SyntheticRecording::nominal(1800.0).with_duration(0.2);
    let err = analyzer().run(&table(rec), "FAN-01").unwrap_err();
    assert!(
        matches!(err, AnalysisError::InsufficientData { needed: 512, available } if available < 512),
        "got {err:?}"
    );
}

#[test]
fn missing_reference_column_is_malformed() {
    let mut t = table(SyntheticRecording::nominal(1800.0).with_duration(1.0));
    t.headers.truncate(2);
    t.columns.truncate(2);
    let err = analyzer().ingest(&t, "FAN-01").unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedInput(ref m) if m.contains("reference")), "got {err:?}");
}

#[test]
fn dropout_is_signal_gap() {
    let t = table(SyntheticRecording::nominal(1800.0)).without_rows_between(3.0, 3.5);
    let err = analyzer().ingest(&t, "FAN-01").unwrap_err();
    match err {
        AnalysisError::SignalGap { at, duration, .. } => {
            assert!((at - 3.0).abs() < 0.01, "gap at {at}");
            assert!((duration - 0.5).abs() < 0.01, "gap of {duration}");
        }
        other => panic!("expected SignalGap, got {other:?}"),
    }
}

#[test]
fn invalid_machine_id_is_malformed() {
    let t = table(SyntheticRecording::nominal(1800.0).with_duration(1.0));
    let err = analyzer().ingest(&t, "../etc/passwd").unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedInput(_)));
}

#[test]
fn class_without_artifact_is_model_unavailable() {
    let mut config = AnalyzerConfig::default();
    config.machines.push(MachineProfile {
        class: "pump".into(),
        id_pattern: "^PUMP-".into(),
        ..Default::default()
    });
    let a = analyzer_with(config);
    let t = table(SyntheticRecording::nominal(1800.0));

    // Ingest only needs column conventions
    assert!(a.ingest(&t, "PUMP-07").is_ok());
    let err = a.run(&t, "PUMP-07").unwrap_err();
    assert!(matches!(err, AnalysisError::ModelUnavailable { ref machine_class } if machine_class == "pump"));
    // Other identifiers still resolve to the default class
    assert!(a.run(&t, "FAN-01").is_ok());
}

#[test]
fn missing_artifact_reported_before_spectrogram() {
    let mut config = AnalyzerConfig::default();
    config.machines.push(MachineProfile {
        class: "pump".into(),
        id_pattern: "^PUMP-".into(),
        ..Default::default()
    });
    let a = analyzer_with(config);
    // Too short for one window, so the spectrogram would fail first
    let dataset = a
        .ingest(&table(SyntheticRecording::nominal(1800.0).with_duration(0.2)), "PUMP-07")
        .expect("short recording still synchronizes");
    let err = a.analyze(&dataset, "PUMP-07").unwrap_err();
    assert!(matches!(err, AnalysisError::ModelUnavailable { .. }), "got {err:?}");
}

// ============================================================================
// Batch and render data
// ============================================================================

#[test]
fn batch_keeps_order_and_isolates_failures() {
    let jobs = vec![
        BatchJob {
            label: "healthy".into(),
            machine_id: "FAN-01".into(),
            table: table(SyntheticRecording::nominal(1800.0)),
        },
        BatchJob {
            label: "short".into(),
            machine_id: "FAN-02".into(),
            table: table(SyntheticRecording::nominal(1800.0).with_duration(0.2)),
        },
        BatchJob {
            label: "fault".into(),
            machine_id: "FAN-03".into(),
            table: table(SyntheticRecording::nominal(1800.0).with_fault(5.0, 0.5)),
        },
    ];
    let outcomes = analyze_batch(&analyzer(), jobs);

    let labels: Vec<&str> = outcomes.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, ["healthy", "short", "fault"]);
    assert!(matches!(&outcomes[0].result, BatchResult::Completed { report } if report.classification.verdict == Verdict::Ok));
    assert!(matches!(&outcomes[1].result, BatchResult::Failed { code, .. } if *code == "INSUFFICIENT_DATA"));
    assert!(matches!(&outcomes[2].result, BatchResult::Completed { report } if report.classification.verdict == Verdict::NotOk));

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[1]["status"], "failed");
}

#[test]
fn render_data_is_decimated_and_matches_spectrogram() {
    let (dataset, report) = analyzer()
        .run(&table(SyntheticRecording::nominal(1800.0)), "FAN-01")
        .unwrap();
    let render = RenderData::build(&dataset, &report.spectrogram, 1000);

    assert!(render.timestamps.len() <= 1000);
    assert_eq!(render.timestamps.len(), render.speed_rpm.len());
    assert_eq!(render.channels.len(), 1);
    assert_eq!(render.channels[0].name, "acc_x");
    assert_eq!(render.channels[0].values.len(), render.timestamps.len());
    assert_eq!(render.heatmap.values, report.spectrogram.values);
    assert_eq!(render.heatmap.order_bins, report.spectrogram.order_bins);
}
