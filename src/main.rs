//! orderscope - order-tracking vibration analysis
//!
//! Turns rotating-machine acceleration recordings into order spectrograms,
//! order-band features and an OK / NOT_OK verdict.
//!
//! # Usage
//!
//! ```bash
//! # Analyze one recording, machine id taken from the file name
//! orderscope analyze data/PUMP-07_2024-05-01.csv --machine-from-filename
//!
//! # Explicit machine id, JSON report plus render data for a chart
//! orderscope analyze run.csv --machine PUMP-07 --json --render render.json
//!
//! # Many recordings on all cores
//! orderscope batch data/*.csv --machine-from-filename --output results.json
//!
//! # HTTP API
//! orderscope serve --addr 0.0.0.0:8080
//! ```
//!
//! # Environment Variables
//!
//! - `ORDERSCOPE_CONFIG`: Path to the TOML config (default: ./orderscope.toml)
//! - `ORDERSCOPE_CORS_ORIGINS`: Comma-separated origins allowed by the API
//! - `RUST_LOG`: Logging level (default: info)
//!
//! `analyze` exits with status 2 when the verdict is NOT_OK.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use orderscope::acquisition::{machine_id_from_filename, read_table_from_path};
use orderscope::api::{create_app, AppState};
use orderscope::config::{defaults, AnalyzerConfig};
use orderscope::pipeline::{analyze_batch, AnalysisReport, Analyzer, BatchJob, BatchResult, RenderData};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "orderscope")]
#[command(about = "Order-tracking vibration analysis for rotating machinery")]
#[command(version)]
struct CliArgs {
    /// Config file (errors are fatal; otherwise ORDERSCOPE_CONFIG and ./orderscope.toml are tried)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one CSV recording
    Analyze {
        csv: PathBuf,

        /// Machine identifier
        #[arg(short, long, required_unless_present = "machine_from_filename")]
        machine: Option<String>,

        /// Take the machine identifier from the file-name token before the first '_'
        #[arg(long, conflicts_with = "machine")]
        machine_from_filename: bool,

        /// Write render data (series + heatmap) to this JSON file
        #[arg(long, value_name = "PATH")]
        render: Option<PathBuf>,

        /// Print the full report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Analyze several CSV recordings in parallel
    Batch {
        #[arg(required = true)]
        csv: Vec<PathBuf>,

        /// Machine identifier applied to every file
        #[arg(short, long, required_unless_present = "machine_from_filename")]
        machine: Option<String>,

        /// Take each file's machine identifier from its name
        #[arg(long, conflicts_with = "machine")]
        machine_from_filename: bool,

        /// Write all outcomes as a JSON array (default: stdout)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Serve the HTTP API
    Serve {
        /// Override server.addr from the config
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Validate the config and the artifact directory, then exit
    CheckConfig {
        /// Print the effective config as TOML
        #[arg(long)]
        print: bool,
    },
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Explicit `--config` must load; otherwise the standard search order applies.
fn load_config(explicit: Option<&Path>) -> Result<AnalyzerConfig> {
    match explicit {
        Some(path) => AnalyzerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AnalyzerConfig::load()),
    }
}

fn build_analyzer(config: AnalyzerConfig) -> Result<Analyzer> {
    let dir = config.classifier.artifact_dir.clone();
    let analyzer = Analyzer::from_config(config)
        .with_context(|| format!("Failed to load decision artifacts from {}", dir.display()))?;
    if analyzer.registry().is_empty() {
        warn!(dir = %dir.display(), "No decision artifacts loaded; every analysis will fail with MODEL_UNAVAILABLE");
    }
    Ok(analyzer)
}

/// How the CLI obtains the machine identifier for a file.
#[derive(Debug, Clone)]
enum MachineSource {
    Explicit(String),
    FromFilename,
}

impl MachineSource {
    fn from_args(machine: Option<String>, from_filename: bool) -> Result<Self> {
        match (machine, from_filename) {
            (Some(id), false) => Ok(Self::Explicit(id)),
            (None, true) => Ok(Self::FromFilename),
            _ => bail!("pass exactly one of --machine or --machine-from-filename"),
        }
    }

    fn resolve(&self, csv: &Path) -> Result<String> {
        match self {
            Self::Explicit(id) => Ok(id.clone()),
            Self::FromFilename => machine_id_from_filename(csv).with_context(|| {
                format!("Cannot derive a machine id from {}; pass --machine", csv.display())
            }),
        }
    }
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn run_analyze(
    analyzer: &Analyzer,
    csv: &Path,
    machine: &MachineSource,
    render: Option<&Path>,
    json: bool,
) -> Result<bool> {
    let machine_id = machine.resolve(csv)?;
    let table = read_table_from_path(csv)?;
    let (dataset, report) = analyzer
        .run(&table, &machine_id)
        .with_context(|| format!("Analysis of {} failed", csv.display()))?;

    if let Some(path) = render {
        let data = RenderData::build(&dataset, &report.spectrogram, analyzer.config().render.max_series_points);
        write_json(&data, path)?;
        info!(path = %path.display(), "Render data written");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, dataset.domain.label());
    }
    Ok(report.classification.verdict.is_ok())
}

fn print_summary(report: &AnalysisReport, domain: &str) {
    let c = &report.classification;
    println!("machine     {} ({})", report.machine_id, report.machine_class);
    println!("domain      {domain}");
    println!(
        "spectrogram {} orders x {} steps, peak order {}",
        report.spectrogram.n_orders(),
        report.spectrogram.n_steps(),
        report
            .spectrogram
            .peak_order()
            .map_or_else(|| "-".to_string(), |o| format!("{o:.2}"))
    );
    for f in &report.features.features {
        println!("  {:<20} {:.6}", f.name, f.value);
    }
    match c.confidence {
        Some(p) => println!("verdict     {} (confidence {:.3})", c.verdict, p),
        None => println!("verdict     {}", c.verdict),
    }
    println!("artifact    v{} {}", c.artifact_version, c.artifact_fingerprint);
}

fn run_batch(
    analyzer: &Analyzer,
    files: &[PathBuf],
    machine: &MachineSource,
    output: Option<&Path>,
) -> Result<()> {
    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let machine_id = machine.resolve(path)?;
        let table = read_table_from_path(path)?;
        jobs.push(BatchJob {
            label: path.display().to_string(),
            machine_id,
            table,
        });
    }

    let outcomes = analyze_batch(analyzer, jobs);
    for o in &outcomes {
        match &o.result {
            BatchResult::Completed { report } => {
                info!(file = %o.label, verdict = %report.classification.verdict, "Completed");
            }
            BatchResult::Failed { code, message } => {
                error!(file = %o.label, code, "{message}");
            }
        }
    }

    match output {
        Some(path) => write_json(&outcomes, path)?,
        None => println!("{}", serde_json::to_string_pretty(&outcomes)?),
    }
    Ok(())
}

async fn run_server(analyzer: Analyzer, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| analyzer.config().server.addr.clone());
    let max_upload = analyzer.config().server.max_upload_bytes;
    let app = create_app(AppState::new(analyzer), max_upload);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("HTTP API listening on http://{}/api/v1", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received Ctrl+C, shutting down");
        })
        .await
        .context("HTTP server error")?;
    info!("Shutdown complete");
    Ok(())
}

fn run_check_config(explicit: Option<&Path>, print: bool) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(defaults::CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
            local.exists().then_some(local)
        });

    let config = match &path {
        Some(p) => AnalyzerConfig::load_from_file(p).with_context(|| format!("{} is invalid", p.display()))?,
        None => {
            println!("No config file found, checking built-in defaults");
            AnalyzerConfig::default()
        }
    };
    if let Some(p) = &path {
        println!("config      {} OK", p.display());
    }
    println!("profiles    {}", config.machines.len());

    if print {
        println!("{}", config.to_toml()?);
    }

    let analyzer = build_analyzer(config)?;
    println!("artifacts   {}", analyzer.registry().len());
    for s in analyzer.registry().summaries() {
        println!(
            "  {:<16} {} v{} ({} features) {}",
            s.machine_class,
            s.model_type,
            s.version,
            s.feature_names.len(),
            s.fingerprint
        );
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    match args.command {
        Command::Analyze {
            csv,
            machine,
            machine_from_filename,
            render,
            json,
        } => {
            let machine = MachineSource::from_args(machine, machine_from_filename)?;
            let analyzer = build_analyzer(load_config(args.config.as_deref())?)?;
            let healthy = tokio::task::spawn_blocking(move || {
                run_analyze(&analyzer, &csv, &machine, render.as_deref(), json)
            })
            .await??;
            if !healthy {
                std::process::exit(2);
            }
        }
        Command::Batch {
            csv,
            machine,
            machine_from_filename,
            output,
        } => {
            let machine = MachineSource::from_args(machine, machine_from_filename)?;
            let analyzer = build_analyzer(load_config(args.config.as_deref())?)?;
            tokio::task::spawn_blocking(move || run_batch(&analyzer, &csv, &machine, output.as_deref()))
            .await??;
        }
        Command::Serve { addr } => {
            let analyzer = build_analyzer(load_config(args.config.as_deref())?)?;
            run_server(analyzer, addr).await?;
        }
        Command::CheckConfig { print } => {
            if let Err(e) = run_check_config(args.config.as_deref(), print) {
                bail!("Config check failed: {e:#}");
            }
        }
    }
    Ok(())
}
