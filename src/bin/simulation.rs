//! Synthetic vibration recording generator
//!
//! Writes a CSV recording with a known order content, for exercising the
//! analyzer end to end:
//! - constant speed or a linear run-up / coast-down
//! - 1× and 2× shaft orders plus optional fault orders
//! - rpm column or a tachometer pulse train
//!
//! # Usage
//! ```bash
//! ./simulation --rpm 1800 --output PUMP-01_healthy.csv
//! ./simulation --rpm 1200 --end-rpm 2400 --fault 5:0.5 --pulses 1 -o PUMP-02_fault.csv
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use orderscope::acquisition::write_table;
use orderscope::synthetic::SyntheticRecording;

#[derive(Parser, Debug)]
#[command(name = "orderscope-simulation")]
#[command(about = "Synthetic vibration recordings for orderscope testing")]
#[command(version)]
struct Args {
    /// Shaft speed at the start of the recording
    #[arg(long, default_value = "1800")]
    rpm: f64,

    /// Shaft speed at the end (default: constant speed)
    #[arg(long)]
    end_rpm: Option<f64>,

    /// Recording length in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Acceleration sample rate in Hz
    #[arg(long, default_value = "5000")]
    rate: f64,

    /// Extra order component as ORDER:AMPLITUDE (repeatable)
    #[arg(long, value_name = "ORDER:AMP", value_parser = parse_fault)]
    fault: Vec<(f64, f64)>,

    /// Gaussian noise standard deviation
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Emit a tach pulse column with this many pulses per revolution instead of rpm
    #[arg(long)]
    pulses: Option<u32>,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output CSV file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_fault(s: &str) -> Result<(f64, f64), String> {
    let (order, amp) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ORDER:AMPLITUDE, got '{s}'"))?;
    let order: f64 = order.trim().parse().map_err(|e| format!("order: {e}"))?;
    let amp: f64 = amp.trim().parse().map_err(|e| format!("amplitude: {e}"))?;
    Ok((order, amp))
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.rpm <= 0.0 || args.end_rpm.is_some_and(|r| r <= 0.0) {
        bail!("shaft speed must be positive");
    }

    let mut recording = SyntheticRecording::nominal(args.rpm)
        .with_ramp(args.rpm, args.end_rpm.unwrap_or(args.rpm))
        .with_duration(args.duration);
    recording.sample_rate_hz = args.rate;
    recording.noise_std = args.noise;
    recording.seed = args.seed;
    for (order, amp) in &args.fault {
        recording = recording.with_fault(*order, *amp);
    }
    if let Some(ppr) = args.pulses {
        recording = recording.with_pulses(ppr);
    }

    let table = recording.generate()?;
    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            write_table(&table, BufWriter::new(file))?;
            eprintln!(
                "Wrote {} rows ({:.1}s, {:.0}->{:.0} rpm) to {}",
                table.row_count(),
                recording.duration_s,
                recording.start_rpm,
                recording.end_rpm,
                path.display()
            );
        }
        None => write_table(&table, io::stdout().lock())?,
    }
    Ok(())
}
