//! Signal synchronization: resample raw acceleration onto a shaft-angle grid
//!
//! The rotational reference is turned into a smoothed speed curve and a
//! cumulative shaft angle. Accelerations are then interpolated onto points
//! equally spaced in angle, so one order maps to one bin regardless of speed.
//! When the pulse train is too irregular to phase-lock against, the
//! synchronizer falls back to a uniform time grid and keeps speed as a
//! side channel.

use tracing::{debug, info, warn};

use crate::config::{DomainPreference, SyncConfig};
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{RawRecording, ReferenceKind, SyncDomain, SynchronizedDataset};

/// Edges of a tachometer pulse train and the speed derived from them.
#[derive(Debug, Clone)]
struct PulseTrain {
    /// Interpolated rising-edge times (seconds)
    edges: Vec<f64>,
    per_revolution: f64,
    /// Interval ratio beyond the configured tolerance somewhere in the train
    ambiguous: bool,
}

impl PulseTrain {
    fn revolutions(&self) -> f64 {
        (self.edges.len().saturating_sub(1)) as f64 / self.per_revolution
    }
}

/// Resamples a [`RawRecording`] against its rotational reference.
pub struct SignalSynchronizer {
    config: SyncConfig,
}

impl SignalSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Produce a [`SynchronizedDataset`] on the angle grid, or on the time
    /// grid when configured or when the pulse train is ambiguous.
    pub fn synchronize(&self, recording: &RawRecording) -> AnalysisResult<SynchronizedDataset> {
        self.validate(recording)?;

        let times = recording.timestamps();
        let median_dt = median(&intervals(&times));
        self.check_gaps(&times, median_dt)?;

        let references = recording.references();
        let pulses = match recording.reference {
            ReferenceKind::Rpm => None,
            ReferenceKind::Pulses { per_revolution } => {
                Some(self.detect_pulses(&times, &references, per_revolution)?)
            }
        };

        let raw_speed = match &pulses {
            None => references,
            Some(train) => speed_from_pulses(train, &times),
        };
        // Smoothing must not hide a stalled or reversing shaft
        reject_non_positive_speed(&raw_speed, &times)?;
        let speed = moving_average(&raw_speed, self.smoothing_half_width(median_dt));
        reject_non_positive_speed(&speed, &times)?;

        let revolutions = match &pulses {
            Some(train) => train.revolutions(),
            None => cumulative_revolutions(&times, &speed).last().copied().unwrap_or(0.0),
        };
        if revolutions < self.config.min_revolutions {
            return Err(AnalysisError::malformed(format!(
                "recording covers {revolutions:.2} shaft revolutions, need at least {:.2}",
                self.config.min_revolutions
            )));
        }

        let ambiguous = pulses.as_ref().is_some_and(|p| p.ambiguous);
        let use_angle = match self.config.domain {
            DomainPreference::Time => false,
            DomainPreference::Angle if ambiguous => {
                return Err(AnalysisError::malformed(
                    "reference pulse train is ambiguous, cannot build an angle grid",
                ));
            }
            DomainPreference::Angle => true,
            DomainPreference::Auto => {
                if ambiguous {
                    warn!(
                        machine_id = %recording.machine_id,
                        "Irregular reference pulses, falling back to time-domain resampling"
                    );
                }
                !ambiguous
            }
        };

        let channels: Vec<Vec<f64>> = (0..recording.channel_names.len())
            .map(|c| recording.channel(c))
            .collect();

        let (domain, grid_times, grid_speed, grid_channels) = if use_angle {
            let angles = match &pulses {
                Some(train) => angles_from_pulses(train, &times),
                None => cumulative_revolutions(&times, &speed),
            };
            // Pulse mode is trimmed to [first edge, last edge]
            let end = match &pulses {
                Some(train) => train.revolutions(),
                None => angles.last().copied().unwrap_or(0.0),
            };
            let spr = self.config.samples_per_revolution;
            let grid = angle_grid(0.0, end, spr);
            let (t, s, ch) = resample(&angles, &grid, &times, &speed, &channels);
            (SyncDomain::Angle { samples_per_revolution: spr }, t, s, ch)
        } else {
            let rate = self.config.time_sample_rate_hz.unwrap_or(1.0 / median_dt);
            let grid = time_grid(times[0], times[times.len() - 1], rate);
            let (t, s, ch) = resample(&times, &grid, &times, &speed, &channels);
            (SyncDomain::Time { sample_rate_hz: rate }, t, s, ch)
        };

        debug!(
            machine_id = %recording.machine_id,
            raw_samples = recording.len(),
            resampled = grid_times.len(),
            revolutions,
            "Resampled recording"
        );

        let dataset = SynchronizedDataset::new(
            recording.machine_id.clone(),
            domain,
            recording.channel_names.clone(),
            grid_times,
            grid_speed,
            grid_channels,
        )?;

        info!(
            machine_id = %dataset.machine_id,
            domain = dataset.domain.label(),
            points = dataset.len(),
            mean_rpm = dataset.mean_speed_rpm(),
            "Synchronized recording"
        );

        Ok(dataset)
    }

    // ------------------------------------------------------------------------
    // Input checks
    // ------------------------------------------------------------------------

    fn validate(&self, recording: &RawRecording) -> AnalysisResult<()> {
        if recording.channel_names.is_empty() {
            return Err(AnalysisError::malformed("recording has no acceleration channels"));
        }
        if recording.len() < self.config.min_samples {
            return Err(AnalysisError::malformed(format!(
                "recording has {} rows, need at least {}",
                recording.len(),
                self.config.min_samples
            )));
        }

        let n_channels = recording.channel_names.len();
        for (i, sample) in recording.samples.iter().enumerate() {
            if sample.accelerations.len() != n_channels {
                return Err(AnalysisError::malformed(format!(
                    "row {i} has {} acceleration values, expected {n_channels}",
                    sample.accelerations.len()
                )));
            }
            if !sample.timestamp.is_finite()
                || !sample.reference.is_finite()
                || sample.accelerations.iter().any(|a| !a.is_finite())
            {
                return Err(AnalysisError::malformed(format!("row {i} contains a non-finite value")));
            }
        }

        if let Some(i) = recording
            .samples
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(AnalysisError::malformed(format!(
                "timestamps not strictly increasing at row {}",
                i + 1
            )));
        }
        Ok(())
    }

    fn check_gaps(&self, times: &[f64], median_dt: f64) -> AnalysisResult<()> {
        let mut threshold = median_dt * self.config.gap_factor;
        if let Some(max_gap) = self.config.max_gap_seconds {
            threshold = threshold.min(max_gap);
        }
        for w in times.windows(2) {
            let duration = w[1] - w[0];
            if duration > threshold {
                return Err(AnalysisError::SignalGap {
                    at: w[0],
                    duration,
                    threshold,
                });
            }
        }
        Ok(())
    }

    fn smoothing_half_width(&self, median_dt: f64) -> usize {
        if median_dt <= 0.0 {
            return 0;
        }
        (self.config.speed_smoothing_seconds / (2.0 * median_dt)).round() as usize
    }

    // ------------------------------------------------------------------------
    // Pulse reference
    // ------------------------------------------------------------------------

    fn detect_pulses(
        &self,
        times: &[f64],
        levels: &[f64],
        per_revolution: f64,
    ) -> AnalysisResult<PulseTrain> {
        if !(per_revolution > 0.0) {
            return Err(AnalysisError::malformed("pulses per revolution must be positive"));
        }
        let (lo, hi) = levels
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !(hi - lo > f64::EPSILON * hi.abs().max(1.0)) {
            return Err(AnalysisError::malformed("reference channel is flat, no pulses found"));
        }
        let threshold = (lo + hi) / 2.0;

        let edges: Vec<f64> = (1..levels.len())
            .filter(|&i| levels[i - 1] < threshold && levels[i] >= threshold)
            .map(|i| {
                let frac = (threshold - levels[i - 1]) / (levels[i] - levels[i - 1]);
                times[i - 1] + frac * (times[i] - times[i - 1])
            })
            .collect();

        if edges.len() < 2 {
            return Err(AnalysisError::malformed(format!(
                "reference channel has {} pulse edge(s), need at least 2",
                edges.len()
            )));
        }

        let r = self.config.max_pulse_interval_ratio;
        let gaps = intervals(&edges);
        let ambiguous = gaps.windows(2).any(|w| {
            let ratio = w[1] / w[0];
            !(ratio <= r && ratio >= 1.0 / r)
        });

        debug!(edges = edges.len(), ambiguous, "Detected reference pulses");

        Ok(PulseTrain {
            edges,
            per_revolution,
            ambiguous,
        })
    }
}

// ============================================================================
// Numeric helpers
// ============================================================================

fn intervals(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn reject_non_positive_speed(speed_rpm: &[f64], times: &[f64]) -> AnalysisResult<()> {
    match speed_rpm.iter().position(|&s| !(s > 0.0 && s.is_finite())) {
        Some(i) => Err(AnalysisError::malformed(format!(
            "non-positive shaft speed {:.3} rpm at t={:.6}s",
            speed_rpm[i], times[i]
        ))),
        None => Ok(()),
    }
}

/// Centered moving average with `half` samples either side; the window
/// shrinks at the ends.
fn moving_average(values: &[f64], half: usize) -> Vec<f64> {
    if half == 0 || values.len() < 2 {
        return values.to_vec();
    }
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for &v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Shaft revolutions since the first sample (trapezoid rule on rpm / 60).
fn cumulative_revolutions(times: &[f64], speed_rpm: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(times.len());
    let mut acc = 0.0;
    out.push(0.0);
    for i in 1..times.len() {
        acc += (speed_rpm[i] + speed_rpm[i - 1]) / 2.0 / 60.0 * (times[i] - times[i - 1]);
        out.push(acc);
    }
    out
}

/// Per-interval pulse speed, running median over five intervals, then
/// linearly interpolated onto `times` (held flat beyond the ends).
fn speed_from_pulses(train: &PulseTrain, times: &[f64]) -> Vec<f64> {
    let gaps = intervals(&train.edges);
    let rpm: Vec<f64> = gaps.iter().map(|d| 60.0 / (train.per_revolution * d)).collect();
    let mids: Vec<f64> = train.edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();

    let half = crate::config::defaults::PULSE_MEDIAN_INTERVALS / 2;
    let smoothed: Vec<f64> = (0..rpm.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(rpm.len());
            median(&rpm[lo..hi])
        })
        .collect();

    interpolate_series(&mids, &smoothed, times)
}

/// Shaft angle (revolutions since the first edge) at each sample time.
/// Samples outside the edge span extrapolate with the nearest interval.
fn angles_from_pulses(train: &PulseTrain, times: &[f64]) -> Vec<f64> {
    let edges = &train.edges;
    let last = edges.len() - 1;
    let mut k = 0usize;
    times
        .iter()
        .map(|&t| {
            while k + 1 < last && edges[k + 1] <= t {
                k += 1;
            }
            let pulses = k as f64 + (t - edges[k]) / (edges[k + 1] - edges[k]);
            pulses / train.per_revolution
        })
        .collect()
}

/// Piecewise-linear interpolation of `(xs, ys)` at `at`, holding end values.
fn interpolate_series(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    if xs.len() == 1 {
        return vec![ys[0]; at.len()];
    }
    let mut j = 0usize;
    at.iter()
        .map(|&x| {
            if x <= xs[0] {
                return ys[0];
            }
            if x >= xs[xs.len() - 1] {
                return ys[ys.len() - 1];
            }
            while j + 2 < xs.len() && xs[j + 1] < x {
                j += 1;
            }
            let frac = (x - xs[j]) / (xs[j + 1] - xs[j]);
            ys[j] + frac * (ys[j + 1] - ys[j])
        })
        .collect()
}

fn angle_grid(lo: f64, hi: f64, samples_per_revolution: usize) -> Vec<f64> {
    let spr = samples_per_revolution as f64;
    let first = (lo * spr - 1e-9).ceil().max(0.0) as usize;
    let last = (hi * spr + 1e-9).floor() as usize;
    (first..=last).map(|k| k as f64 / spr).collect()
}

fn time_grid(start: f64, end: f64, rate: f64) -> Vec<f64> {
    let n = ((end - start) * rate + 1e-9).floor() as usize + 1;
    (0..n).map(|k| start + k as f64 / rate).collect()
}

/// Interpolate time, speed and channels from the monotone `base` axis onto
/// `grid`. Grid points are clamped to the span of `base`.
fn resample(
    base: &[f64],
    grid: &[f64],
    times: &[f64],
    speed: &[f64],
    channels: &[Vec<f64>],
) -> (Vec<f64>, Vec<f64>, Vec<Vec<f64>>) {
    let t = interpolate_series(base, times, grid);
    let s = interpolate_series(base, speed, grid);
    let ch = channels
        .iter()
        .map(|c| interpolate_series(base, c, grid))
        .collect();
    (t, s, ch)
}

// ============================================================================
// Tests
// ============================================================================
