//! Order spectrogram engine
//!
//! Slides an overlapping window over a synchronized channel, takes the energy
//! spectrum of each window and maps FFT bins onto a fixed order grid. On the
//! angle grid, bin `k` of an `N`-point transform is order `k·spr/N` for every
//! window. On the time grid the conversion uses the window's mean speed.

use tracing::debug;

use super::fft::FftProcessor;
use crate::config::SpectrogramConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{OrderSpectrogram, StepAxis, SyncDomain, SynchronizedDataset};

/// Computes [`OrderSpectrogram`]s with fixed windowing parameters.
pub struct OrderSpectrogramEngine {
    config: SpectrogramConfig,
}

impl OrderSpectrogramEngine {
    pub fn new(config: SpectrogramConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Window length in synchronized samples for `dataset`.
    pub fn window_len(&self, dataset: &SynchronizedDataset) -> usize {
        if let Some(n) = self.config.window_samples {
            return n;
        }
        let samples_per_rev = match dataset.domain {
            SyncDomain::Angle { samples_per_revolution } => samples_per_revolution as f64,
            SyncDomain::Time { sample_rate_hz } => sample_rate_hz * 60.0 / dataset.mean_speed_rpm(),
        };
        (self.config.window_revolutions * samples_per_rev).round() as usize
    }

    /// Order bin centers `0, 1/b, 2/b, …, max_order`.
    pub fn order_bins(&self) -> Vec<f64> {
        let per_order = self.config.bins_per_order as f64;
        let count = (self.config.max_order * per_order + 1e-9).floor() as usize + 1;
        (0..count).map(|j| j as f64 / per_order).collect()
    }

    pub fn compute(&self, dataset: &SynchronizedDataset) -> AnalysisResult<OrderSpectrogram> {
        let cfg = &self.config;
        if !(0.0..1.0).contains(&cfg.overlap) {
            return Err(AnalysisError::InvalidConfig(format!(
                "overlap {:.3} outside [0, 1)",
                cfg.overlap
            )));
        }
        if cfg.bins_per_order == 0 || !(cfg.max_order > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "max_order and bins_per_order must be positive".to_string(),
            ));
        }

        let signal = dataset.channel(cfg.channel.as_deref()).ok_or_else(|| {
            AnalysisError::malformed(format!(
                "channel '{}' not present in dataset",
                cfg.channel.as_deref().unwrap_or_default()
            ))
        })?;

        let window = self.window_len(dataset);
        if window < 8 {
            return Err(AnalysisError::InvalidConfig(format!(
                "analysis window of {window} samples is too short"
            )));
        }
        if signal.len() < window {
            return Err(AnalysisError::InsufficientData {
                needed: window,
                available: signal.len(),
            });
        }

        let hop = ((window as f64 * (1.0 - cfg.overlap)).round() as usize).max(1);
        let processor = FftProcessor::new(window)?;
        let nfft = processor.size() as f64;
        let bins = self.order_bins();

        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut step_times = Vec::new();
        let mut step_speeds = Vec::new();

        let mut start = 0usize;
        while start + window <= signal.len() {
            let end = start + window;
            let mean_rpm = mean(&dataset.speed_rpm[start..end]);
            let order_per_bin = match dataset.domain {
                SyncDomain::Angle { samples_per_revolution } => samples_per_revolution as f64 / nfft,
                SyncDomain::Time { sample_rate_hz } => sample_rate_hz / nfft / (mean_rpm / 60.0),
            };
            let nyquist_order = order_per_bin * nfft / 2.0;
            if cfg.max_order > nyquist_order + 1e-9 {
                return Err(AnalysisError::InvalidConfig(format!(
                    "max_order {:.2} exceeds Nyquist order {:.2} of the synchronized signal",
                    cfg.max_order, nyquist_order
                )));
            }

            let energies = processor.energy_spectrum(&signal[start..end])?;
            columns.push(bin_orders(&energies, order_per_bin, &bins, cfg.bins_per_order));
            step_times.push(mean(&dataset.timestamps[start..end]));
            step_speeds.push(mean_rpm);
            start += hop;
        }

        let steps = match cfg.axis {
            StepAxis::Time => step_times.clone(),
            StepAxis::Speed => step_speeds.clone(),
        };

        let values: Vec<Vec<f64>> = (0..bins.len())
            .map(|o| {
                columns
                    .iter()
                    .map(|col| cfg.scale.from_energy(col[o], cfg.floor))
                    .collect()
            })
            .collect();

        debug!(
            machine_id = %dataset.machine_id,
            window,
            hop,
            nfft = processor.size(),
            steps = columns.len(),
            orders = bins.len(),
            "Computed order spectrogram"
        );

        Ok(OrderSpectrogram {
            order_bins: bins,
            steps,
            axis: cfg.axis,
            step_times,
            step_speeds,
            scale: cfg.scale,
            values,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

/// Keep the largest FFT-bin energy falling nearest each order-bin center.
/// Centers that receive no FFT bin are filled by linear interpolation of the
/// spectrum.
fn bin_orders(energies: &[f64], order_per_bin: f64, centers: &[f64], per_order: usize) -> Vec<f64> {
    let mut column = vec![0.0_f64; centers.len()];
    let mut hit = vec![false; centers.len()];
    let per_order = per_order as f64;

    for (k, &e) in energies.iter().enumerate() {
        let j = (k as f64 * order_per_bin * per_order).round() as usize;
        if j < column.len() {
            column[j] = if hit[j] { column[j].max(e) } else { e };
            hit[j] = true;
        }
    }

    for (j, &center) in centers.iter().enumerate() {
        if hit[j] {
            continue;
        }
        let pos = center / order_per_bin;
        let k0 = (pos.floor() as usize).min(energies.len() - 1);
        let k1 = (k0 + 1).min(energies.len() - 1);
        let frac = pos - k0 as f64;
        column[j] = energies[k0] + frac.clamp(0.0, 1.0) * (energies[k1] - energies[k0]);
    }
    column
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpectrogramScale;
    use std::f64::consts::PI;

    fn angle_dataset(revs: usize, order: f64, amplitude: f64) -> SynchronizedDataset {
        let spr = 64;
        let n = revs * spr;
        SynchronizedDataset::new(
            "M1".into(),
            SyncDomain::Angle { samples_per_revolution: spr },
            vec!["acc".into()],
            (0..n).map(|i| i as f64 / (spr as f64 * 30.0)).collect(),
            vec![1800.0; n],
            vec![(0..n)
                .map(|i| amplitude * (2.0 * PI * order * i as f64 / spr as f64).sin())
                .collect()],
        )
        .unwrap()
    }

    fn energy_config() -> SpectrogramConfig {
        SpectrogramConfig {
            scale: SpectrogramScale::Energy,
            ..Default::default()
        }
    }

    #[test]
    fn test_order_bins_grid() {
        let engine = OrderSpectrogramEngine::new(SpectrogramConfig::default());
        let bins = engine.order_bins();
        assert_eq!(bins.len(), 81);
        assert_eq!(bins[4], 1.0);
        assert_eq!(*bins.last().unwrap(), 20.0);
    }

    #[test]
    fn test_peak_lands_on_component_order() {
        let ds = angle_dataset(40, 3.0, 1.5);
        let spec = OrderSpectrogramEngine::new(energy_config()).compute(&ds).unwrap();
        assert!(spec.is_rectangular());
        assert_eq!(spec.peak_order(), Some(3.0));
        let idx = spec.nearest_bin(3.0).unwrap();
        let amp = spec.energy(idx, 0).sqrt();
        assert!((amp - 1.5).abs() < 0.05, "amplitude {amp}");
    }

    #[test]
    fn test_step_count_follows_overlap() {
        let ds = angle_dataset(40, 1.0, 1.0);
        // 512-sample windows, hop 256 over 2560 samples
        let spec = OrderSpectrogramEngine::new(energy_config()).compute(&ds).unwrap();
        assert_eq!(spec.n_steps(), 9);
        assert!(spec.steps.iter().all(|&s| (s - 1800.0).abs() < 1e-9));
    }

    #[test]
    fn test_short_dataset_is_insufficient() {
        let ds = angle_dataset(4, 1.0, 1.0);
        let err = OrderSpectrogramEngine::new(energy_config()).compute(&ds).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { needed: 512, available: 256 }));
    }

    #[test]
    fn test_max_order_above_nyquist_rejected() {
        let ds = angle_dataset(40, 1.0, 1.0);
        let engine = OrderSpectrogramEngine::new(SpectrogramConfig {
            max_order: 40.0,
            ..Default::default()
        });
        assert!(matches!(engine.compute(&ds), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_shared_center_keeps_peak() {
        let col = bin_orders(&[0.0, 1.0, 4.0, 1.0], 0.25, &[0.0, 0.5, 1.0], 2);
        assert_eq!(col, vec![0.0, 4.0, 1.0]);
    }

    #[test]
    fn test_interpolates_unhit_centers() {
        // One FFT bin per order, two centers per order
        let energies = vec![0.0, 2.0, 4.0];
        let centers = vec![0.0, 0.5, 1.0, 1.5, 2.0];
        let col = bin_orders(&energies, 1.0, &centers, 2);
        assert_eq!(col, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
