//! Order spectrogram matrix.

use serde::{Deserialize, Serialize};

/// Output scale of spectrogram cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrogramScale {
    /// Squared amplitude
    Energy,
    /// Amplitude (square root of energy)
    #[default]
    Magnitude,
    /// 10·log10(energy), floored
    Decibel,
}

impl SpectrogramScale {
    /// Convert an energy value into this scale. `floor` replaces numerically
    /// zero energies before the logarithm.
    pub fn from_energy(self, energy: f64, floor: f64) -> f64 {
        match self {
            Self::Energy => energy,
            Self::Magnitude => energy.sqrt(),
            Self::Decibel => 10.0 * energy.max(floor).log10(),
        }
    }

    /// Inverse of [`Self::from_energy`] (up to the floor for decibels).
    pub fn to_energy(self, value: f64) -> f64 {
        match self {
            Self::Energy => value,
            Self::Magnitude => value * value,
            Self::Decibel => 10f64.powf(value / 10.0),
        }
    }
}

/// What labels the spectrogram columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAxis {
    /// Mean timestamp of each window (seconds)
    Time,
    /// Mean shaft speed of each window (RPM)
    #[default]
    Speed,
}

/// Energy across rotational orders, one column per analysis window.
///
/// `values[o][s]` is order bin `o` at step `s`. Every row has `steps.len()`
/// entries; the order grid is shared by all columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpectrogram {
    /// Order bin centers, strictly increasing
    pub order_bins: Vec<f64>,
    /// Column labels on the configured axis
    pub steps: Vec<f64>,
    pub axis: StepAxis,
    /// Mean timestamp of each column (seconds)
    pub step_times: Vec<f64>,
    /// Mean shaft speed of each column (RPM)
    pub step_speeds: Vec<f64>,
    pub scale: SpectrogramScale,
    pub values: Vec<Vec<f64>>,
}

impl OrderSpectrogram {
    pub fn n_orders(&self) -> usize {
        self.order_bins.len()
    }

    pub fn n_steps(&self) -> usize {
        self.steps.len()
    }

    /// True when every order row has one value per step.
    pub fn is_rectangular(&self) -> bool {
        self.values.len() == self.order_bins.len()
            && self.values.iter().all(|row| row.len() == self.steps.len())
    }

    /// Energy at `(order_idx, step_idx)`, independent of the output scale.
    pub fn energy(&self, order_idx: usize, step_idx: usize) -> f64 {
        self.scale.to_energy(self.values[order_idx][step_idx])
    }

    /// Energy averaged over all columns, one value per order bin.
    pub fn mean_energy_spectrum(&self) -> Vec<f64> {
        let n_steps = self.n_steps().max(1) as f64;
        (0..self.n_orders())
            .map(|o| (0..self.n_steps()).map(|s| self.energy(o, s)).sum::<f64>() / n_steps)
            .collect()
    }

    /// Order bin center with the largest time-averaged energy.
    pub fn peak_order(&self) -> Option<f64> {
        self.mean_energy_spectrum()
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .and_then(|(idx, _)| self.order_bins.get(idx).copied())
    }

    /// Index of the bin whose center is closest to `order`.
    pub fn nearest_bin(&self, order: f64) -> Option<usize> {
        self.order_bins
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - order)
                    .abs()
                    .partial_cmp(&(*b - order).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_round_trip_values() {
        for scale in [SpectrogramScale::Energy, SpectrogramScale::Magnitude, SpectrogramScale::Decibel] {
            let v = scale.from_energy(0.25, 1e-12);
            assert!((scale.to_energy(v) - 0.25).abs() < 1e-12, "{scale:?}");
        }
    }

    #[test]
    fn test_decibel_floor_avoids_infinity() {
        let db = SpectrogramScale::Decibel.from_energy(0.0, 1e-12);
        assert!((db - -120.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_order_and_nearest_bin() {
        let spec = OrderSpectrogram {
            order_bins: vec![0.0, 1.0, 2.0],
            steps: vec![0.0, 1.0],
            axis: StepAxis::Time,
            step_times: vec![0.0, 1.0],
            step_speeds: vec![1800.0, 1800.0],
            scale: SpectrogramScale::Energy,
            values: vec![vec![0.0, 0.0], vec![1.0, 3.0], vec![0.5, 0.5]],
        };
        assert!(spec.is_rectangular());
        assert_eq!(spec.peak_order(), Some(1.0));
        assert_eq!(spec.nearest_bin(1.4), Some(1));
        assert_eq!(spec.mean_energy_spectrum()[1], 2.0);
    }
}
