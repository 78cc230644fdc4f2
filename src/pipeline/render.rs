//! Render data: plain serializable shapes for an external charting layer.
//!
//! Time series are decimated by a fixed stride so a long recording never
//! ships more than `max_points` values per series. The spectrogram matrix is
//! passed through untouched.

use serde::{Deserialize, Serialize};

use crate::types::{OrderSpectrogram, SpectrogramScale, StepAxis, SynchronizedDataset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// Heatmap layout: `values[o][s]` is order `order_bins[o]` at `steps[s]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapData {
    pub order_bins: Vec<f64>,
    pub steps: Vec<f64>,
    pub axis: StepAxis,
    pub scale: SpectrogramScale,
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderData {
    pub machine_id: String,
    pub domain: String,
    /// Shared x axis of the time series (seconds)
    pub timestamps: Vec<f64>,
    pub speed_rpm: Vec<f64>,
    pub channels: Vec<Series>,
    pub heatmap: HeatmapData,
}

impl RenderData {
    pub fn build(dataset: &SynchronizedDataset, spectrogram: &OrderSpectrogram, max_points: usize) -> Self {
        let stride = decimation_stride(dataset.len(), max_points);
        Self {
            machine_id: dataset.machine_id.clone(),
            domain: dataset.domain.label().to_string(),
            timestamps: decimate(&dataset.timestamps, stride),
            speed_rpm: decimate(&dataset.speed_rpm, stride),
            channels: dataset
                .channel_names
                .iter()
                .zip(&dataset.channels)
                .map(|(name, values)| Series {
                    name: name.clone(),
                    values: decimate(values, stride),
                })
                .collect(),
            heatmap: HeatmapData {
                order_bins: spectrogram.order_bins.clone(),
                steps: spectrogram.steps.clone(),
                axis: spectrogram.axis,
                scale: spectrogram.scale,
                values: spectrogram.values.clone(),
            },
        }
    }
}

fn decimation_stride(len: usize, max_points: usize) -> usize {
    if max_points == 0 {
        return len.max(1);
    }
    len.div_ceil(max_points).max(1)
}

fn decimate(values: &[f64], stride: usize) -> Vec<f64> {
    values.iter().step_by(stride).copied().collect()
}
