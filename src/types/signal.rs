//! Raw acquisition rows and the synchronized dataset derived from them.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

// ============================================================================
// Raw acquisition
// ============================================================================

/// A parsed tabular recording: named columns of numeric values.
///
/// Column-major so channel lookups do not need to walk every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, columns: Vec<Vec<f64>>) -> Self {
        Self { headers, columns }
    }

    /// Number of rows (length of the shortest column).
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Column by exact header name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| self.columns.get(idx))
            .map(Vec::as_slice)
    }

    /// Drop rows whose first column (time) lies inside `[start, end)`.
    ///
    /// Used to fabricate dropouts when exercising gap detection.
    pub fn without_rows_between(&self, start: f64, end: f64) -> Self {
        let Some(time) = self.columns.first() else {
            return self.clone();
        };
        let keep: Vec<bool> = time.iter().map(|&t| t < start || t >= end).collect();
        let columns = self
            .columns
            .iter()
            .map(|col| {
                col.iter()
                    .zip(&keep)
                    .filter(|&(_, &k)| k)
                    .map(|(&v, _)| v)
                    .collect()
            })
            .collect();
        Self {
            headers: self.headers.clone(),
            columns,
        }
    }
}

/// How the rotational-reference channel encodes shaft motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Instantaneous speed in revolutions per minute.
    Rpm,
    /// Tachometer / encoder pulse train.
    Pulses { per_revolution: f64 },
}

/// One row of a sensor acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Seconds, strictly increasing within a recording
    pub timestamp: f64,
    /// One value per acceleration channel, in physical units
    pub accelerations: Vec<f64>,
    /// Reference channel value (RPM or pulse level)
    pub reference: f64,
}

/// All raw samples of one recording plus its channel conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecording {
    pub machine_id: String,
    pub channel_names: Vec<String>,
    pub reference: ReferenceKind,
    pub samples: Vec<RawSample>,
}

impl RawRecording {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn references(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.reference).collect()
    }

    /// Values of acceleration channel `idx` across all samples.
    pub fn channel(&self, idx: usize) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.accelerations.get(idx).copied().unwrap_or(f64::NAN))
            .collect()
    }
}

// ============================================================================
// Synchronized dataset
// ============================================================================

/// Resampling base of a synchronized dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncDomain {
    /// Equally spaced in shaft angle.
    Angle { samples_per_revolution: usize },
    /// Equally spaced in time; speed kept as a side channel.
    Time { sample_rate_hz: f64 },
}

impl SyncDomain {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Angle { .. } => "angle",
            Self::Time { .. } => "time",
        }
    }
}

/// Uniformly resampled acceleration channels with their speed curve.
///
/// Invariants (enforced by [`SynchronizedDataset::new`]): non-empty, all
/// series of equal length, speed strictly positive everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedDataset {
    pub machine_id: String,
    pub domain: SyncDomain,
    pub channel_names: Vec<String>,
    /// Seconds, one per resampled point
    pub timestamps: Vec<f64>,
    /// Smoothed instantaneous speed (RPM), one per resampled point
    pub speed_rpm: Vec<f64>,
    /// `channels[c][i]` is channel `c` at point `i`
    pub channels: Vec<Vec<f64>>,
}

impl SynchronizedDataset {
    pub fn new(
        machine_id: String,
        domain: SyncDomain,
        channel_names: Vec<String>,
        timestamps: Vec<f64>,
        speed_rpm: Vec<f64>,
        channels: Vec<Vec<f64>>,
    ) -> AnalysisResult<Self> {
        if timestamps.is_empty() {
            return Err(AnalysisError::malformed("synchronized dataset is empty"));
        }
        if speed_rpm.len() != timestamps.len() {
            return Err(AnalysisError::malformed(format!(
                "speed curve length {} differs from {} timestamps",
                speed_rpm.len(),
                timestamps.len()
            )));
        }
        if channels.is_empty() || channels.len() != channel_names.len() {
            return Err(AnalysisError::malformed(
                "synchronized dataset needs one named series per acceleration channel",
            ));
        }
        if let Some((name, _)) = channel_names
            .iter()
            .zip(&channels)
            .find(|(_, c)| c.len() != timestamps.len())
        {
            return Err(AnalysisError::malformed(format!(
                "channel '{name}' length differs from timestamps"
            )));
        }
        if let Some(i) = speed_rpm.iter().position(|&s| !(s > 0.0 && s.is_finite())) {
            return Err(AnalysisError::malformed(format!(
                "non-positive shaft speed {:.3} rpm at t={:.6}s",
                speed_rpm[i], timestamps[i]
            )));
        }

        Ok(Self {
            machine_id,
            domain,
            channel_names,
            timestamps,
            speed_rpm,
            channels,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Channel by name, or the first channel when `name` is `None`.
    pub fn channel(&self, name: Option<&str>) -> Option<&[f64]> {
        match name {
            None => self.channels.first().map(Vec::as_slice),
            Some(n) => self
                .channel_names
                .iter()
                .position(|c| c == n)
                .and_then(|idx| self.channels.get(idx))
                .map(Vec::as_slice),
        }
    }

    pub fn mean_speed_rpm(&self) -> f64 {
        self.speed_rpm.iter().sum::<f64>() / self.speed_rpm.len() as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(speed: Vec<f64>) -> AnalysisResult<SynchronizedDataset> {
        let n = speed.len();
        SynchronizedDataset::new(
            "M1".into(),
            SyncDomain::Angle { samples_per_revolution: 4 },
            vec!["acc".into()],
            (0..n).map(|i| i as f64 * 0.01).collect(),
            speed,
            vec![vec![0.0; n]],
        )
    }

    #[test]
    fn test_dataset_rejects_stalled_shaft() {
        let err = dataset(vec![1800.0, 0.0, 1800.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedInput(_)));
    }

    #[test]
    fn test_dataset_rejects_empty() {
        assert!(dataset(Vec::new()).is_err());
    }

    #[test]
    fn test_dataset_channel_lookup() {
        let ds = dataset(vec![1800.0; 5]).unwrap();
        assert_eq!(ds.len(), 5);
        assert!(ds.channel(None).is_some());
        assert!(ds.channel(Some("acc")).is_some());
        assert!(ds.channel(Some("missing")).is_none());
        assert!((ds.mean_speed_rpm() - 1800.0).abs() < 1e-12);
    }

    #[test]
    fn test_table_drop_rows() {
        let table = RawTable::new(
            vec!["time".into(), "acc".into()],
            vec![vec![0.0, 1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0, 8.0]],
        );
        let cut = table.without_rows_between(1.0, 3.0);
        assert_eq!(cut.row_count(), 2);
        assert_eq!(cut.column("acc"), Some(&[5.0, 8.0][..]));
    }
}
