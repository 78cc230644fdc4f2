//! Seeded synthetic recordings for tests, demos and the `simulation` binary.
//!
//! Acceleration is a sum of sinusoids at fixed shaft orders plus Gaussian
//! noise, under a constant or linearly ramped shaft speed. The reference
//! column is either the speed itself (`rpm`) or a tachometer pulse train
//! (`tach`).

use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::RawTable;

/// Tach level while a pulse is high
const PULSE_HIGH: f64 = 5.0;
/// Fraction of each pulse period spent high
const PULSE_DUTY: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderComponent {
    pub order: f64,
    pub amplitude: f64,
    /// Radians
    #[serde(default)]
    pub phase: f64,
}

impl OrderComponent {
    pub fn new(order: f64, amplitude: f64) -> Self {
        Self {
            order,
            amplitude,
            phase: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceSignal {
    Rpm,
    Pulses { per_revolution: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRecording {
    pub sample_rate_hz: f64,
    pub duration_s: f64,
    pub start_rpm: f64,
    pub end_rpm: f64,
    pub components: Vec<OrderComponent>,
    pub noise_std: f64,
    pub reference: ReferenceSignal,
    pub seed: u64,
}

impl Default for SyntheticRecording {
    fn default() -> Self {
        Self::nominal(1800.0)
    }
}

impl SyntheticRecording {
    /// Ten seconds at constant speed, dominated by 1× and 2× orders.
    pub fn nominal(rpm: f64) -> Self {
        Self {
            sample_rate_hz: 5000.0,
            duration_s: 10.0,
            start_rpm: rpm,
            end_rpm: rpm,
            components: vec![OrderComponent::new(1.0, 1.0), OrderComponent::new(2.0, 0.5)],
            noise_std: 0.05,
            reference: ReferenceSignal::Rpm,
            seed: 42,
        }
    }

    /// Add a component at `order` (a fault signature).
    pub fn with_fault(mut self, order: f64, amplitude: f64) -> Self {
        self.components.push(OrderComponent::new(order, amplitude));
        self
    }

    pub fn with_ramp(mut self, start_rpm: f64, end_rpm: f64) -> Self {
        self.start_rpm = start_rpm;
        self.end_rpm = end_rpm;
        self
    }

    pub fn with_pulses(mut self, per_revolution: u32) -> Self {
        self.reference = ReferenceSignal::Pulses { per_revolution };
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_s = seconds;
        self
    }

    pub fn speed_at(&self, t: f64) -> f64 {
        self.start_rpm + (self.end_rpm - self.start_rpm) * t / self.duration_s
    }

    /// Shaft revolutions completed at time `t`.
    pub fn revolutions_at(&self, t: f64) -> f64 {
        let slope = (self.end_rpm - self.start_rpm) / self.duration_s;
        (self.start_rpm * t + slope * t * t / 2.0) / 60.0
    }

    /// Generate the table: `time`, `acc_x`, and `rpm` or `tach`.
    pub fn generate(&self) -> AnalysisResult<RawTable> {
        if !(self.sample_rate_hz > 0.0 && self.duration_s > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "sample rate and duration must be positive".to_string(),
            ));
        }
        if !(self.noise_std >= 0.0 && self.noise_std.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "noise_std must be finite and >= 0, got {}",
                self.noise_std
            )));
        }
        let noise = Normal::new(0.0, self.noise_std)
            .map_err(|e| AnalysisError::InvalidConfig(format!("noise_std: {e}")))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let n = (self.sample_rate_hz * self.duration_s).round() as usize;
        let mut time = Vec::with_capacity(n);
        let mut acc = Vec::with_capacity(n);
        let mut reference = Vec::with_capacity(n);

        for i in 0..n {
            let t = i as f64 / self.sample_rate_hz;
            let revs = self.revolutions_at(t);
            let signal: f64 = self
                .components
                .iter()
                .map(|c| c.amplitude * (2.0 * PI * c.order * revs + c.phase).sin())
                .sum();

            time.push(t);
            acc.push(signal + noise.sample(&mut rng));
            reference.push(match self.reference {
                ReferenceSignal::Rpm => self.speed_at(t),
                ReferenceSignal::Pulses { per_revolution } => {
                    if (revs * per_revolution as f64).fract() < PULSE_DUTY {
                        PULSE_HIGH
                    } else {
                        0.0
                    }
                }
            });
        }

        let ref_name = match self.reference {
            ReferenceSignal::Rpm => "rpm",
            ReferenceSignal::Pulses { .. } => "tach",
        };
        Ok(RawTable::new(
            vec!["time".into(), "acc_x".into(), ref_name.into()],
            vec![time, acc, reference],
        ))
    }
}
