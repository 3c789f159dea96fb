//! Severity classification
//!
//! Each sample is reduced to the largest of its three axis readings, the
//! stream to the largest of those, and the accelerometer and gyroscope peaks
//! to their maximum. Thresholds are strict lower bounds: a peak exactly on a
//! threshold falls into the lower tier.

use crate::config::defaults::{MODERATE_PEAK_THRESHOLD, SEVERE_PEAK_THRESHOLD};
use crate::types::{InertialSample, SensorKind, SeverityTier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// A stream had no samples, so its peak is undefined.
    #[error("no readable {0} samples")]
    EmptyStream(SensorKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityClassifier {
    /// Peaks strictly above this are Severe
    pub severe_above: f64,
    /// Peaks strictly above this (and not Severe) are Moderate
    pub moderate_above: f64,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self {
            severe_above: SEVERE_PEAK_THRESHOLD,
            moderate_above: MODERATE_PEAK_THRESHOLD,
        }
    }
}

impl SeverityClassifier {
    pub const fn new(severe_above: f64, moderate_above: f64) -> Self {
        Self {
            severe_above,
            moderate_above,
        }
    }

    /// Largest axis reading across a stream, `None` for an empty stream.
    pub fn stream_peak(samples: &[InertialSample]) -> Option<f64> {
        samples
            .iter()
            .map(InertialSample::peak_axis)
            .reduce(f64::max)
    }

    /// Combined peak of both streams.
    pub fn peak(
        accelerometer: &[InertialSample],
        gyroscope: &[InertialSample],
    ) -> Result<f64, ClassifyError> {
        let acc = Self::stream_peak(accelerometer)
            .ok_or(ClassifyError::EmptyStream(SensorKind::Accelerometer))?;
        let gyro = Self::stream_peak(gyroscope)
            .ok_or(ClassifyError::EmptyStream(SensorKind::Gyroscope))?;
        Ok(acc.max(gyro))
    }

    pub fn tier_for(&self, peak: f64) -> SeverityTier {
        if peak > self.severe_above {
            SeverityTier::Severe
        } else if peak > self.moderate_above {
            SeverityTier::Moderate
        } else {
            SeverityTier::Minor
        }
    }

    pub fn classify(
        &self,
        accelerometer: &[InertialSample],
        gyroscope: &[InertialSample],
    ) -> Result<SeverityTier, ClassifyError> {
        Self::peak(accelerometer, gyroscope).map(|peak| self.tier_for(peak))
    }
}
