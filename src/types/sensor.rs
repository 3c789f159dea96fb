//! Sensor record types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single GPS fix reported by a device.
///
/// Devices may attach extra fields (timestamps, accuracy); only the
/// coordinates are read back during consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
}

/// Inertial sensor that produced a sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

impl SensorKind {
    pub const ALL: [Self; 2] = [Self::Accelerometer, Self::Gyroscope];

    /// Parse the `type` field of an inertial payload.
    pub fn from_type_field(value: &str) -> Option<Self> {
        match value {
            "accelerometer" => Some(Self::Accelerometer),
            "gyroscope" => Some(Self::Gyroscope),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accelerometer => "accelerometer",
            Self::Gyroscope => "gyroscope",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One triaxial accelerometer or gyroscope reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl InertialSample {
    /// Largest of the three axis readings (signed, as reported).
    pub fn peak_axis(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }
}

/// Artifact kind acknowledged back to the uploading device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Gps,
    Accelerometer,
    Gyroscope,
    Image,
}

impl From<SensorKind> for ArtifactKind {
    fn from(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Accelerometer => Self::Accelerometer,
            SensorKind::Gyroscope => Self::Gyroscope,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gps => "gps",
            Self::Accelerometer => "accelerometer",
            Self::Gyroscope => "gyroscope",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}
