//! Device and environment telemetry snapshot.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::Reading;

/// Error marker written when the power-status acquisition rejects.
pub const BATTERY_ERROR_MESSAGE: &str = "Could not retrieve battery status.";

/// Screen dimensions, serialized as `"WIDTHxHEIGHT"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayResolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for DisplayResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Serialize for DisplayResolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An installed plugin, identified by display name and file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub filename: String,
}

/// Network connection characteristics. Each half is independently unknown.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConnectionInfo {
    #[serde(rename = "type")]
    pub kind: Reading<String>,
    /// Downlink estimate in Mbit/s
    pub downlink: Reading<f64>,
}

/// Result of the power-status acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PowerReading {
    Status {
        /// Charge level as a percentage in `0.0..=100.0`
        level: f64,
        charging: bool,
    },
    Error { error: String },
}

impl PowerReading {
    pub fn status(fraction: f64, charging: bool) -> Self {
        PowerReading::Status {
            level: fraction.clamp(0.0, 1.0) * 100.0,
            charging,
        }
    }

    pub fn acquisition_failed() -> Self {
        PowerReading::Error {
            error: BATTERY_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PowerReading::Error { .. })
    }
}

/// Best-effort device fingerprint assembled once per send attempt.
///
/// Capabilities the platform lacks show up as [`Reading::Unknown`] rather
/// than being dropped, except `battery` which is omitted entirely when the
/// platform has no power-status capability at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub screen_resolution: Reading<DisplayResolution>,
    pub device_pixel_ratio: Reading<f64>,
    pub language: Reading<String>,
    pub platform: Reading<String>,
    pub plugins: Vec<PluginDescriptor>,
    pub cpu_cores: Reading<usize>,
    /// Approximate memory size in GiB
    pub memory: Reading<f64>,
    pub connection: ConnectionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<PowerReading>,
}
