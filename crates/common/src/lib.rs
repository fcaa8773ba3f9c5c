//! Shared data model for the beacon pipeline
//!
//! This crate holds the records that flow between the pipeline stages in
//! `beacon-core` and end up on the wire: the telemetry snapshot, the optional
//! location enrichment and the flattened payload that merges the two.

pub mod location;
pub mod payload;
pub mod snapshot;

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use location::{Coordinates, LocationEnrichment};
pub use payload::Payload;
pub use snapshot::{
    BATTERY_ERROR_MESSAGE, ConnectionInfo, DisplayResolution, PluginDescriptor, PowerReading,
    TelemetrySnapshot,
};

/// Sentinel written in place of a signal the platform could not provide.
pub const UNKNOWN: &str = "unknown";

/// A best-effort reading of a single environment signal.
///
/// `Unknown` serializes as the string `"unknown"` so the payload keeps the
/// same shape whatever the platform supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reading<T> {
    Known(T),
    #[default]
    Unknown,
}

impl<T> Reading<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known(_))
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reading::Unknown, Reading::Known)
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Known(value) => value.serialize(serializer),
            Reading::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

/// The platform's recorded geolocation permission decision.
///
/// Derived fresh on every trigger; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    /// The user already allowed location access
    Granted,
    /// The user has not decided yet
    #[serde(alias = "prompt-needed")]
    Prompt,
    /// The user refused location access
    Denied,
    /// The platform has no geolocation capability
    Unsupported,
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsentState::Granted => "granted",
            ConsentState::Prompt => "prompt",
            ConsentState::Denied => "denied",
            ConsentState::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

impl FromStr for ConsentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(ConsentState::Granted),
            "prompt" | "prompt-needed" => Ok(ConsentState::Prompt),
            "denied" => Ok(ConsentState::Denied),
            "unsupported" => Ok(ConsentState::Unsupported),
            other => Err(format!(
                "Unknown consent state '{other}' (expected granted, prompt, denied or unsupported)"
            )),
        }
    }
}
