//! Configuration for a beacon run.
//!
//! Values come from `~/.beacon/config.toml` (or an explicit path) and fall
//! back to built-in defaults; the CLI layers its flags on top.

use beacon_common::{ConsentState, Coordinates, DisplayResolution};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, DispatchError};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/track";
pub const DEFAULT_FALLBACK_URL: &str = "https://intelleva.app";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const CONFIG_DIR: &str = ".beacon";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeaconConfig {
    /// Collection endpoint the payload is posted to
    pub endpoint: String,
    /// Destination used only when transmission fails
    pub fallback_url: String,
    /// Reverse geocoding service base URL
    pub geocoder_url: String,
    /// Sent with every outbound request; public Nominatim instances reject
    /// anonymous clients
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Recorded geolocation permission reported to the pipeline
    pub permission: ConsentState,
    pub location: Option<LocationConfig>,
    pub display: Option<DisplayConfig>,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: format!("beacon/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            permission: ConsentState::Prompt,
            location: None,
            display: None,
        }
    }
}

/// Fixed position reported by the native location provider.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<LocationConfig> for Coordinates {
    fn from(value: LocationConfig) -> Self {
        Coordinates::new(value.latitude, value.longitude)
    }
}

/// Display metrics; a terminal has no screen to introspect.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub pixel_ratio: Option<f64>,
}

impl DisplayConfig {
    pub fn resolution(&self) -> DisplayResolution {
        DisplayResolution {
            width: self.width,
            height: self.height,
        }
    }
}

/// Get the default config path (~/.beacon/config.toml).
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

impl BeaconConfig {
    /// Load from `path` if given (it must exist), otherwise from the default
    /// location if present, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults.");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading config file.");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        self.fallback()?;
        self.geocoder()?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(location) = &self.location {
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(ConfigError::Invalid(format!(
                    "latitude {} is outside -90..=90",
                    location.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(ConfigError::Invalid(format!(
                    "longitude {} is outside -180..=180",
                    location.longitude
                )));
            }
        }
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        parse_url("endpoint", &self.endpoint)
    }

    pub fn fallback(&self) -> Result<Url, ConfigError> {
        parse_url("fallback", &self.fallback_url)
    }

    pub fn geocoder(&self) -> Result<Url, ConfigError> {
        parse_url("geocoder", &self.geocoder_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// HTTP client shared by the geocoder and the dispatcher.
    pub fn http_client(&self) -> Result<reqwest::Client, DispatchError> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.request_timeout())
            .build()
            .map_err(DispatchError::Client)
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}
