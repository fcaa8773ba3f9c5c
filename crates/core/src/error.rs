use thiserror::Error;

/// Failures reported by injected platform capabilities.
///
/// None of these reach the user; the pipeline absorbs them and degrades the
/// payload instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Capability not available: {0}")]
    Unavailable(&'static str),

    #[error("Permission query failed: {0}")]
    PermissionQuery(String),

    #[error("Location acquisition failed: {0}")]
    Acquisition(String),

    #[error("Power status unavailable: {0}")]
    Power(String),
}

/// Reverse lookup failures. Absorbed by degrading to coordinates only.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Reverse lookup request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Reverse lookup returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Reverse lookup body could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Reverse lookup response has no address")]
    MissingAddress,
}

/// Transmission failures. The only error class that changes the terminal
/// outcome: it sends the visitor to the fallback destination.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to send payload to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid {field} URL '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
