//! Platform capabilities consumed by the pipeline.
//!
//! Every ambient query the pipeline makes goes through one of these traits so
//! that the whole flow can run against native adapters (see
//! [`crate::native`]) or scripted test doubles. Asynchronous capabilities
//! return boxed futures so they can be held as trait objects.

use beacon_common::{
    ConnectionInfo, ConsentState, Coordinates, DisplayResolution, PluginDescriptor, Reading,
};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use url::Url;

use crate::error::PlatformError;

/// Permission subsystem for the geolocation capability.
pub trait PermissionQuery: Send + Sync {
    fn query_geolocation(&self) -> BoxFuture<'_, Result<ConsentState, PlatformError>>;
}

/// Position fix acquisition.
pub trait LocationProvider: Send + Sync {
    /// Whether the platform exposes a location capability at all.
    fn is_supported(&self) -> bool;

    /// Request a single fix. On a first use this is what raises the native
    /// permission prompt, so it may fail because the user refused.
    fn current_position(&self) -> BoxFuture<'_, Result<Coordinates, PlatformError>>;
}

/// Raw power state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerStatus {
    /// Charge as a fraction in `0.0..=1.0`
    pub level: f64,
    pub charging: bool,
}

pub trait PowerSource: Send + Sync {
    fn is_supported(&self) -> bool;

    fn status(&self) -> BoxFuture<'_, Result<PowerStatus, PlatformError>>;
}

/// Synchronous environment introspection.
///
/// Each signal is read on its own; the defaults report the signal as unknown
/// so a probe only overrides what it can actually see.
pub trait EnvironmentProbe: Send + Sync {
    fn screen_resolution(&self) -> Reading<DisplayResolution> {
        Reading::Unknown
    }

    fn device_pixel_ratio(&self) -> Reading<f64> {
        Reading::Unknown
    }

    fn language(&self) -> Reading<String> {
        Reading::Unknown
    }

    fn platform(&self) -> Reading<String> {
        Reading::Unknown
    }

    fn plugins(&self) -> Vec<PluginDescriptor> {
        Vec::new()
    }

    fn cpu_cores(&self) -> Reading<usize> {
        Reading::Unknown
    }

    /// Approximate memory size in GiB
    fn memory(&self) -> Reading<f64> {
        Reading::Unknown
    }

    fn connection(&self) -> ConnectionInfo {
        ConnectionInfo::default()
    }
}

/// Terminal navigation of the visitor.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &Url);
}

/// The full capability set the pipeline is constructed with.
#[derive(Clone)]
pub struct Platform {
    pub permissions: Arc<dyn PermissionQuery>,
    pub location: Arc<dyn LocationProvider>,
    pub power: Arc<dyn PowerSource>,
    pub environment: Arc<dyn EnvironmentProbe>,
    pub navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("location_supported", &self.location.is_supported())
            .field("power_supported", &self.power.is_supported())
            .finish_non_exhaustive()
    }
}
