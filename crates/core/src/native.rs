//! Native platform adapters for running the pipeline from a terminal.

use beacon_common::{ConsentState, Coordinates, DisplayResolution, Reading};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use sysinfo::System;
use tracing::debug;

use crate::config::{BeaconConfig, DisplayConfig};
use crate::error::PlatformError;
use crate::platform::{
    EnvironmentProbe, LocationProvider, Navigator, PermissionQuery, Platform, PowerSource,
    PowerStatus,
};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Host introspection through sysinfo and the process environment.
///
/// Values are read once at construction so every snapshot taken from the
/// same probe agrees.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    display: Option<DisplayConfig>,
    language: Option<String>,
    platform: Option<String>,
    cpu_cores: Option<usize>,
    memory_gib: Option<f64>,
}

impl SystemProbe {
    pub fn detect(display: Option<DisplayConfig>) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let total_memory = sys.total_memory();

        let probe = Self {
            display,
            language: locale_from_env(),
            platform: System::name().map(|name| format!("{name} {}", std::env::consts::ARCH)),
            cpu_cores: std::thread::available_parallelism()
                .ok()
                .map(|cores| cores.get()),
            memory_gib: (total_memory > 0)
                .then(|| ((total_memory as f64 / BYTES_PER_GIB) * 100.0).round() / 100.0),
        };
        debug!(?probe, "Detected host environment.");
        probe
    }
}

impl EnvironmentProbe for SystemProbe {
    fn screen_resolution(&self) -> Reading<DisplayResolution> {
        self.display.map(|display| display.resolution()).into()
    }

    fn device_pixel_ratio(&self) -> Reading<f64> {
        self.display.and_then(|display| display.pixel_ratio).into()
    }

    fn language(&self) -> Reading<String> {
        self.language.clone().into()
    }

    fn platform(&self) -> Reading<String> {
        self.platform.clone().into()
    }

    fn cpu_cores(&self) -> Reading<usize> {
        self.cpu_cores.into()
    }

    fn memory(&self) -> Reading<f64> {
        self.memory_gib.into()
    }
}

fn locale_from_env() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|value| language_tag(&value))
}

/// Turn a POSIX locale (`en_US.UTF-8`, `de_DE@euro`) into a language tag
/// (`en-US`). `C` and `POSIX` carry no language.
fn language_tag(locale: &str) -> Option<String> {
    let base = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

/// Power status from the system battery.
#[derive(Debug, Clone, Copy)]
pub struct BatteryPower {
    supported: bool,
}

impl BatteryPower {
    /// A host without any battery device has no power-status capability.
    /// A battery subsystem that errors still counts as present; its reads
    /// then reject.
    pub fn detect() -> Self {
        let supported = match battery::Manager::new() {
            Ok(manager) => match manager.batteries() {
                Ok(mut batteries) => batteries.next().is_some(),
                Err(_) => true,
            },
            Err(_) => true,
        };
        debug!(supported, "Detected power status capability.");
        Self { supported }
    }

    fn read() -> Result<PowerStatus, PlatformError> {
        let manager =
            battery::Manager::new().map_err(|err| PlatformError::Power(err.to_string()))?;
        let mut batteries = manager
            .batteries()
            .map_err(|err| PlatformError::Power(err.to_string()))?;
        let device = batteries
            .next()
            .ok_or_else(|| PlatformError::Power("no battery present".to_string()))?
            .map_err(|err| PlatformError::Power(err.to_string()))?;

        Ok(PowerStatus {
            level: f64::from(device.state_of_charge().value),
            charging: matches!(
                device.state(),
                battery::State::Charging | battery::State::Full
            ),
        })
    }
}

impl PowerSource for BatteryPower {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn status(&self) -> BoxFuture<'_, Result<PowerStatus, PlatformError>> {
        let status = Self::read();
        async move { status }.boxed()
    }
}

/// Permission state taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredPermission(pub ConsentState);

impl PermissionQuery for ConfiguredPermission {
    fn query_geolocation(&self) -> BoxFuture<'_, Result<ConsentState, PlatformError>> {
        let state = self.0;
        async move { Ok(state) }.boxed()
    }
}

/// A fixed position fix. Without one the host has no location capability.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredLocation(pub Option<Coordinates>);

impl LocationProvider for ConfiguredLocation {
    fn is_supported(&self) -> bool {
        self.0.is_some()
    }

    fn current_position(&self) -> BoxFuture<'_, Result<Coordinates, PlatformError>> {
        let fix = self.0.ok_or(PlatformError::Unavailable("geolocation"));
        async move { fix }.boxed()
    }
}

/// Assemble the native capability set for `config`.
pub fn platform(config: &BeaconConfig, navigator: Arc<dyn Navigator>) -> Platform {
    Platform {
        permissions: Arc::new(ConfiguredPermission(config.permission)),
        location: Arc::new(ConfiguredLocation(config.location.map(Coordinates::from))),
        power: Arc::new(BatteryPower::detect()),
        environment: Arc::new(SystemProbe::detect(config.display)),
        navigator,
    }
}
