//! Telemetry snapshot collection.

use beacon_common::{PowerReading, TelemetrySnapshot};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::platform::{EnvironmentProbe, PowerSource};

/// Assembles a fresh [`TelemetrySnapshot`] for every send attempt.
#[derive(Clone)]
pub struct SnapshotCollector {
    environment: Arc<dyn EnvironmentProbe>,
    power: Arc<dyn PowerSource>,
}

impl std::fmt::Debug for SnapshotCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCollector").finish_non_exhaustive()
    }
}

impl SnapshotCollector {
    pub fn new(environment: Arc<dyn EnvironmentProbe>, power: Arc<dyn PowerSource>) -> Self {
        Self { environment, power }
    }

    /// Collect every signal. Never fails: a rejected power read becomes an
    /// error marker, absent capabilities become `"unknown"`.
    pub async fn collect(&self) -> TelemetrySnapshot {
        let env = &self.environment;
        let battery = self.read_power().await;

        let snapshot = TelemetrySnapshot {
            screen_resolution: env.screen_resolution(),
            device_pixel_ratio: env.device_pixel_ratio(),
            language: env.language(),
            platform: env.platform(),
            plugins: env.plugins(),
            cpu_cores: env.cpu_cores(),
            memory: env.memory(),
            connection: env.connection(),
            battery,
        };
        debug!(
            plugins = snapshot.plugins.len(),
            battery = snapshot.battery.is_some(),
            "Collected telemetry snapshot."
        );
        snapshot
    }

    async fn read_power(&self) -> Option<PowerReading> {
        if !self.power.is_supported() {
            debug!("Power status capability not available, omitting battery.");
            return None;
        }

        match self.power.status().await {
            Ok(status) => Some(PowerReading::status(status.level, status.charging)),
            Err(err) => {
                warn!(error = %err, "Could not retrieve battery status.");
                Some(PowerReading::acquisition_failed())
            }
        }
    }
}
