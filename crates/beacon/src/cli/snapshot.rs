use beacon_core::native::{BatteryPower, SystemProbe};
use beacon_core::telemetry::SnapshotCollector;
use beacon_core::BeaconConfig;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::run_cli_async;

pub async fn run(config_path: Option<PathBuf>) -> i32 {
    run_cli_async(|| run_inner(config_path)).await
}

async fn run_inner(config_path: Option<PathBuf>) -> Result<(), String> {
    let config = BeaconConfig::load(config_path.as_deref()).map_err(|e| e.to_string())?;

    let collector = SnapshotCollector::new(
        Arc::new(SystemProbe::detect(config.display)),
        Arc::new(BatteryPower::detect()),
    );
    let snapshot = collector.collect().await;

    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| format!("Failed to serialize snapshot: {e}"))?;
    println!("{json}");
    Ok(())
}
