use beacon_core::config::LocationConfig;
use beacon_core::{BeaconConfig, ConsentState, Pipeline, TerminalOutcome, TriggerOutcome, native};
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cli::run_cli_async;
use crate::terminal::{TerminalInterstitial, TerminalNavigator};

#[derive(Args, Debug, Clone, Default)]
pub struct VisitArgs {
    /// Collection endpoint the payload is posted to
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Destination used when the payload cannot be sent
    #[arg(long, value_name = "URL")]
    pub fallback: Option<String>,

    /// Reverse geocoding service base URL
    #[arg(long, value_name = "URL")]
    pub geocoder: Option<String>,

    /// Recorded geolocation permission: granted, prompt, denied or unsupported
    #[arg(long, value_name = "STATE")]
    pub permission: Option<ConsentState>,

    /// Latitude of this host's position fix
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Longitude of this host's position fix
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,
}

impl VisitArgs {
    fn apply(self, config: &mut BeaconConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(fallback) = self.fallback {
            config.fallback_url = fallback;
        }
        if let Some(geocoder) = self.geocoder {
            config.geocoder_url = geocoder;
        }
        if let Some(permission) = self.permission {
            config.permission = permission;
        }
        if let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) {
            config.location = Some(LocationConfig {
                latitude,
                longitude,
            });
        }
    }
}

pub async fn run(config_path: Option<PathBuf>, args: VisitArgs) -> i32 {
    run_cli_async(|| run_inner(config_path, args)).await
}

async fn run_inner(config_path: Option<PathBuf>, args: VisitArgs) -> Result<(), String> {
    let mut config = BeaconConfig::load(config_path.as_deref()).map_err(|e| e.to_string())?;
    args.apply(&mut config);
    config.validate().map_err(|e| e.to_string())?;
    debug!(?config, "Resolved configuration.");

    let platform = native::platform(&config, Arc::new(TerminalNavigator));
    let pipeline = Pipeline::from_config(&config, platform, Arc::new(TerminalInterstitial))
        .map_err(|e| e.to_string())?;

    match pipeline.trigger().await {
        TriggerOutcome::Completed(TerminalOutcome::Stayed | TerminalOutcome::Redirected(_)) => {
            println!("{} Payload delivered.", style("✓").green());
            Ok(())
        }
        TriggerOutcome::Completed(TerminalOutcome::Fallback(_)) => {
            println!(
                "{} Could not reach {}, sent to fallback.",
                style("!").yellow(),
                config.endpoint
            );
            Ok(())
        }
        TriggerOutcome::Ignored(state) => Err(format!("Pipeline busy ({state:?})")),
    }
}
