//! Terminal renditions of the interstitial and of navigation.

use beacon_core::platform::Navigator;
use beacon_core::{Interstitial, InterstitialChoice};
use console::style;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, warn};
use url::Url;

const ALLOW_LABEL: &str = "Share my location";
const DENY_LABEL: &str = "Continue without location";

/// Asks on the terminal whether location may be requested.
///
/// Without an attended terminal there is nobody to ask, so the answer is
/// always a denial.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalInterstitial;

impl Interstitial for TerminalInterstitial {
    fn show(&self) {
        eprintln!(
            "{} This visit can include your approximate location.",
            style("?").cyan().bold()
        );
    }

    fn hide(&self) {
        debug!("Interstitial dismissed.");
    }

    fn choice(&self) -> BoxFuture<'_, InterstitialChoice> {
        async {
            if !console::user_attended_stderr() {
                debug!("No attended terminal, declining location.");
                return InterstitialChoice::Deny;
            }

            let selection = tokio::task::spawn_blocking(|| {
                Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Location")
                    .items(&[ALLOW_LABEL, DENY_LABEL])
                    .default(0)
                    .interact()
            })
            .await;

            match selection {
                Ok(Ok(0)) => InterstitialChoice::Allow,
                Ok(Ok(_)) => InterstitialChoice::Deny,
                Ok(Err(err)) => {
                    warn!(error = %err, "Interstitial prompt failed, declining location.");
                    InterstitialChoice::Deny
                }
                Err(err) => {
                    warn!(error = %err, "Interstitial prompt task failed, declining location.");
                    InterstitialChoice::Deny
                }
            }
        }
        .boxed()
    }
}

/// Reports the destination the visitor is sent to.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, destination: &Url) {
        println!("{} {}", style("→").cyan(), style(destination).underlined());
    }
}
