//! Payload transmission and terminal navigation.

use beacon_common::{LocationEnrichment, Payload, TelemetrySnapshot};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::DispatchError;
use crate::platform::Navigator;

/// How a send attempt ended. Every attempt ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// The collection endpoint redirected; the visitor was sent there
    Redirected(Url),
    /// The endpoint acknowledged without redirecting; no navigation
    Stayed,
    /// Transmission failed; the visitor was sent to the fallback destination
    Fallback(Url),
}

impl TerminalOutcome {
    /// Where the visitor was navigated to, if anywhere.
    pub fn destination(&self) -> Option<&Url> {
        match self {
            TerminalOutcome::Redirected(url) | TerminalOutcome::Fallback(url) => Some(url),
            TerminalOutcome::Stayed => None,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    endpoint: Url,
    fallback: Url,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("fallback", &self.fallback.as_str())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        fallback: Url,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            endpoint,
            fallback,
            navigator,
        }
    }

    /// Merge, send once, navigate. No retries.
    pub async fn dispatch(
        &self,
        snapshot: TelemetrySnapshot,
        enrichment: Option<LocationEnrichment>,
    ) -> TerminalOutcome {
        let payload = Payload::new(snapshot, enrichment);

        match self.transmit(&payload).await {
            Ok(final_url) if final_url != self.endpoint => {
                info!(url = %final_url, "Following collection endpoint redirect.");
                self.navigator.navigate(&final_url);
                TerminalOutcome::Redirected(final_url)
            }
            Ok(_) => {
                debug!("Payload delivered without redirect.");
                TerminalOutcome::Stayed
            }
            Err(err) => {
                error!(error = %err, fallback = %self.fallback, "Error sending tracking data.");
                self.navigator.navigate(&self.fallback);
                TerminalOutcome::Fallback(self.fallback.clone())
            }
        }
    }

    /// Send the payload and return the URL of the final response after any
    /// redirects the client followed.
    async fn transmit(&self, payload: &Payload) -> Result<Url, DispatchError> {
        debug!(
            url = %self.endpoint,
            location = payload.location().is_some(),
            "Sending payload."
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                url: self.endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Collection endpoint answered with a non-success status.");
        }
        Ok(response.url().clone())
    }
}
