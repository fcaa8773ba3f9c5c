//! The consent-aware acquisition pipeline.
//!
//! One trigger runs: consent resolution, optionally the interstitial,
//! optionally location acquisition and enrichment, then snapshot collection
//! and dispatch. Every path ends in exactly one [`TerminalOutcome`].
//!
//! Only one run may be in flight. A trigger that arrives while a run is
//! resolving, waiting on the interstitial, acquiring or dispatching is
//! ignored and leaves the running one untouched.

use beacon_common::LocationEnrichment;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, info};
use url::Url;

use crate::config::BeaconConfig;
use crate::consent::{ConsentResolver, Resolution};
use crate::dispatch::{Dispatcher, TerminalOutcome};
use crate::enrichment::{Enricher, NominatimGeocoder, ReverseGeocoder};
use crate::error::ConfigError;
use crate::interstitial::{Interstitial, InterstitialChoice, InterstitialController};
use crate::platform::Platform;
use crate::telemetry::SnapshotCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Resolving = 1,
    AwaitingConsent = 2,
    Acquiring = 3,
    Dispatching = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Resolving,
            2 => PipelineState::AwaitingConsent,
            3 => PipelineState::Acquiring,
            4 => PipelineState::Dispatching,
            _ => PipelineState::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The run finished with this terminal outcome
    Completed(TerminalOutcome),
    /// Another run was in flight, in the given state; nothing happened
    Ignored(PipelineState),
}

/// Where the payload goes and where the visitor lands if that fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub collection: Url,
    pub fallback: Url,
}

pub struct Pipeline {
    resolver: ConsentResolver,
    interstitial: InterstitialController,
    enricher: Enricher,
    collector: SnapshotCollector,
    dispatcher: Dispatcher,
    state: AtomicU8,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Resets the pipeline to idle when a run ends, however it ends.
struct RunGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> RunGuard<'a> {
    fn begin(state: &'a AtomicU8) -> Result<Self, PipelineState> {
        state
            .compare_exchange(
                PipelineState::Idle as u8,
                PipelineState::Resolving as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| Self { state })
            .map_err(PipelineState::from_u8)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.store(PipelineState::Idle as u8, Ordering::SeqCst);
    }
}

impl Pipeline {
    pub fn new(
        platform: Platform,
        interstitial: Arc<dyn Interstitial>,
        geocoder: Arc<dyn ReverseGeocoder>,
        client: reqwest::Client,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            resolver: ConsentResolver::new(platform.permissions, platform.location),
            interstitial: InterstitialController::new(interstitial),
            enricher: Enricher::new(geocoder),
            collector: SnapshotCollector::new(platform.environment, platform.power),
            dispatcher: Dispatcher::new(
                client,
                endpoints.collection,
                endpoints.fallback,
                platform.navigator,
            ),
            state: AtomicU8::new(PipelineState::Idle as u8),
        }
    }

    /// Build a pipeline talking to the endpoints and geocoder in `config`.
    pub fn from_config(
        config: &BeaconConfig,
        platform: Platform,
        interstitial: Arc<dyn Interstitial>,
    ) -> Result<Self, ConfigError> {
        let client = config
            .http_client()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let geocoder = NominatimGeocoder::new(client.clone(), config.geocoder()?);
        let endpoints = Endpoints {
            collection: config.endpoint_url()?,
            fallback: config.fallback()?,
        };
        Ok(Self::new(
            platform,
            interstitial,
            Arc::new(geocoder),
            client,
            endpoints,
        ))
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the interstitial is currently on screen.
    pub fn is_awaiting_consent(&self) -> bool {
        self.interstitial.is_visible()
    }

    /// Run the pipeline once, unless a run is already in flight.
    pub async fn trigger(&self) -> TriggerOutcome {
        let _run = match RunGuard::begin(&self.state) {
            Ok(run) => run,
            Err(current) => {
                debug!(state = ?current, "Pipeline already running, ignoring trigger.");
                return TriggerOutcome::Ignored(current);
            }
        };

        let enrichment = self.acquire_location().await;

        self.enter(PipelineState::Dispatching);
        let snapshot = self.collector.collect().await;
        let outcome = self.dispatcher.dispatch(snapshot, enrichment).await;
        info!(?outcome, "Pipeline run finished.");
        TriggerOutcome::Completed(outcome)
    }

    async fn acquire_location(&self) -> Option<LocationEnrichment> {
        let resolution = match self.resolver.decide(false).await {
            Resolution::AwaitInterstitial => {
                self.enter(PipelineState::AwaitingConsent);
                match self.interstitial.present().await {
                    InterstitialChoice::Allow => {
                        self.enter(PipelineState::Resolving);
                        self.resolver.decide(true).await
                    }
                    InterstitialChoice::Deny => {
                        debug!("Interstitial declined, continuing without location.");
                        return None;
                    }
                }
            }
            resolution => resolution,
        };

        match resolution {
            Resolution::Acquire => {
                self.enter(PipelineState::Acquiring);
                let coords = self.resolver.acquire().await?;
                Some(self.enricher.enrich(coords).await)
            }
            Resolution::Skip | Resolution::AwaitInterstitial => None,
        }
    }

    fn enter(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}
