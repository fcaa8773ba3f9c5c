//! Reverse geocoding of an acquired position.

use beacon_common::{Coordinates, LocationEnrichment};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::EnrichmentError;

/// External lookup from coordinates to an address structure.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(
        &self,
        coords: Coordinates,
    ) -> BoxFuture<'_, Result<serde_json::Value, EnrichmentError>>;
}

#[derive(Debug, Deserialize)]
struct ReverseLookupResponse {
    #[serde(default)]
    address: Option<serde_json::Value>,
}

/// Nominatim-compatible reverse lookup:
/// `GET <base>?format=json&lat=<lat>&lon=<lon>`.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn lookup_url(&self, coords: Coordinates) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &coords.latitude.to_string())
            .append_pair("lon", &coords.longitude.to_string());
        url
    }

    async fn lookup(&self, coords: Coordinates) -> Result<serde_json::Value, EnrichmentError> {
        let url = self.lookup_url(coords);
        debug!(%url, "Sending reverse lookup request.");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(EnrichmentError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status));
        }

        let body: ReverseLookupResponse = response.json().await.map_err(EnrichmentError::Decode)?;
        body.address
            .filter(|address| !address.is_null())
            .ok_or(EnrichmentError::MissingAddress)
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(
        &self,
        coords: Coordinates,
    ) -> BoxFuture<'_, Result<serde_json::Value, EnrichmentError>> {
        self.lookup(coords).boxed()
    }
}

/// Attaches an address to coordinates, or keeps the bare coordinates when
/// the lookup fails. Never fails itself.
#[derive(Clone)]
pub struct Enricher {
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher").finish_non_exhaustive()
    }
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { geocoder }
    }

    pub async fn enrich(&self, coords: Coordinates) -> LocationEnrichment {
        match self.geocoder.reverse(coords).await {
            Ok(address) => {
                debug!("Resolved address for location fix.");
                LocationEnrichment::with_address(coords, address)
            }
            Err(err) => {
                warn!(error = %err, "Reverse lookup failed, sending coordinates only.");
                LocationEnrichment::coordinates_only(coords)
            }
        }
    }
}
