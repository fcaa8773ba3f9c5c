//! Geolocation consent resolution.
//!
//! Decides, from the platform's recorded permission, whether location is
//! acquired silently, whether the user is asked first through the
//! interstitial, or whether location is skipped altogether:
//!
//! | location capability | force prompt | consent state        | resolution          |
//! |---------------------|--------------|----------------------|---------------------|
//! | absent              | any          | not queried          | skip                |
//! | present             | yes          | not queried          | acquire             |
//! | present             | no           | granted              | acquire             |
//! | present             | no           | prompt               | await interstitial  |
//! | present             | no           | denied / unsupported | skip                |
//! | present             | no           | query error          | skip                |
//!
//! A user who already decided is never asked again, and location is never
//! requested silently while the decision is still open.

use beacon_common::{ConsentState, Coordinates};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::platform::{LocationProvider, PermissionQuery};

/// What the pipeline should do next about location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Request a fix without showing the interstitial
    Acquire,
    /// Consent is undetermined; show the interstitial and wait
    AwaitInterstitial,
    /// Send without any location data
    Skip,
}

#[derive(Clone)]
pub struct ConsentResolver {
    permissions: Arc<dyn PermissionQuery>,
    location: Arc<dyn LocationProvider>,
}

impl std::fmt::Debug for ConsentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentResolver")
            .field("location_supported", &self.location.is_supported())
            .finish_non_exhaustive()
    }
}

impl ConsentResolver {
    pub fn new(permissions: Arc<dyn PermissionQuery>, location: Arc<dyn LocationProvider>) -> Self {
        Self {
            permissions,
            location,
        }
    }

    /// Resolve the next step. `force_prompt` is set once the user has agreed
    /// through the interstitial, which lets the native prompt appear.
    pub async fn decide(&self, force_prompt: bool) -> Resolution {
        if !self.location.is_supported() {
            info!("Geolocation is not supported, skipping location.");
            return Resolution::Skip;
        }

        if force_prompt {
            debug!("Interstitial accepted, requesting location.");
            return Resolution::Acquire;
        }

        let state = match self.permissions.query_geolocation().await {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "Error querying geolocation permission, skipping location.");
                return Resolution::Skip;
            }
        };
        debug!(%state, "Queried geolocation permission.");

        match state {
            ConsentState::Granted => Resolution::Acquire,
            ConsentState::Prompt => Resolution::AwaitInterstitial,
            ConsentState::Denied | ConsentState::Unsupported => Resolution::Skip,
        }
    }

    /// Request a position fix. Any failure, including the user refusing the
    /// native prompt, is logged and reported as `None`.
    pub async fn acquire(&self) -> Option<Coordinates> {
        match self.location.current_position().await {
            Ok(coords) => {
                debug!(
                    latitude = coords.latitude,
                    longitude = coords.longitude,
                    "Acquired location fix."
                );
                Some(coords)
            }
            Err(err) => {
                info!(error = %err, "Location acquisition failed, continuing without location.");
                None
            }
        }
    }
}
