//! The unit of transmission: snapshot and enrichment flattened together.

use serde::Serialize;

use crate::location::LocationEnrichment;
use crate::snapshot::TelemetrySnapshot;

/// One payload is built per send attempt and serialized straight away.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    #[serde(flatten)]
    snapshot: TelemetrySnapshot,
    #[serde(flatten)]
    location: Option<LocationEnrichment>,
}

impl Payload {
    pub fn new(snapshot: TelemetrySnapshot, location: Option<LocationEnrichment>) -> Self {
        Self { snapshot, location }
    }

    pub fn location(&self) -> Option<&LocationEnrichment> {
        self.location.as_ref()
    }
}
