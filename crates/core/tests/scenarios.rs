//! End-to-end pipeline runs against scripted platform doubles and a mock
//! collection endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::float_cmp)]

use beacon_core::enrichment::{NominatimGeocoder, ReverseGeocoder};
use beacon_core::error::{EnrichmentError, PlatformError};
use beacon_core::platform::{
    EnvironmentProbe, LocationProvider, Navigator, PermissionQuery, PowerSource, PowerStatus,
};
use beacon_core::{
    ChannelInterstitial, ConsentState, Coordinates, Endpoints, Interstitial, InterstitialChoice,
    Pipeline, PipelineState, Platform, Reading, TerminalOutcome, TriggerOutcome,
};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FALLBACK: &str = "https://fallback.example/";

// ---------------------------------------------------------------------------
// Platform doubles
// ---------------------------------------------------------------------------

struct Permissions {
    answer: Result<ConsentState, PlatformError>,
    queries: AtomicUsize,
}

impl PermissionQuery for Permissions {
    fn query_geolocation(&self) -> BoxFuture<'_, Result<ConsentState, PlatformError>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.clone();
        async move { answer }.boxed()
    }
}

struct Location {
    supported: bool,
    fix: Result<Coordinates, PlatformError>,
    requests: AtomicUsize,
}

impl LocationProvider for Location {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn current_position(&self) -> BoxFuture<'_, Result<Coordinates, PlatformError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let fix = self.fix.clone();
        async move { fix }.boxed()
    }
}

struct Power {
    status: Result<PowerStatus, PlatformError>,
}

impl PowerSource for Power {
    fn is_supported(&self) -> bool {
        true
    }

    fn status(&self) -> BoxFuture<'_, Result<PowerStatus, PlatformError>> {
        let status = self.status.clone();
        async move { status }.boxed()
    }
}

struct Laptop;

impl EnvironmentProbe for Laptop {
    fn language(&self) -> Reading<String> {
        Reading::Known("en-US".to_string())
    }

    fn platform(&self) -> Reading<String> {
        Reading::Known("MacIntel".to_string())
    }

    fn cpu_cores(&self) -> Reading<usize> {
        Reading::Known(8)
    }
}

#[derive(Default)]
struct Browser {
    visits: Mutex<Vec<Url>>,
}

impl Navigator for Browser {
    fn navigate(&self, destination: &Url) {
        self.visits.lock().unwrap().push(destination.clone());
    }
}

struct ScriptedInterstitial {
    answer: InterstitialChoice,
    shows: AtomicUsize,
    hides: AtomicUsize,
}

impl ScriptedInterstitial {
    fn answering(answer: InterstitialChoice) -> Self {
        Self {
            answer,
            shows: AtomicUsize::new(0),
            hides: AtomicUsize::new(0),
        }
    }
}

impl Interstitial for ScriptedInterstitial {
    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }

    fn choice(&self) -> BoxFuture<'_, InterstitialChoice> {
        let answer = self.answer;
        async move { answer }.boxed()
    }
}

struct FailingGeocoder;

impl ReverseGeocoder for FailingGeocoder {
    fn reverse(&self, _coords: Coordinates) -> BoxFuture<'_, Result<Value, EnrichmentError>> {
        async { Err(EnrichmentError::MissingAddress) }.boxed()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    server: MockServer,
    permissions: Arc<Permissions>,
    location: Arc<Location>,
    browser: Arc<Browser>,
    interstitial: Arc<ScriptedInterstitial>,
    pipeline: Pipeline,
}

struct Setup {
    consent: Result<ConsentState, PlatformError>,
    location_supported: bool,
    fix: Result<Coordinates, PlatformError>,
    power: Result<PowerStatus, PlatformError>,
    interstitial_answer: InterstitialChoice,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    endpoint_reachable: bool,
    endpoint_redirects: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            consent: Ok(ConsentState::Granted),
            location_supported: true,
            fix: Ok(Coordinates::new(37.0, -122.0)),
            power: Ok(PowerStatus {
                level: 0.5,
                charging: true,
            }),
            interstitial_answer: InterstitialChoice::Deny,
            geocoder: None,
            endpoint_reachable: true,
            endpoint_redirects: true,
        }
    }
}

async fn mount_collector(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/track"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/landing", server.uri())),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(server)
        .await;
}

async fn mount_acknowledging_collector(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/track"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

async fn mount_geocoder(server: &MockServer, address: Value) {
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "address": address })))
        .mount(server)
        .await;
}

impl Setup {
    async fn build(self) -> Harness {
        let server = MockServer::start().await;
        if self.endpoint_redirects {
            mount_collector(&server).await;
        } else {
            mount_acknowledging_collector(&server).await;
        }

        let permissions = Arc::new(Permissions {
            answer: self.consent,
            queries: AtomicUsize::new(0),
        });
        let location = Arc::new(Location {
            supported: self.location_supported,
            fix: self.fix,
            requests: AtomicUsize::new(0),
        });
        let browser = Arc::new(Browser::default());
        let interstitial = Arc::new(ScriptedInterstitial::answering(self.interstitial_answer));

        let platform = Platform {
            permissions: permissions.clone(),
            location: location.clone(),
            power: Arc::new(Power { status: self.power }),
            environment: Arc::new(Laptop),
            navigator: browser.clone(),
        };
        let client = reqwest::Client::new();
        let geocoder: Arc<dyn ReverseGeocoder> = match self.geocoder {
            Some(geocoder) => geocoder,
            None => Arc::new(NominatimGeocoder::new(
                client.clone(),
                Url::parse(&format!("{}/reverse", server.uri())).unwrap(),
            )),
        };
        let collection = if self.endpoint_reachable {
            format!("{}/track", server.uri())
        } else {
            "http://127.0.0.1:9/track".to_string()
        };
        let endpoints = Endpoints {
            collection: Url::parse(&collection).unwrap(),
            fallback: Url::parse(FALLBACK).unwrap(),
        };

        let pipeline = Pipeline::new(
            platform,
            interstitial.clone(),
            geocoder,
            client,
            endpoints,
        );

        Harness {
            server,
            permissions,
            location,
            browser,
            interstitial,
            pipeline,
        }
    }
}

impl Harness {
    async fn sent_payloads(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/track")
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }

    fn visits(&self) -> Vec<Url> {
        self.browser.visits.lock().unwrap().clone()
    }

    fn landing(&self) -> Url {
        Url::parse(&format!("{}/landing", self.server.uri())).unwrap()
    }

    fn shows(&self) -> usize {
        self.interstitial.shows.load(Ordering::SeqCst)
    }
}

fn assert_no_location(payload: &Value) {
    for field in ["latitude", "longitude", "address"] {
        assert!(payload.get(field).is_none(), "unexpected {field} in {payload}");
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_granted_consent_sends_location_silently() {
    let harness = Setup::default().build().await;
    mount_geocoder(&harness.server, json!("123 Main St")).await;

    let outcome = harness.pipeline.trigger().await;

    assert_eq!(
        outcome,
        TriggerOutcome::Completed(TerminalOutcome::Redirected(harness.landing()))
    );
    let payloads = harness.sent_payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["latitude"], 37.0);
    assert_eq!(payloads[0]["longitude"], -122.0);
    assert_eq!(payloads[0]["address"], "123 Main St");
    assert_eq!(payloads[0]["platform"], "MacIntel");
    assert_eq!(harness.shows(), 0);
    assert_eq!(harness.visits(), vec![harness.landing()]);
}

#[tokio::test]
async fn test_prompt_then_deny_sends_without_location() {
    let harness = Setup {
        consent: Ok(ConsentState::Prompt),
        interstitial_answer: InterstitialChoice::Deny,
        ..Setup::default()
    }
    .build()
    .await;

    let outcome = harness.pipeline.trigger().await;

    assert_eq!(
        outcome,
        TriggerOutcome::Completed(TerminalOutcome::Redirected(harness.landing()))
    );
    assert_eq!(harness.shows(), 1);
    assert_eq!(harness.interstitial.hides.load(Ordering::SeqCst), 1);
    assert!(!harness.pipeline.is_awaiting_consent());
    assert_eq!(harness.location.requests.load(Ordering::SeqCst), 0);

    let payloads = harness.sent_payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_no_location(&payloads[0]);
}

#[tokio::test]
async fn test_prompt_then_allow_with_failed_fix_skips_location() {
    let harness = Setup {
        consent: Ok(ConsentState::Prompt),
        interstitial_answer: InterstitialChoice::Allow,
        fix: Err(PlatformError::Acquisition("User denied Geolocation".to_string())),
        ..Setup::default()
    }
    .build()
    .await;

    let outcome = harness.pipeline.trigger().await;

    // Normal dispatch, not the fallback
    assert_eq!(
        outcome,
        TriggerOutcome::Completed(TerminalOutcome::Redirected(harness.landing()))
    );
    assert_eq!(harness.location.requests.load(Ordering::SeqCst), 1);
    // The permission subsystem is asked only once; the allow path forces the prompt
    assert_eq!(harness.permissions.queries.load(Ordering::SeqCst), 1);
    let payloads = harness.sent_payloads().await;
    assert_eq!(payloads.len(), 1);
    assert_no_location(&payloads[0]);
}

#[tokio::test]
async fn test_prompt_then_allow_with_fix_sends_location() {
    let harness = Setup {
        consent: Ok(ConsentState::Prompt),
        interstitial_answer: InterstitialChoice::Allow,
        fix: Ok(Coordinates::new(40.7, -74.0)),
        ..Setup::default()
    }
    .build()
    .await;
    mount_geocoder(&harness.server, json!({ "city": "New York" })).await;

    harness.pipeline.trigger().await;

    let payloads = harness.sent_payloads().await;
    assert_eq!(payloads[0]["latitude"], 40.7);
    assert_eq!(payloads[0]["address"]["city"], "New York");
    assert_eq!(harness.shows(), 1);
}

#[tokio::test]
async fn test_transport_failure_navigates_to_fallback() {
    let harness = Setup {
        endpoint_reachable: false,
        ..Setup::default()
    }
    .build()
    .await;
    mount_geocoder(&harness.server, json!("123 Main St")).await;

    let outcome = harness.pipeline.trigger().await;

    let fallback = Url::parse(FALLBACK).unwrap();
    assert_eq!(
        outcome,
        TriggerOutcome::Completed(TerminalOutcome::Fallback(fallback.clone()))
    );
    assert_eq!(harness.visits(), vec![fallback]);
}

#[tokio::test]
async fn test_decided_consent_never_shows_interstitial() {
    for consent in [ConsentState::Granted, ConsentState::Denied] {
        let harness = Setup {
            consent: Ok(consent),
            ..Setup::default()
        }
        .build()
        .await;
        mount_geocoder(&harness.server, json!("1 Infinite Loop")).await;

        for _ in 0..3 {
            harness.pipeline.trigger().await;
        }

        assert_eq!(harness.shows(), 0, "interstitial shown for {consent}");
        assert_eq!(harness.sent_payloads().await.len(), 3);
        // Re-derived on every trigger
        assert_eq!(harness.permissions.queries.load(Ordering::SeqCst), 3);
    }
}

#[tokio::test]
async fn test_failed_lookup_keeps_coordinates() {
    let harness = Setup {
        geocoder: Some(Arc::new(FailingGeocoder)),
        ..Setup::default()
    }
    .build()
    .await;

    harness.pipeline.trigger().await;

    let payloads = harness.sent_payloads().await;
    assert_eq!(payloads[0]["latitude"], 37.0);
    assert_eq!(payloads[0]["longitude"], -122.0);
    assert!(payloads[0].get("address").is_none());
}

#[tokio::test]
async fn test_missing_location_capability_skips_everything() {
    let harness = Setup {
        location_supported: false,
        consent: Ok(ConsentState::Prompt),
        ..Setup::default()
    }
    .build()
    .await;

    harness.pipeline.trigger().await;

    assert_eq!(harness.permissions.queries.load(Ordering::SeqCst), 0);
    assert_eq!(harness.shows(), 0);
    assert_eq!(harness.location.requests.load(Ordering::SeqCst), 0);
    assert_no_location(&harness.sent_payloads().await[0]);
}

#[tokio::test]
async fn test_permission_query_error_skips_location() {
    let harness = Setup {
        consent: Err(PlatformError::PermissionQuery("permissions API missing".to_string())),
        ..Setup::default()
    }
    .build()
    .await;

    let outcome = harness.pipeline.trigger().await;

    assert!(matches!(outcome, TriggerOutcome::Completed(TerminalOutcome::Redirected(_))));
    assert_eq!(harness.location.requests.load(Ordering::SeqCst), 0);
    assert_no_location(&harness.sent_payloads().await[0]);
}

#[tokio::test]
async fn test_power_failure_marks_battery_and_keeps_snapshot() {
    let harness = Setup {
        consent: Ok(ConsentState::Denied),
        power: Err(PlatformError::Power("NotAllowedError".to_string())),
        ..Setup::default()
    }
    .build()
    .await;

    harness.pipeline.trigger().await;

    let payload = &harness.sent_payloads().await[0];
    assert_eq!(
        payload["battery"],
        json!({ "error": "Could not retrieve battery status." })
    );
    assert_eq!(payload["language"], "en-US");
    assert_eq!(payload["cpu_cores"], 8);
    assert_eq!(payload["memory"], "unknown");
    assert_eq!(payload["connection"], json!({ "type": "unknown", "downlink": "unknown" }));
}

#[tokio::test]
async fn test_every_run_navigates_at_most_once() {
    let cases = [
        (Ok(ConsentState::Granted), InterstitialChoice::Deny, true),
        (Ok(ConsentState::Prompt), InterstitialChoice::Allow, true),
        (Ok(ConsentState::Prompt), InterstitialChoice::Deny, false),
        (Ok(ConsentState::Denied), InterstitialChoice::Deny, true),
        (Ok(ConsentState::Unsupported), InterstitialChoice::Allow, false),
    ];
    for (consent, answer, reachable) in cases {
        let harness = Setup {
            consent,
            interstitial_answer: answer,
            endpoint_reachable: reachable,
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = harness.pipeline.trigger().await;

        let TriggerOutcome::Completed(terminal) = outcome else {
            panic!("run was ignored");
        };
        assert_eq!(harness.visits().len(), 1);
        assert_eq!(terminal.destination(), harness.visits().first());
        assert_eq!(harness.pipeline.state(), PipelineState::Idle);
    }
}

#[tokio::test]
async fn test_acknowledged_send_stays_put() {
    let harness = Setup {
        consent: Ok(ConsentState::Denied),
        endpoint_redirects: false,
        ..Setup::default()
    }
    .build()
    .await;

    let outcome = harness.pipeline.trigger().await;

    assert_eq!(outcome, TriggerOutcome::Completed(TerminalOutcome::Stayed));
    assert!(harness.visits().is_empty());
    assert_eq!(harness.sent_payloads().await.len(), 1);
    assert_eq!(harness.pipeline.state(), PipelineState::Idle);
}

/// A pipeline that waits on a [`ChannelInterstitial`] for the visitor's
/// answer, with permission state `prompt`.
fn channel_pipeline(
    server: &MockServer,
    browser: Arc<Browser>,
    interstitial: Arc<ChannelInterstitial>,
    geocoder: Arc<dyn ReverseGeocoder>,
) -> Pipeline {
    let platform = Platform {
        permissions: Arc::new(Permissions {
            answer: Ok(ConsentState::Prompt),
            queries: AtomicUsize::new(0),
        }),
        location: Arc::new(Location {
            supported: true,
            fix: Ok(Coordinates::new(37.0, -122.0)),
            requests: AtomicUsize::new(0),
        }),
        power: Arc::new(Power {
            status: Err(PlatformError::Unavailable("battery")),
        }),
        environment: Arc::new(Laptop),
        navigator: browser,
    };
    Pipeline::new(
        platform,
        interstitial,
        geocoder,
        reqwest::Client::new(),
        Endpoints {
            collection: Url::parse(&format!("{}/track", server.uri())).unwrap(),
            fallback: Url::parse(FALLBACK).unwrap(),
        },
    )
}

#[tokio::test]
async fn test_trigger_while_awaiting_consent_is_ignored() {
    let server = MockServer::start().await;
    mount_collector(&server).await;

    let browser = Arc::new(Browser::default());
    let interstitial = Arc::new(ChannelInterstitial::new());
    let pipeline = channel_pipeline(
        &server,
        browser.clone(),
        interstitial.clone(),
        Arc::new(FailingGeocoder),
    );

    let (first, second) = tokio::join!(pipeline.trigger(), async {
        while !interstitial.is_awaiting() {
            tokio::task::yield_now().await;
        }
        assert!(pipeline.is_awaiting_consent());
        let second = pipeline.trigger().await;
        assert!(interstitial.deny());
        assert!(!interstitial.allow(), "second activation must be a no-op");
        second
    });

    assert_eq!(second, TriggerOutcome::Ignored(PipelineState::AwaitingConsent));
    assert!(matches!(first, TriggerOutcome::Completed(TerminalOutcome::Redirected(_))));
    assert_eq!(browser.visits.lock().unwrap().len(), 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    // Once idle, a new trigger runs again
    let (third, _) = tokio::join!(pipeline.trigger(), async {
        while !interstitial.is_awaiting() {
            tokio::task::yield_now().await;
        }
        interstitial.deny()
    });
    assert!(matches!(third, TriggerOutcome::Completed(_)));
}

#[tokio::test]
async fn test_run_dropped_while_awaiting_consent_prompts_afresh() {
    let server = MockServer::start().await;
    mount_collector(&server).await;
    mount_geocoder(&server, json!({ "city": "Oakland" })).await;

    let browser = Arc::new(Browser::default());
    let interstitial = Arc::new(ChannelInterstitial::new());
    let geocoder = Arc::new(NominatimGeocoder::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/reverse", server.uri())).unwrap(),
    ));
    let pipeline = channel_pipeline(&server, browser.clone(), interstitial.clone(), geocoder);

    let abandoned = tokio::time::timeout(Duration::from_millis(50), pipeline.trigger()).await;
    assert!(abandoned.is_err(), "nobody answered, the run should still be waiting");
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.is_awaiting_consent());
    assert!(!interstitial.is_visible());
    assert!(!interstitial.is_awaiting());

    let (outcome, accepted) = tokio::join!(pipeline.trigger(), async {
        while !interstitial.is_awaiting() {
            tokio::task::yield_now().await;
        }
        assert!(interstitial.is_visible());
        interstitial.allow()
    });

    assert!(accepted);
    assert!(matches!(outcome, TriggerOutcome::Completed(TerminalOutcome::Redirected(_))));
    let payloads: Vec<Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/track")
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["address"]["city"], "Oakland");
    assert_eq!(browser.visits.lock().unwrap().len(), 1);
}
