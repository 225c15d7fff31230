//! Network interceptor.
//!
//! Protocol handler that takes over requests whose path matches a stub and
//! answers them from the stub registry instead of the network.

use crate::config::{GlobalSettings, InterceptorConfig};
use crate::error::{Result, SyntheticError};
use crate::fixture::{BundledFixtures, DirectoryFixtures};
use crate::protocol::{
    decoded_path, CachePolicy, InterceptedRequest, ProtocolClient, ProtocolHandler, ResponseHead,
};
use crate::registry::StubRegistry;
use crate::stub::StubDefinition;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Status used when a request reaches the interceptor without a matching stub.
pub const FALLBACK_STATUS: StatusCode = StatusCode::BAD_REQUEST;

/// Outcome of looking a request up in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedResponse {
    pub status: StatusCode,
    pub body: Option<Bytes>,
    pub error: Option<SyntheticError>,
}

impl InterceptedResponse {
    fn from_stub(stub: &StubDefinition) -> Self {
        Self {
            status: stub.status,
            body: stub.payload.clone(),
            error: stub.error,
        }
    }

    fn fallback() -> Self {
        Self {
            status: FALLBACK_STATUS,
            body: None,
            error: None,
        }
    }
}

/// Snapshot of the interceptor's request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterceptorStats {
    pub requests_total: u64,
    pub requests_matched: u64,
    pub requests_unmatched: u64,
    pub requests_failed: u64,
}

/// Network Interceptor
///
/// Diverts requests matching a stub away from the network and answers
/// them with the stub's status, payload or synthetic error.
pub struct NetworkInterceptor {
    registry: Arc<StubRegistry>,
    settings: GlobalSettings,
    /// Total requests loaded.
    requests_total: AtomicU64,
    /// Requests answered from a stub.
    requests_matched: AtomicU64,
    /// Requests answered with the fallback response.
    requests_unmatched: AtomicU64,
    /// Requests answered with a synthetic failure.
    requests_failed: AtomicU64,
}

impl NetworkInterceptor {
    pub const NAME: &'static str = "network-interceptor";

    /// Create an interceptor over an already built registry.
    pub fn new(registry: Arc<StubRegistry>, settings: GlobalSettings) -> Self {
        info!(stubs = registry.len(), "Network interceptor initialized");

        Self {
            registry,
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
        }
    }

    /// Build the built-in registry according to `config`.
    pub fn from_config(config: &InterceptorConfig) -> Result<Self> {
        let strict = config.fixtures.strict;
        let registry = match &config.fixtures.dir {
            Some(dir) => StubRegistry::builtin(&DirectoryFixtures::new(dir), strict)?,
            None => StubRegistry::builtin(&BundledFixtures, strict)?,
        };
        Ok(Self::new(Arc::new(registry), config.settings.clone()))
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: InterceptorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(Self::from_config(&config)?)
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Whether a request for `url` would be intercepted.
    pub fn can_handle_url(&self, url: &Url) -> bool {
        self.registry.find_match(&decoded_path(url)).is_some()
    }

    /// Status, body and error the interceptor answers `request` with.
    pub fn stub_for(&self, request: &InterceptedRequest) -> InterceptedResponse {
        match self.registry.find_match(&request.path()) {
            Some(stub) => InterceptedResponse::from_stub(stub),
            None => InterceptedResponse::fallback(),
        }
    }

    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_matched: self.requests_matched.load(Ordering::Relaxed),
            requests_unmatched: self.requests_unmatched.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, request: &InterceptedRequest) -> InterceptedResponse {
        match self.registry.find_match(&request.path()) {
            Some(stub) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        stub_id = %stub.id,
                        method = %request.method,
                        path = %request.path(),
                        "Request matched stub"
                    );
                }
                InterceptedResponse::from_stub(stub)
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        path = %request.path(),
                        "No matching stub found, answering with fallback status"
                    );
                }
                InterceptedResponse::fallback()
            }
        }
    }
}

#[async_trait]
impl ProtocolHandler for NetworkInterceptor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_handle(&self, request: &InterceptedRequest) -> bool {
        self.can_handle_url(&request.url)
    }

    async fn start_loading(&self, request: &InterceptedRequest, client: &mut dyn ProtocolClient) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        debug!(url = %request.url, "Start loading");

        let response = self.lookup(request);

        if let Some(error) = response.error {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            client.on_failure(error);
            return;
        }

        client.on_response(
            ResponseHead::new(request.url.clone(), response.status),
            CachePolicy::NotAllowed,
        );

        if let Some(body) = response.body {
            client.on_data(body);
        }

        client.on_complete();
    }

    fn stop_loading(&self, request: &InterceptedRequest) {
        debug!(url = %request.url, "Stop loading");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkErrorKind;
    use http::Method;

    #[derive(Debug, PartialEq)]
    enum Event {
        Response(StatusCode, CachePolicy),
        Data(Bytes),
        Failure(SyntheticError),
        Complete,
    }

    #[derive(Default)]
    struct RecordingClient {
        events: Vec<Event>,
    }

    impl ProtocolClient for RecordingClient {
        fn on_response(&mut self, head: ResponseHead, cache_policy: CachePolicy) {
            self.events.push(Event::Response(head.status, cache_policy));
        }

        fn on_data(&mut self, chunk: Bytes) {
            self.events.push(Event::Data(chunk));
        }

        fn on_failure(&mut self, error: SyntheticError) {
            self.events.push(Event::Failure(error));
        }

        fn on_complete(&mut self) {
            self.events.push(Event::Complete);
        }
    }

    const OFFLINE: SyntheticError = SyntheticError::new(
        NetworkErrorKind::NotConnected,
        "The Internet connection appears to be offline.",
    );

    fn builtin() -> NetworkInterceptor {
        NetworkInterceptor::from_config(&InterceptorConfig::default()).unwrap()
    }

    fn with_stubs(stubs: Vec<StubDefinition>) -> NetworkInterceptor {
        let registry = StubRegistry::new(stubs).unwrap();
        NetworkInterceptor::new(Arc::new(registry), GlobalSettings::default())
    }

    fn feed(country: &str) -> InterceptedRequest {
        InterceptedRequest::parse(
            Method::GET,
            &format!(
                "https://rss.itunes.apple.com/api/v1/{country}/apple-music/top-songs/all/50/explicit.json"
            ),
        )
        .unwrap()
    }

    async fn load(interceptor: &NetworkInterceptor, request: &InterceptedRequest) -> Vec<Event> {
        let mut client = RecordingClient::default();
        interceptor.start_loading(request, &mut client).await;
        client.events
    }

    #[test]
    fn test_can_handle_matches_registry() {
        let interceptor = builtin();
        assert!(interceptor.can_handle(&feed("kr")));
        assert!(interceptor.can_handle(&feed("gb")));
        assert!(!interceptor.can_handle(&feed("fr")));

        let url = Url::parse("https://example.com/api/v1/kr/apple-music").unwrap();
        assert!(interceptor.can_handle_url(&url));

        // Only the path is considered.
        let url = Url::parse("https://api.example.com/?q=api/v1/kr/apple-music").unwrap();
        assert!(!interceptor.can_handle_url(&url));
    }

    #[tokio::test]
    async fn test_korea_scenario() {
        let interceptor = builtin();
        let events = load(&interceptor, &feed("kr")).await;

        assert_eq!(
            events,
            vec![
                Event::Response(StatusCode::OK, CachePolicy::NotAllowed),
                Event::Data(Bytes::from_static(include_bytes!("../fixtures/itunes-kr.json"))),
                Event::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_uk_scenario() {
        let interceptor = builtin();
        let events = load(&interceptor, &feed("gb")).await;

        assert_eq!(
            events,
            vec![
                Event::Response(StatusCode::OK, CachePolicy::NotAllowed),
                Event::Data(Bytes::from_static(include_bytes!("../fixtures/itunes-uk.json"))),
                Event::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_unmatched_request_gets_fallback() {
        let interceptor = builtin();
        let events = load(&interceptor, &feed("fr")).await;

        assert_eq!(
            events,
            vec![
                Event::Response(StatusCode::BAD_REQUEST, CachePolicy::NotAllowed),
                Event::Complete,
            ]
        );
        assert_eq!(interceptor.stats().requests_unmatched, 1);
    }

    #[tokio::test]
    async fn test_synthetic_error_emits_only_failure() {
        let interceptor = with_stubs(vec![StubDefinition::new("offline", "/offline")
            .with_payload("ignored")
            .with_error(OFFLINE)]);
        let request =
            InterceptedRequest::parse(Method::GET, "https://example.com/offline/ping").unwrap();

        let events = load(&interceptor, &request).await;
        assert_eq!(events, vec![Event::Failure(OFFLINE)]);
        assert_eq!(interceptor.stats().requests_failed, 1);
    }

    #[tokio::test]
    async fn test_stub_without_payload_has_no_data_event() {
        let interceptor = with_stubs(vec![
            StubDefinition::new("gone", "/gone").with_status(StatusCode::GONE)
        ]);
        let request = InterceptedRequest::parse(Method::DELETE, "https://example.com/gone").unwrap();

        let events = load(&interceptor, &request).await;
        assert_eq!(
            events,
            vec![
                Event::Response(StatusCode::GONE, CachePolicy::NotAllowed),
                Event::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_percent_encoded_korea_path() {
        let interceptor = builtin();
        let request = InterceptedRequest::parse(
            Method::GET,
            "https://rss.itunes.apple.com/api/v1/kr/apple%2Dmusic/top-songs/all/50/explicit.json",
        )
        .unwrap();

        assert!(interceptor.can_handle(&request));
        assert!(interceptor.can_handle_url(&request.url));

        let events = load(&interceptor, &request).await;
        assert_eq!(
            events,
            vec![
                Event::Response(StatusCode::OK, CachePolicy::NotAllowed),
                Event::Data(Bytes::from_static(include_bytes!("../fixtures/itunes-kr.json"))),
                Event::Complete,
            ]
        );
    }

    #[test]
    fn test_stub_for_triples() {
        let interceptor = builtin();

        let kr = interceptor.stub_for(&feed("kr"));
        assert_eq!(kr.status, StatusCode::OK);
        assert!(kr.body.is_some());
        assert!(kr.error.is_none());

        let fr = interceptor.stub_for(&feed("fr"));
        assert_eq!(
            fr,
            InterceptedResponse {
                status: StatusCode::BAD_REQUEST,
                body: None,
                error: None,
            }
        );

        // Pure lookup: counters untouched.
        assert_eq!(interceptor.stats(), InterceptorStats::default());
    }

    #[tokio::test]
    async fn test_counters() {
        let interceptor = builtin();
        load(&interceptor, &feed("kr")).await;
        load(&interceptor, &feed("gb")).await;
        load(&interceptor, &feed("fr")).await;

        assert_eq!(
            interceptor.stats(),
            InterceptorStats {
                requests_total: 3,
                requests_matched: 2,
                requests_unmatched: 1,
                requests_failed: 0,
            }
        );
    }

    #[test]
    fn test_protocol_defaults() {
        let interceptor = builtin();
        let request = feed("kr");

        let canonical = interceptor.canonical_request(&request);
        assert_eq!(canonical.url, request.url);
        assert_eq!(canonical.method, request.method);

        assert!(!interceptor.request_is_cache_equivalent(&request, &request));
        interceptor.stop_loading(&request);
        assert_eq!(interceptor.name(), "network-interceptor");
    }

    #[test]
    fn test_from_yaml_with_fixture_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("itunes-kr.json"), b"{\"feed\":{}}").unwrap();
        let yaml = format!(
            "fixtures:\n  dir: {}\n  strict: false\n",
            dir.path().display()
        );

        let interceptor = NetworkInterceptor::from_yaml(&yaml).unwrap();
        let korea = interceptor.registry().get("korea").unwrap();
        assert_eq!(korea.payload.as_deref(), Some(&b"{\"feed\":{}}"[..]));
        // itunes-uk.json is missing from the directory.
        assert!(interceptor.registry().get("uk").unwrap().payload.is_none());

        let strict = format!("fixtures:\n  dir: {}\n  strict: true\n", dir.path().display());
        assert!(NetworkInterceptor::from_yaml(&strict).is_err());
    }
}
