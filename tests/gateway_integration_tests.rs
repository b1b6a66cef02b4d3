use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use shrike::api::{self, GatewayState};
use shrike::breaker::CircuitState;
use shrike::error::GatewayError;
use shrike::limiters::build_limiter;
use shrike::proxy::{BackendClient, BackendRequest, BackendResponse, GatewayProxy};
use shrike::registry::ServiceRegistry;
use shrike::settings::{BreakerSettings, LimiterAlgorithm, LimiterSettings};

/// Transport double that can be flipped between timing out and succeeding,
/// counting every call that actually reaches it
struct FlakyBackend {
    calls: AtomicUsize,
    failing: AtomicBool,
    seen_urls: Mutex<Vec<String>>,
}

impl FlakyBackend {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(true),
            seen_urls: Mutex::new(Vec::new()),
        }
    }

    fn succeeding() -> Self {
        let backend = Self::failing();
        backend.failing.store(false, Ordering::SeqCst);
        backend
    }

    fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendClient for FlakyBackend {
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_urls.lock().unwrap().push(request.url);
        if self.failing.load(Ordering::SeqCst) {
            Err("operation timed out".to_string())
        } else {
            Ok(BackendResponse {
                status_code: 200,
                data: json!({"ok": true}),
                headers: HashMap::new(),
            })
        }
    }
}

fn orders_registry(failure_threshold: u32, timeout_seconds: u64) -> Arc<ServiceRegistry> {
    let registry = Arc::new(ServiceRegistry::new(BreakerSettings {
        failure_threshold,
        timeout_seconds,
    }));
    registry
        .register_service("orders", "http://backend:9000")
        .unwrap();
    registry
}

#[tokio::test]
async fn consecutive_timeouts_open_the_circuit() {
    let registry = orders_registry(3, 30);
    let backend = Arc::new(FlakyBackend::failing());
    let proxy = GatewayProxy::new(registry.clone(), backend.clone());

    // Three consecutive backend timeouts
    for _ in 0..3 {
        let err = proxy
            .proxy_request("orders", "/orders", Method::GET, HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Backend(_)));
    }

    let breaker = registry.get_circuit_breaker("orders").unwrap();
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);

    // The fourth call fails immediately with a circuit-open signal and no
    // transport call occurs
    let err = proxy
        .proxy_request("orders", "/orders", Method::GET, HashMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::CircuitOpen(_)));
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn circuit_recovers_after_cooldown_probe() {
    let registry = orders_registry(1, 1);
    let backend = Arc::new(FlakyBackend::failing());
    let proxy = GatewayProxy::new(registry.clone(), backend.clone());

    let _ = proxy
        .proxy_request("orders", "/orders", Method::GET, HashMap::new(), None)
        .await
        .unwrap_err();
    let breaker = registry.get_circuit_breaker("orders").unwrap();
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);

    // While open, no traffic reaches the backend
    let _ = proxy
        .proxy_request("orders", "/orders", Method::GET, HashMap::new(), None)
        .await
        .unwrap_err();
    assert_eq!(backend.call_count(), 1);

    // Cool-down passes, backend recovers: the probe goes through and the
    // circuit closes again
    tokio::time::sleep(tokio::time::Duration::from_millis(1100)).await;
    backend.recover();
    let response = proxy
        .proxy_request("orders", "/orders", Method::GET, HashMap::new(), None)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(breaker.state().unwrap(), CircuitState::Closed);
}

#[tokio::test]
async fn proxy_round_robins_across_backends() {
    let registry = Arc::new(ServiceRegistry::new(BreakerSettings::default()));
    registry
        .register_service("users", "http://backend-a:8001")
        .unwrap();
    registry
        .register_service("users", "http://backend-b:8001")
        .unwrap();
    let backend = Arc::new(FlakyBackend::succeeding());
    let proxy = GatewayProxy::new(registry, backend.clone());

    for _ in 0..4 {
        proxy
            .proxy_request("users", "/users", Method::GET, HashMap::new(), None)
            .await
            .unwrap();
    }

    let urls = backend.seen_urls.lock().unwrap().clone();
    assert_eq!(
        urls,
        vec![
            "http://backend-a:8001/users",
            "http://backend-b:8001/users",
            "http://backend-a:8001/users",
            "http://backend-b:8001/users",
        ]
    );
}

fn router_with(backend: Arc<FlakyBackend>, limiter_max: u32) -> axum::Router {
    let registry = orders_registry(5, 30);
    let limiter = build_limiter(
        LimiterAlgorithm::SlidingWindow,
        LimiterSettings {
            max_requests: limiter_max,
            window_seconds: 60,
            ..Default::default()
        },
    );
    let proxy = Arc::new(GatewayProxy::new(registry.clone(), backend));
    api::api(GatewayState::new(limiter, registry, proxy))
}

fn proxy_request(path: &str) -> Request<Body> {
    let addr: SocketAddr = "127.0.0.1:55555".parse().unwrap();
    let mut request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn proxy_route_forwards_and_rate_limits() {
    let backend = Arc::new(FlakyBackend::succeeding());
    let router = router_with(backend.clone(), 2);

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(proxy_request("/api/orders/orders"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Quota exhausted: denied before any transport call happens
    let response = router
        .clone()
        .oneshot(proxy_request("/api/orders/orders"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn proxy_route_maps_open_circuit_to_503() {
    let backend = Arc::new(FlakyBackend::succeeding());
    let registry = orders_registry(1, 30);
    registry
        .get_circuit_breaker("orders")
        .unwrap()
        .record_failure()
        .unwrap();

    let limiter = build_limiter(LimiterAlgorithm::TokenBucket, LimiterSettings::default());
    let proxy = Arc::new(GatewayProxy::new(registry.clone(), backend.clone()));
    let router = api::api(GatewayState::new(limiter, registry, proxy));

    let response = router
        .oneshot(proxy_request("/api/orders/orders"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn expire_keys_route_sweeps_limiter_state() {
    let backend = Arc::new(FlakyBackend::succeeding());
    let router = router_with(backend, 5);

    let response = router
        .clone()
        .oneshot(proxy_request("/api/orders/orders"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/expire-keys")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let backend = Arc::new(FlakyBackend::succeeding());
    let router = router_with(backend, 5);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
