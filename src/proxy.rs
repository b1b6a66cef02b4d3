//! Gateway proxy orchestration.
//!
//! For each inbound request the proxy gates on the service's circuit
//! breaker, resolves a backend via round-robin, forwards the call with a
//! bounded timeout, and reports the outcome back to the breaker. Transport
//! failures are what trips the breaker; an HTTP error status from a
//! reachable backend is still a successful connection.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{event, Level};

use crate::error::{GatewayError, Result};
use crate::registry::ServiceRegistry;
use crate::settings::ProxySettings;

#[derive(Clone, Debug)]
pub struct BackendRequest {
    pub url: String,
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct BackendResponse {
    pub status_code: u16,
    pub data: Value,
    pub headers: HashMap<String, String>,
}

/// Transport seam for outbound calls. `Err` means the backend was
/// unreachable (connection error or timeout); any HTTP response, whatever
/// its status code, is `Ok`.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn send(&self, request: BackendRequest) -> std::result::Result<BackendResponse, String>;
}

/// Production transport over a shared reqwest client with a
/// construction-time request timeout
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: ProxySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BackendClient for ReqwestBackend {
    async fn send(&self, request: BackendRequest) -> std::result::Result<BackendResponse, String> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(|e| e.to_string())?;
        let data = if text.is_empty() {
            json!({})
        } else {
            // Non-JSON backends are passed through as a raw string payload
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(BackendResponse {
            status_code,
            data,
            headers,
        })
    }
}

/// What the HTTP layer forwards back to the inbound client
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub data: Value,
    pub headers: HashMap<String, String>,
    pub response_time_ms: f64,
}

pub struct GatewayProxy {
    registry: Arc<ServiceRegistry>,
    client: Arc<dyn BackendClient>,
}

impl GatewayProxy {
    pub fn new(registry: Arc<ServiceRegistry>, client: Arc<dyn BackendClient>) -> Self {
        Self { registry, client }
    }

    /// Convenience constructor wiring the reqwest transport
    pub fn with_reqwest(registry: Arc<ServiceRegistry>, settings: ProxySettings) -> Result<Self> {
        let client = Arc::new(ReqwestBackend::new(settings)?);
        Ok(Self::new(registry, client))
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Forward a request to a backend of `service_name`, applying the
    /// circuit breaker. No network call is attempted while the circuit
    /// refuses, and no retry happens on failure.
    pub async fn proxy_request(
        &self,
        service_name: &str,
        path: &str,
        method: Method,
        headers: HashMap<String, String>,
        body: Option<Value>,
    ) -> Result<ProxyResponse> {
        let circuit_breaker = self.registry.get_circuit_breaker(service_name)?;

        if !circuit_breaker.can_attempt()? {
            return Err(GatewayError::CircuitOpen(format!(
                "Service {} is currently unavailable (circuit open)",
                service_name
            )));
        }

        let service_url = match self.registry.get_service_url(service_name)? {
            Some(url) => url,
            None => {
                return Err(GatewayError::ServiceNotFound(format!(
                    "Service {} not found",
                    service_name
                )))
            }
        };

        let full_url = format!("{}{}", service_url, path);
        let request = BackendRequest {
            url: full_url,
            method,
            headers,
            body,
        };

        let start = Instant::now();
        match self.client.send(request).await {
            Ok(response) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                // Reachability is what the breaker cares about, not the
                // application-level status code
                circuit_breaker.record_success()?;
                Ok(ProxyResponse {
                    status_code: response.status_code,
                    data: response.data,
                    headers: response.headers,
                    response_time_ms: (elapsed_ms * 100.0).round() / 100.0,
                })
            }
            Err(transport_error) => {
                circuit_breaker.record_failure()?;
                event!(
                    Level::WARN,
                    service = service_name,
                    err = transport_error.as_str(),
                    "Backend call failed"
                );
                Err(GatewayError::Backend(format!(
                    "Service {} unavailable: {}",
                    service_name, transport_error
                )))
            }
        }
    }
}
