use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{event, instrument, Level};

use super::paths;
use super::state::GatewayState;
use crate::error::{GatewayError, Result};
use crate::limiters::RateLimiter;

/// Headers the gateway strips before forwarding; the transport sets its own
const DROPPED_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Client identifier for rate-limit bucketing: the API key when one is
/// presented, the peer IP otherwise
fn client_key(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|key| format!("key:{}", key))
        .unwrap_or_else(|| format!("ip:{}", addr.ip()))
}

fn forwarded_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !DROPPED_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Drop per-key limiter state that no longer constrains admission.
/// Deployments call this periodically to keep memory bounded.
#[instrument(skip(state))]
pub async fn expire_keys(State(state): State<GatewayState>) -> Result<StatusCode> {
    let expired = state.limiter.expire_keys()?;
    event!(Level::DEBUG, expired, "Swept stale limiter keys");
    Ok(StatusCode::OK)
}

/// Admission-controlled proxy endpoint. Rejected clients get a 429 with
/// `remaining` and `retry_after_seconds` fields; admitted requests are
/// forwarded and the backend's status code and payload come back through.
#[instrument(skip(state, headers, body), fields(service = %service))]
pub async fn proxy(
    Path((service, path)): Path<(String, String)>,
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let key = client_key(&headers, &addr);
    if !state.limiter.allow_request(&key)? {
        let remaining = state.limiter.remaining_requests(&key)?;
        let retry_after = state.limiter.retry_after_seconds(&key)?;
        event!(
            Level::DEBUG,
            client = key.as_str(),
            retry_after,
            "Rate limit exceeded"
        );
        return Err(GatewayError::RateLimit {
            detail: format!("client {} is over its request budget", key),
            remaining,
            retry_after_seconds: (retry_after * 100.0).round() / 100.0,
        });
    }

    let body = if body.is_empty() {
        None
    } else {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::Config(format!("Request body must be JSON: {}", e)))?;
        Some(value)
    };

    let response = state
        .proxy
        .proxy_request(
            &service,
            &paths::ensure_leading_slash(&path),
            method,
            forwarded_headers(&headers),
            body,
        )
        .await?;

    let status = StatusCode::from_u16(response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(response.data)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_prefers_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "user_key_123".parse().unwrap());
        let addr: SocketAddr = "10.0.0.1:55555".parse().unwrap();
        assert_eq!(client_key(&headers, &addr), "key:user_key_123");
    }

    #[test]
    fn client_key_falls_back_to_ip() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "10.0.0.1:55555".parse().unwrap();
        assert_eq!(client_key(&headers, &addr), "ip:10.0.0.1");
    }

    #[test]
    fn hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "gateway:8410".parse().unwrap());
        headers.insert("content-length", "42".parse().unwrap());
        headers.insert("x-request-id", "abc".parse().unwrap());

        let forwarded = forwarded_headers(&headers);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded["x-request-id"], "abc");
    }
}
