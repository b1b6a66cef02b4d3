use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use super::state::GatewayState;
use crate::breaker::CircuitState;
use crate::cli::{APP_NAME, APP_VERSION};
use crate::error::Result;

/// Gateway information: registered services and route map
pub async fn root(State(state): State<GatewayState>) -> Result<Json<Value>> {
    let services = state.registry.get_all_services()?;
    Ok(Json(json!({
        "message": "Shrike API Gateway",
        "services": services,
        "endpoints": {
            "proxy": "/api/{service}/*",
            "health": "/health",
            "services": "/services",
            "about": "/about",
        }
    })))
}

/// Per-service health derived from breaker state: a service is unhealthy
/// while its circuit is open
#[instrument(skip(state))]
pub async fn health(State(state): State<GatewayState>) -> Result<Json<Value>> {
    let services = state.registry.get_all_services()?;
    let mut services_health = serde_json::Map::new();
    let mut all_healthy = true;

    for (name, snapshot) in &services {
        let healthy = snapshot.circuit_breaker.state != CircuitState::Open;
        all_healthy = all_healthy && healthy;
        services_health.insert(
            name.clone(),
            json!({
                "status": snapshot.circuit_breaker.state,
                "healthy": healthy,
            }),
        );
    }

    Ok(Json(json!({
        "gateway": "healthy",
        "services": services_health,
        "overall_status": if all_healthy { "healthy" } else { "degraded" },
    })))
}

/// Full diagnostic snapshot of every registered service
pub async fn services(State(state): State<GatewayState>) -> Result<Json<Value>> {
    let services = state.registry.get_all_services()?;
    Ok(Json(serde_json::to_value(services)?))
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct AboutResponse {
    name: String,
    version: String,
}

impl Default for AboutResponse {
    fn default() -> Self {
        Self {
            name: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
        }
    }
}

#[instrument]
pub async fn about() -> Json<AboutResponse> {
    Json(AboutResponse::default())
}
