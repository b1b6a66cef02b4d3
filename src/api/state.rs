use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::limiters::{build_limiter, RateLimiter};
use crate::proxy::GatewayProxy;
use crate::registry::ServiceRegistry;
use crate::settings::Settings;

/// Shared application state: one limiter, one registry, one proxy per
/// gateway process, passed explicitly to every handler
#[derive(Clone)]
pub struct GatewayState {
    pub limiter: Arc<dyn RateLimiter>,
    pub registry: Arc<ServiceRegistry>,
    pub proxy: Arc<GatewayProxy>,
}

impl GatewayState {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        registry: Arc<ServiceRegistry>,
        proxy: Arc<GatewayProxy>,
    ) -> Self {
        Self {
            limiter,
            registry,
            proxy,
        }
    }

    /// Wire up limiter, registry, and proxy from parsed settings,
    /// registering the configured backends
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let limiter = build_limiter(settings.limiter_algorithm, settings.limiter.clone());
        let registry = Arc::new(ServiceRegistry::new(settings.breaker));
        for (name, url) in &settings.services {
            registry.register_service(name, url)?;
            info!("Registered service '{}' -> {}", name, url);
        }
        let proxy = Arc::new(GatewayProxy::with_reqwest(
            registry.clone(),
            settings.proxy,
        )?);
        Ok(Self::new(limiter, registry, proxy))
    }
}
