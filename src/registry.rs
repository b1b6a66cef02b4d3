//! Service registry with round-robin load balancing.
//!
//! Maps logical service names to backend URL lists and owns one circuit
//! breaker per service. Registration is expected at startup/configuration
//! time; it takes the registry write lock and is not designed for live
//! reconfiguration alongside traffic.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::breaker::{BreakerStatus, CircuitBreaker};
use crate::error::{GatewayError, Result};
use crate::settings::BreakerSettings;

#[derive(Debug)]
struct ServiceEntry {
    urls: RwLock<Vec<String>>,
    // Round-robin cursor; fetch_add keeps selection strictly alternating
    // without taking the URL lock for writing
    cursor: AtomicUsize,
    breaker: Arc<CircuitBreaker>,
}

impl ServiceEntry {
    fn new(breaker_settings: BreakerSettings) -> Self {
        Self {
            urls: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            breaker: Arc::new(CircuitBreaker::new(breaker_settings)),
        }
    }
}

/// Diagnostic snapshot of one service for health endpoints
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServiceSnapshot {
    pub urls: Vec<String>,
    pub circuit_breaker: BreakerStatus,
}

#[derive(Debug)]
pub struct ServiceRegistry {
    breaker_settings: BreakerSettings,
    services: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new(breaker_settings: BreakerSettings) -> Self {
        Self {
            breaker_settings,
            services: RwLock::new(HashMap::new()),
        }
    }

    fn read_services(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ServiceEntry>>>> {
        self.services.read().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire registry read lock: {}", e))
        })
    }

    /// Fetch the entry for `name`, creating it on first reference
    fn entry_or_create(&self, name: &str) -> Result<Arc<ServiceEntry>> {
        {
            let services = self.read_services()?;
            if let Some(entry) = services.get(name) {
                return Ok(entry.clone());
            }
        }
        let mut services = self.services.write().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire registry write lock: {}", e))
        })?;
        let entry = services
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ServiceEntry::new(self.breaker_settings)));
        Ok(entry.clone())
    }

    /// Idempotently add a backend URL for `name`
    pub fn register_service(&self, name: &str, url: &str) -> Result<()> {
        let entry = self.entry_or_create(name)?;
        let mut urls = entry.urls.write().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire service url lock: {}", e))
        })?;
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
        Ok(())
    }

    /// Round-robin selection over the service's backends.
    /// `None` when the service is unknown or has no registered instances.
    pub fn get_service_url(&self, name: &str) -> Result<Option<String>> {
        let entry = {
            let services = self.read_services()?;
            match services.get(name) {
                Some(entry) => entry.clone(),
                None => return Ok(None),
            }
        };
        let urls = entry.urls.read().map_err(|e| {
            GatewayError::Concurrency(format!("Failed to acquire service url lock: {}", e))
        })?;
        if urls.is_empty() {
            return Ok(None);
        }
        let index = entry.cursor.fetch_add(1, Ordering::Relaxed) % urls.len();
        Ok(Some(urls[index].clone()))
    }

    /// Get or lazily create the circuit breaker for `name`.
    /// A breaker exists even for names with no registered backend.
    pub fn get_circuit_breaker(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        let entry = self.entry_or_create(name)?;
        Ok(entry.breaker.clone())
    }

    /// Snapshot of every registered service and its breaker status
    pub fn get_all_services(&self) -> Result<HashMap<String, ServiceSnapshot>> {
        let services = self.read_services()?;
        let mut snapshot = HashMap::with_capacity(services.len());
        for (name, entry) in services.iter() {
            let urls = entry
                .urls
                .read()
                .map_err(|e| {
                    GatewayError::Concurrency(format!(
                        "Failed to acquire service url lock: {}",
                        e
                    ))
                })?
                .clone();
            snapshot.insert(
                name.clone(),
                ServiceSnapshot {
                    urls,
                    circuit_breaker: entry.breaker.status()?,
                },
            );
        }
        Ok(snapshot)
    }
}
