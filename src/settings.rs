//! Shrike application settings
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 8410;
pub const DEFAULT_PORT_HTTP: &str = "8410";

/// Which admission-control algorithm the gateway runs for inbound clients
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimiterAlgorithm {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
}

impl std::fmt::Display for LimiterAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimiterAlgorithm::FixedWindow => write!(f, "fixed-window"),
            LimiterAlgorithm::SlidingWindow => write!(f, "sliding-window"),
            LimiterAlgorithm::TokenBucket => write!(f, "token-bucket"),
        }
    }
}

impl std::str::FromStr for LimiterAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed-window" | "fixed_window" => Ok(LimiterAlgorithm::FixedWindow),
            "sliding-window" | "sliding_window" => Ok(LimiterAlgorithm::SlidingWindow),
            "token-bucket" | "token_bucket" => Ok(LimiterAlgorithm::TokenBucket),
            _ => Err(format!("Invalid limiter algorithm: {}", s)),
        }
    }
}

/// Settings shared by the windowed rate limiters and the token bucket.
/// Windowed algorithms read `max_requests`/`window_seconds`; the token
/// bucket reads `capacity`/`refill_rate`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LimiterSettings {
    pub max_requests: u32,
    pub window_seconds: u32,
    pub capacity: u32,
    pub refill_rate: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
            capacity: 10,
            refill_rate: 2.0,
        }
    }
}

impl LimiterSettings {
    pub fn window_millis(&self) -> i64 {
        i64::from(self.window_seconds) * 1000
    }
}

/// Per-service circuit breaker settings
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_seconds: 30,
        }
    }
}

impl BreakerSettings {
    pub fn timeout_millis(&self) -> i64 {
        self.timeout_seconds as i64 * 1000
    }
}

/// Outbound proxying settings
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProxySettings {
    pub request_timeout_seconds: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    // Admission-control algorithm for inbound clients
    pub limiter_algorithm: LimiterAlgorithm,

    pub limiter: LimiterSettings,
    pub breaker: BreakerSettings,
    pub proxy: ProxySettings,

    // Backend registrations: (service name, backend url)
    pub services: Vec<(String, String)>,
}
