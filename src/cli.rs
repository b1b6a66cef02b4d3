//! CLI for this application
//!
use crate::error::{GatewayError, Result};
use crate::settings;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, clap::Parser)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("SHRIKE_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("SHRIKE_HTTP_LISTEN_PORT"),
        help = "Port to bind Shrike HTTP server to"
    )]
    pub listen_port: u16,

    // Rate-limiting algorithm for inbound clients
    #[clap(
        long,
        default_value = "token-bucket",
        env("SHRIKE_LIMITER_ALGORITHM"),
        help = "Admission algorithm: 'fixed-window', 'sliding-window', or 'token-bucket'"
    )]
    pub limiter_algorithm: settings::LimiterAlgorithm,

    // Windowed limiter settings: max requests per window
    #[clap(
        long,
        default_value = "100",
        env("SHRIKE_MAX_REQUESTS"),
        help = "Max requests allowed per window (fixed/sliding window algorithms)"
    )]
    pub max_requests: u32,

    // Windowed limiter settings: window length in seconds
    #[clap(
        long,
        default_value = "60",
        env("SHRIKE_WINDOW_SECONDS"),
        help = "Window length in seconds (fixed/sliding window algorithms)"
    )]
    pub window_seconds: u32,

    // Token bucket settings: bucket capacity
    #[clap(
        long,
        default_value = "10",
        env("SHRIKE_BUCKET_CAPACITY"),
        help = "Token bucket capacity (token-bucket algorithm)"
    )]
    pub capacity: u32,

    // Token bucket settings: tokens added per second
    #[clap(
        long,
        default_value = "2.0",
        env("SHRIKE_REFILL_RATE"),
        help = "Tokens added per second (token-bucket algorithm)"
    )]
    pub refill_rate: f64,

    // Circuit breaker: consecutive transport failures before opening
    #[clap(
        long,
        default_value = "5",
        env("SHRIKE_FAILURE_THRESHOLD"),
        help = "Transport failures before a service's circuit opens"
    )]
    pub failure_threshold: u32,

    // Circuit breaker: cool-down before a probe is allowed through
    #[clap(
        long,
        default_value = "30",
        env("SHRIKE_BREAKER_TIMEOUT_SECONDS"),
        help = "Seconds an open circuit waits before admitting a probe"
    )]
    pub breaker_timeout_seconds: u64,

    // Outbound request timeout
    #[clap(
        long,
        default_value = "5",
        env("SHRIKE_REQUEST_TIMEOUT_SECONDS"),
        help = "Timeout in seconds for proxied backend requests"
    )]
    pub request_timeout_seconds: u64,

    // Backend service registrations
    #[clap(
        long = "service",
        env("SHRIKE_SERVICES"),
        value_delimiter = ',',
        help = "Backend registration as name=url (repeatable, e.g. --service users=http://localhost:8001)"
    )]
    pub services: Vec<String>,
}

impl Cli {
    pub fn into_settings(self) -> Result<settings::Settings> {
        let mut services = Vec::with_capacity(self.services.len());
        for entry in &self.services {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                GatewayError::Config(format!(
                    "Invalid service registration '{}': expected name=url",
                    entry
                ))
            })?;
            if name.is_empty() || url.is_empty() {
                return Err(GatewayError::Config(format!(
                    "Invalid service registration '{}': empty name or url",
                    entry
                )));
            }
            services.push((name.to_string(), url.to_string()));
        }

        Ok(settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            limiter_algorithm: self.limiter_algorithm,
            limiter: settings::LimiterSettings {
                max_requests: self.max_requests,
                window_seconds: self.window_seconds,
                capacity: self.capacity,
                refill_rate: self.refill_rate,
            },
            breaker: settings::BreakerSettings {
                failure_threshold: self.failure_threshold,
                timeout_seconds: self.breaker_timeout_seconds,
            },
            proxy: settings::ProxySettings {
                request_timeout_seconds: self.request_timeout_seconds,
            },
            services,
        })
    }
}
