pub mod api;
pub mod breaker;
pub mod cli;
pub mod error;
pub mod limiters;
pub mod proxy;
pub mod registry;
pub mod settings;

pub use error::{GatewayError, Result};
