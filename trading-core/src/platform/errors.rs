use thiserror::Error;

use crate::config::SettingsError;
use crate::exchange::ExchangeError;

/// Platform layer error types
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("Platform is closed")]
    Closed,

    #[error("Platform startup failed: {0}")]
    Startup(String),

    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),
}

impl PlatformError {
    /// Check if error must terminate the process
    pub fn is_fatal(&self) -> bool {
        match self {
            PlatformError::Startup(_) => true,
            PlatformError::Config(_) => true,
            PlatformError::Exchange(_) => false,
            PlatformError::InvalidSymbol(_) => false,
            PlatformError::InvalidOrderId(_) => false,
            PlatformError::Closed => false,
        }
    }
}
