use std::fmt;

use crate::config::PlatformSettings;
use trading_common::model::AssetClass;

/// Lifecycle of a platform instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    Uninitialized,
    Connecting,
    Running,
    Closed,
}

impl fmt::Display for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformState::Uninitialized => "uninitialized",
            PlatformState::Connecting => "connecting",
            PlatformState::Running => "running",
            PlatformState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Symbol registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Asset class tagged on every registered symbol
    pub asset_class: AssetClass,
    /// Price increment of registered symbols
    pub tick_size: f64,
    /// Quotes held for a consumer that is not receiving
    pub quote_buffer: usize,
    /// Raw ticks held between the exchange and a bridge
    pub tick_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            asset_class: AssetClass::Fx,
            tick_size: 0.01,
            quote_buffer: 1,
            tick_buffer: 16,
        }
    }
}

impl From<&PlatformSettings> for RegistryConfig {
    fn from(settings: &PlatformSettings) -> Self {
        Self {
            asset_class: AssetClass::Fx,
            tick_size: settings.tick_size,
            quote_buffer: settings.quote_buffer,
            tick_buffer: settings.tick_buffer,
        }
    }
}

/// Quote bridge counters for one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStats {
    pub symbol: String,
    /// Quotes accepted by the stream
    pub published: u64,
    /// Quotes discarded because the consumer was not keeping up
    pub dropped: u64,
    /// Ticks skipped for missing fields
    pub malformed: u64,
}
