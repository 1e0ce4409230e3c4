// exchange/mod.rs
pub mod traits;
pub mod types;
pub mod errors;
pub mod bitfinex;
pub mod utils;

// Re-export main interfaces for easy access
pub use traits::ExchangeClient;
pub use types::*;
pub use errors::ExchangeError;
pub use bitfinex::BitfinexClient;
