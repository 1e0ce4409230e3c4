pub mod errors;
pub mod lifecycle;
pub mod quote_bridge;
pub mod registry;
pub mod translator;
pub mod types;


// Re-export main interfaces
pub use errors::PlatformError;
pub use lifecycle::{Platform, PlatformProvider};
pub use quote_bridge::QuoteBridge;
pub use registry::SymbolRegistry;
pub use translator::{order_type_for, OrderId};
pub use types::*;
