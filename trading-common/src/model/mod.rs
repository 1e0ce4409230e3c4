// model/mod.rs
pub mod types;
pub mod symbol;

// Re-export main types for easy access
pub use symbol::{QuotePublisher, StreamStats, Symbol};
pub use types::*;
