// =================================================================
// model/types.rs - Trading Model Value Types
// =================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::symbol::Symbol;

/// Asset class tag carried by every symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Fx,
    Crypto,
    Equity,
    Commodity,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Fx => write!(f, "FX"),
            AssetClass::Crypto => write!(f, "CRYPTO"),
            AssetClass::Equity => write!(f, "EQUITY"),
            AssetClass::Commodity => write!(f, "COMMODITY"),
        }
    }
}

/// Top of book for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quotes {
    pub bid: f64,
    pub ask: f64,
}

impl Quotes {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Order as submitted by a strategy.
///
/// The sign of `amount` carries the side: positive buys, negative sells.
#[derive(Debug, Clone)]
pub struct Order {
    pub symbol: Arc<Symbol>,
    pub amount: f64,
    pub price: f64,
    pub is_stop: bool,
}

impl Order {
    pub fn limit(symbol: Arc<Symbol>, amount: f64, price: f64) -> Self {
        Self {
            symbol,
            amount,
            price,
            is_stop: false,
        }
    }

    pub fn stop(symbol: Arc<Symbol>, amount: f64, price: f64) -> Self {
        Self {
            symbol,
            amount,
            price,
            is_stop: true,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.amount > 0.0
    }
}

/// Open position as reported by the platform
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: Arc<Symbol>,
    pub amount: f64,
    pub price: f64,
}

pub type Orders = Vec<Order>;
pub type Positions = Vec<Position>;
