// =================================================================
// exchange/types.rs - Data Structures
// =================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-native ticker update: fixed-position numeric fields
/// (index 0 = bid, 1 = bid size, 2 = ask, 3 = ask size, ...)
pub type RawTick = Vec<f64>;

/// Public websocket channels the platform subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Ticker,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Ticker => "ticker",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange order type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Limit,
    Stop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order acknowledged by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOrder {
    pub id: i64,
    pub symbol: String,
    pub price: f64,
    pub side: String,
    pub order_type: String,
}

/// Position as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePosition {
    pub id: i64,
    pub symbol: String,
    pub status: String,
    /// Base (entry) price
    pub base: f64,
    pub amount: f64,
}

/// Bitfinex websocket subscription request
#[derive(Debug, Serialize)]
pub struct BitfinexSubscribeMessage {
    pub event: String,
    pub channel: String,
    pub pair: String,
}

impl BitfinexSubscribeMessage {
    pub fn new(channel: ChannelKind, pair: &str) -> Self {
        Self {
            event: "subscribe".to_string(),
            channel: channel.as_str().to_string(),
            pair: pair.to_string(),
        }
    }
}

/// Websocket control events (JSON objects carrying an `event` field)
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BitfinexEvent {
    Info {
        #[serde(default)]
        version: Option<f64>,
    },
    Subscribed {
        channel: String,
        #[serde(rename = "chanId")]
        chan_id: u64,
        pair: String,
    },
    Unsubscribed {
        #[serde(rename = "chanId")]
        chan_id: u64,
    },
    Error {
        #[serde(default)]
        msg: String,
        #[serde(default)]
        code: Option<i64>,
    },
    Pong,
}

/// Websocket channel data (JSON arrays led by a channel id)
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Heartbeat { chan_id: u64 },
    Tick { chan_id: u64, tick: RawTick },
}

/// `POST /v1/order/new` request body (without auth fields)
#[derive(Debug, Serialize)]
pub struct BitfinexNewOrder {
    pub symbol: String,
    pub amount: String,
    pub price: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub exchange: String,
}

/// `POST /v1/order/new` response
#[derive(Debug, Deserialize)]
pub struct BitfinexOrderResponse {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub side: String,
    #[serde(rename = "type", default)]
    pub order_type: String,
}

/// `POST /v1/positions` entry; numbers are sent as strings
#[derive(Debug, Deserialize, Clone)]
pub struct BitfinexPosition {
    pub id: i64,
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    pub base: String,
    pub amount: String,
}

/// Authenticated REST payload: request path and nonce merged with the body
#[derive(Debug, Serialize)]
pub struct BitfinexAuthPayload<T: Serialize> {
    pub request: String,
    pub nonce: String,
    #[serde(flatten)]
    pub body: T,
}

/// `POST /v1/order/cancel` request body
#[derive(Debug, Serialize)]
pub struct BitfinexCancelOrder {
    pub order_id: i64,
}

/// Body for authenticated requests that take no parameters
#[derive(Debug, Serialize)]
pub struct EmptyBody {}
