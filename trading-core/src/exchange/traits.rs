// exchange/traits.rs

use super::{ChannelKind, ExchangeError, ExchangeOrder, ExchangePosition, OrderType, RawTick};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Authenticated exchange connection consumed by the platform
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Open the streaming connection
    async fn connect(&self) -> Result<(), ExchangeError>;

    /// Register a sink for a channel. Raw ticks for `pair` are sent to `sink`
    /// for as long as the connection lives.
    async fn subscribe(&self, channel: ChannelKind, pair: &str, sink: mpsc::Sender<RawTick>);

    /// Inbound message pump. Returns when the connection ends; every
    /// registered sink is dropped on return.
    async fn run(&self) -> Result<(), ExchangeError>;

    /// Close the streaming connection
    async fn close(&self) -> Result<(), ExchangeError>;

    async fn create_order(
        &self,
        pair: &str,
        amount: f64,
        price: f64,
        order_type: OrderType,
    ) -> Result<ExchangeOrder, ExchangeError>;

    async fn cancel_order(&self, id: i64) -> Result<(), ExchangeError>;

    async fn cancel_all_orders(&self) -> Result<(), ExchangeError>;

    async fn positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError>;
}
