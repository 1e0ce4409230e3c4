// =================================================================
// platform/translator.rs - Order and Position Translation
// =================================================================

use tracing::{debug, info};

use super::lifecycle::Platform;
use super::PlatformError;
use crate::exchange::OrderType;
use trading_common::model::{Order, Orders, Position, Positions};

/// Identifier assigned to an accepted order
pub type OrderId = u64;

/// Map the internal order kind to the exchange order type
pub fn order_type_for(order: &Order) -> OrderType {
    if order.is_stop {
        OrderType::Stop
    } else {
        OrderType::Limit
    }
}

impl Platform {
    /// Place a limit or stop order; market orders are not supported
    pub async fn place_order(&self, order: &Order) -> Result<OrderId, PlatformError> {
        self.ensure_open()?;

        let order_type = order_type_for(order);
        let placed = self
            .client
            .create_order(order.symbol.name(), order.amount, order.price, order_type)
            .await?;

        let id = OrderId::try_from(placed.id).map_err(|_| {
            PlatformError::InvalidOrderId(format!("exchange returned id {}", placed.id))
        })?;

        info!(
            "Placed {} {} order {} for {} {} @ {}",
            if order.is_buy() { "buy" } else { "sell" },
            order_type,
            id,
            order.amount,
            order.symbol.name(),
            order.price
        );
        Ok(id)
    }

    pub async fn cancel_order(&self, id: OrderId) -> Result<(), PlatformError> {
        self.ensure_open()?;

        let exchange_id = i64::try_from(id)
            .map_err(|_| PlatformError::InvalidOrderId(format!("{} does not fit the exchange id", id)))?;

        self.client.cancel_order(exchange_id).await?;
        Ok(())
    }

    pub async fn cancel_all_orders(&self) -> Result<(), PlatformError> {
        self.ensure_open()?;
        self.client.cancel_all_orders().await?;
        Ok(())
    }

    /// Not supported by the exchange integration: reports success and
    /// changes nothing
    pub async fn modify_order(&self, id: OrderId, order: &Order) -> Result<(), PlatformError> {
        debug!(
            "Order modification is not supported, ignoring request for {} ({})",
            id,
            order.symbol.name()
        );
        Ok(())
    }

    /// Not supported by the exchange integration: always empty
    pub async fn list_orders(&self) -> Result<Orders, PlatformError> {
        Ok(Orders::new())
    }

    /// Fetch positions fresh from the exchange.
    ///
    /// Each position's symbol is resolved through the registry, so unseen
    /// symbols get subscribed. The first resolution error aborts the call.
    pub async fn list_positions(&self) -> Result<Positions, PlatformError> {
        self.ensure_open()?;

        let raw = self.client.positions().await?;
        let mut positions = Positions::with_capacity(raw.len());

        for one in raw {
            let symbol = self.registry.resolve(&one.symbol).await?;
            positions.push(Position {
                symbol,
                amount: one.amount,
                price: one.base,
            });
        }

        Ok(positions)
    }
}
