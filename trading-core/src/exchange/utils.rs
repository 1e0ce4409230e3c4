// =================================================================
// exchange/utils.rs - Utility Functions
// =================================================================

use super::{
    BitfinexNewOrder, BitfinexOrderResponse, BitfinexPosition, ChannelMessage, ExchangeError,
    ExchangeOrder, ExchangePosition, OrderType, RawTick,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha384;

type HmacSha384 = Hmac<Sha384>;

/// Validate and normalize a Bitfinex pair name (e.g. "btcusd" -> "BTCUSD")
pub fn validate_bitfinex_symbol(symbol: &str) -> Result<String, ExchangeError> {
    if symbol.is_empty() {
        return Err(ExchangeError::InvalidSymbol("Symbol cannot be empty".to_string()));
    }

    let symbol = symbol.to_uppercase();

    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ExchangeError::InvalidSymbol(format!(
            "Symbol '{}' contains invalid characters",
            symbol
        )));
    }

    if symbol.len() < 3 || symbol.len() > 20 {
        return Err(ExchangeError::InvalidSymbol(format!(
            "Symbol '{}' has invalid length",
            symbol
        )));
    }

    Ok(symbol)
}

/// Parse a websocket channel array: `[chanId, "hb"]`, `[chanId, f64...]`
/// or a snapshot wrapped as `[chanId, [f64...]]`
pub fn parse_channel_message(value: &Value) -> Result<ChannelMessage, ExchangeError> {
    let items = value
        .as_array()
        .ok_or_else(|| ExchangeError::ParseError("Channel message is not an array".to_string()))?;

    let chan_id = items
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| ExchangeError::ParseError("Missing channel id".to_string()))?;

    let payload = &items[1..];

    match payload.first() {
        Some(Value::String(s)) if s == "hb" => Ok(ChannelMessage::Heartbeat { chan_id }),
        Some(Value::Array(nested)) if payload.len() == 1 => Ok(ChannelMessage::Tick {
            chan_id,
            tick: parse_numbers(nested)?,
        }),
        Some(_) => Ok(ChannelMessage::Tick {
            chan_id,
            tick: parse_numbers(payload)?,
        }),
        None => Err(ExchangeError::ParseError(format!(
            "Empty payload on channel {}",
            chan_id
        ))),
    }
}

fn parse_numbers(values: &[Value]) -> Result<RawTick, ExchangeError> {
    values
        .iter()
        .map(|v| match v {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ExchangeError::ParseError(format!("Invalid number: {}", n))),
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|e| ExchangeError::ParseError(format!("Invalid number '{}': {}", s, e))),
            other => Err(ExchangeError::ParseError(format!(
                "Unexpected tick field: {}",
                other
            ))),
        })
        .collect()
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, ExchangeError> {
    value
        .parse::<f64>()
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {} '{}': {}", field, value, e)))
}

/// Build the order body; the sign of `amount` selects the side
pub fn build_new_order(pair: &str, amount: f64, price: f64, order_type: OrderType) -> BitfinexNewOrder {
    let side = if amount < 0.0 { "sell" } else { "buy" };

    BitfinexNewOrder {
        symbol: pair.to_lowercase(),
        amount: amount.abs().to_string(),
        price: price.to_string(),
        side: side.to_string(),
        order_type: order_type.as_str().to_string(),
        exchange: "bitfinex".to_string(),
    }
}

/// Convert the order acknowledgement to the adapter's order type
pub fn convert_bitfinex_order(msg: BitfinexOrderResponse) -> Result<ExchangeOrder, ExchangeError> {
    let id = msg
        .order_id
        .or(msg.id)
        .ok_or_else(|| ExchangeError::ParseError("Order response without id".to_string()))?;

    let price = if msg.price.is_empty() {
        0.0
    } else {
        parse_decimal("price", &msg.price)?
    };

    Ok(ExchangeOrder {
        id,
        symbol: msg.symbol,
        price,
        side: msg.side,
        order_type: msg.order_type,
    })
}

/// Convert a reported position to the adapter's position type
pub fn convert_bitfinex_position(msg: BitfinexPosition) -> Result<ExchangePosition, ExchangeError> {
    Ok(ExchangePosition {
        id: msg.id,
        base: parse_decimal("base", &msg.base)?,
        amount: parse_decimal("amount", &msg.amount)?,
        symbol: msg.symbol,
        status: msg.status,
    })
}

/// Base64-encode a JSON payload for the `X-BFX-PAYLOAD` header
pub fn encode_payload(json: &str) -> String {
    BASE64.encode(json.as_bytes())
}

/// HMAC-SHA384 of the encoded payload, hex encoded, for `X-BFX-SIGNATURE`
pub fn sign_payload(secret: &str, encoded_payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Authentication(e.to_string()))?;
    mac.update(encoded_payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
