// =================================================================
// exchange/errors.rs - Bitfinex Client Errors
// =================================================================

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures reported by an exchange client
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Malformed exchange payload: {0}")]
    ParseError(String),

    #[error("Request timed out")]
    Timeout,

    /// Rejection or unexpected reply from the REST API
    #[error("Bitfinex API error: {0}")]
    ApiError(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<tungstenite::Error> for ExchangeError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                ExchangeError::NotConnected("websocket closed".to_string())
            }
            tungstenite::Error::Io(e) => ExchangeError::NetworkError(e.to_string()),
            other => ExchangeError::WebSocketError(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::ApiError(err.to_string())
        }
    }
}
