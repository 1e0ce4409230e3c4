// =================================================================
// exchange/bitfinex.rs - Bitfinex Exchange Client
// =================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::{
    errors::ExchangeError,
    traits::ExchangeClient,
    types::{
        BitfinexAuthPayload, BitfinexCancelOrder, BitfinexEvent, BitfinexOrderResponse,
        BitfinexPosition, BitfinexSubscribeMessage, ChannelKind, ChannelMessage, EmptyBody,
        ExchangeOrder, ExchangePosition, OrderType, RawTick,
    },
    utils::{
        build_new_order, convert_bitfinex_order, convert_bitfinex_position, encode_payload,
        parse_channel_message, sign_payload,
    },
};

// Constants
pub const BITFINEX_WS_URL: &str = "wss://api.bitfinex.com/ws";
pub const BITFINEX_API_URL: &str = "https://api.bitfinex.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A channel registration waiting to be sent or confirmed
#[derive(Debug)]
struct Subscription {
    channel: ChannelKind,
    pair: String,
    sink: mpsc::Sender<RawTick>,
}

impl Subscription {
    fn key(&self) -> (ChannelKind, String) {
        (self.channel, self.pair.to_uppercase())
    }
}

#[derive(Debug, Default)]
struct SubscriptionState {
    /// Registered before the pump started
    pending: Vec<Subscription>,
    /// Forwarding channel into a running pump
    live: Option<mpsc::UnboundedSender<Subscription>>,
    /// The pump has ended or the client was closed
    ended: bool,
}

/// Routes channel data to the sink registered for its channel id
#[derive(Debug, Default)]
struct SubscriptionRouter {
    awaiting: HashMap<(ChannelKind, String), Subscription>,
    channels: HashMap<u64, Subscription>,
}

impl SubscriptionRouter {
    fn expect(&mut self, sub: Subscription) {
        self.awaiting.insert(sub.key(), sub);
    }

    async fn dispatch(&mut self, text: &str) -> Result<(), ExchangeError> {
        let value: Value = serde_json::from_str(text)?;

        if value.is_object() {
            self.handle_event(value);
            return Ok(());
        }

        match parse_channel_message(&value)? {
            ChannelMessage::Heartbeat { chan_id } => {
                trace!("Heartbeat on channel {}", chan_id);
            }
            ChannelMessage::Tick { chan_id, tick } => {
                let Some(sub) = self.channels.get(&chan_id) else {
                    warn!("Data for unknown channel {}", chan_id);
                    return Ok(());
                };
                if sub.sink.send(tick).await.is_err() {
                    debug!("Sink for {} {} is gone, dropping channel {}", sub.channel, sub.pair, chan_id);
                    self.channels.remove(&chan_id);
                }
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, value: Value) {
        match serde_json::from_value::<BitfinexEvent>(value.clone()) {
            Ok(BitfinexEvent::Subscribed { channel, chan_id, pair }) => {
                let key = match channel.as_str() {
                    "ticker" => (ChannelKind::Ticker, pair.to_uppercase()),
                    other => {
                        warn!("Subscribed to unexpected channel {} for {}", other, pair);
                        return;
                    }
                };
                match self.awaiting.remove(&key) {
                    Some(sub) => {
                        info!("Subscribed to {} {} on channel {}", channel, pair, chan_id);
                        self.channels.insert(chan_id, sub);
                    }
                    None => warn!("Unexpected subscription confirmation for {} {}", channel, pair),
                }
            }
            Ok(BitfinexEvent::Unsubscribed { chan_id }) => {
                info!("Unsubscribed from channel {}", chan_id);
                self.channels.remove(&chan_id);
            }
            Ok(BitfinexEvent::Info { version }) => {
                info!("Bitfinex websocket info (version {:?})", version);
            }
            Ok(BitfinexEvent::Error { msg, code }) => {
                error!("Bitfinex websocket error {:?}: {}", code, msg);
            }
            Ok(BitfinexEvent::Pong) => debug!("Received pong"),
            Err(_) => debug!("Ignoring control message: {}", value),
        }
    }
}

/// Bitfinex v1 client: public ticker stream over websocket plus
/// authenticated REST order and position calls
pub struct BitfinexClient {
    ws_url: String,
    api_url: String,
    api_key: String,
    api_secret: String,
    client: reqwest::Client,
    request_timeout: Duration,
    connection: Mutex<Option<WsStream>>,
    subscriptions: Mutex<SubscriptionState>,
    shutdown_tx: watch::Sender<bool>,
    last_nonce: AtomicU64,
}

impl BitfinexClient {
    /// Create a new client authenticated with the given key pair
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            ws_url: BITFINEX_WS_URL.to_string(),
            api_url: BITFINEX_API_URL.to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            client: reqwest::Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection: Mutex::new(None),
            subscriptions: Mutex::new(SubscriptionState::default()),
            shutdown_tx,
            last_nonce: AtomicU64::new(0),
        }
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Strictly increasing nonce in microseconds
    fn next_nonce(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let mut last = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_nonce
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Signed POST against the v1 REST API
    async fn authenticated_post<B, R>(&self, path: &str, body: B) -> Result<R, ExchangeError>
    where
        B: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let payload = BitfinexAuthPayload {
            request: path.to_string(),
            nonce: self.next_nonce().to_string(),
            body,
        };
        let payload_json = serde_json::to_string(&payload)?;
        let encoded = encode_payload(&payload_json);
        let signature = sign_payload(&self.api_secret, &encoded)?;

        let url = format!("{}{}", self.api_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("X-BFX-APIKEY", &self.api_key)
            .header("X-BFX-PAYLOAD", encoded)
            .header("X-BFX-SIGNATURE", signature)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Drain registrations that will never be served; their sinks close
    async fn finish_subscriptions(&self) {
        let mut state = self.subscriptions.lock().await;
        state.ended = true;
        state.live = None;
        let abandoned = std::mem::take(&mut state.pending);
        if !abandoned.is_empty() {
            debug!("Dropping {} unsent subscriptions", abandoned.len());
        }
    }

    async fn send_subscribe(
        write: &mut futures_util::stream::SplitSink<WsStream, Message>,
        sub: &Subscription,
    ) -> Result<(), ExchangeError> {
        let msg = BitfinexSubscribeMessage::new(sub.channel, &sub.pair);
        let json = serde_json::to_string(&msg)?;
        write.send(Message::Text(json)).await?;
        debug!("Subscription sent for {} {}", sub.channel, sub.pair);
        Ok(())
    }

    async fn pump(&self, ws_stream: WsStream) -> Result<(), ExchangeError> {
        let (mut write, mut read) = ws_stream.split();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let mut router = SubscriptionRouter::default();

        let initial = {
            let mut state = self.subscriptions.lock().await;
            state.live = Some(cmd_tx);
            std::mem::take(&mut state.pending)
        };

        info!("Subscribing to {} channels", initial.len());
        for sub in initial {
            Self::send_subscribe(&mut write, &sub).await?;
            router.expect(sub);
        }

        if *shutdown_rx.borrow() {
            info!("Client closed before the message pump started");
            return Ok(());
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = router.dispatch(&text).await {
                                warn!("Parse error: {}", e);
                            }
                        }
                        // tungstenite queues the pong itself
                        Some(Ok(Message::Ping(_))) => trace!("Ping received"),
                        Some(Ok(Message::Close(_))) => {
                            info!("WebSocket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            return Err(ExchangeError::WebSocketError(e.to_string()));
                        }
                        None => {
                            info!("WebSocket stream ended");
                            break;
                        }
                        _ => continue,
                    }
                }
                Some(sub) = cmd_rx.recv() => {
                    Self::send_subscribe(&mut write, &sub).await?;
                    router.expect(sub);
                }
                _ = shutdown_rx.changed() => {
                    info!("Close requested, closing WebSocket gracefully");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!("Failed to send close frame: {}", e);
                    }
                    break;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ExchangeClient for BitfinexClient {
    async fn connect(&self) -> Result<(), ExchangeError> {
        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| ExchangeError::WebSocketError(format!("Failed to connect: {}", e)))?;

        info!("WebSocket connected to {}", self.ws_url);
        *self.connection.lock().await = Some(ws_stream);
        Ok(())
    }

    async fn subscribe(&self, channel: ChannelKind, pair: &str, sink: mpsc::Sender<RawTick>) {
        let sub = Subscription {
            channel,
            pair: pair.to_string(),
            sink,
        };

        let mut state = self.subscriptions.lock().await;
        if state.ended {
            warn!("Connection ended, {} {} will not receive data", channel, pair);
            return;
        }

        if let Some(live) = &state.live {
            if let Err(mpsc::error::SendError(sub)) = live.send(sub) {
                warn!("Message pump gone, {} {} will not receive data", sub.channel, sub.pair);
            }
            return;
        }

        state.pending.push(sub);
    }

    async fn run(&self) -> Result<(), ExchangeError> {
        let ws_stream = self
            .connection
            .lock()
            .await
            .take()
            .ok_or_else(|| ExchangeError::NotConnected("connect() must succeed before run()".to_string()))?;

        let result = self.pump(ws_stream).await;
        self.finish_subscriptions().await;

        match &result {
            Ok(()) => info!("Bitfinex message pump stopped"),
            Err(e) => error!("Bitfinex message pump failed: {}", e),
        }
        result
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        self.shutdown_tx.send_replace(true);

        // A connection that never reached the pump is closed here
        if let Some(mut ws_stream) = self.connection.lock().await.take() {
            ws_stream.close(None).await?;
        }

        self.finish_subscriptions().await;
        Ok(())
    }

    async fn create_order(
        &self,
        pair: &str,
        amount: f64,
        price: f64,
        order_type: OrderType,
    ) -> Result<ExchangeOrder, ExchangeError> {
        let body = build_new_order(pair, amount, price, order_type);
        let response: BitfinexOrderResponse =
            self.authenticated_post("/v1/order/new", body).await?;
        let order = convert_bitfinex_order(response)?;

        info!("Created {} order {} for {}", order_type, order.id, pair);
        Ok(order)
    }

    async fn cancel_order(&self, id: i64) -> Result<(), ExchangeError> {
        let _: Value = self
            .authenticated_post("/v1/order/cancel", BitfinexCancelOrder { order_id: id })
            .await?;
        info!("Cancelled order {}", id);
        Ok(())
    }

    async fn cancel_all_orders(&self) -> Result<(), ExchangeError> {
        let _: Value = self
            .authenticated_post("/v1/order/cancel/all", EmptyBody {})
            .await?;
        info!("Cancelled all orders");
        Ok(())
    }

    async fn positions(&self) -> Result<Vec<ExchangePosition>, ExchangeError> {
        let raw: Vec<BitfinexPosition> = self.authenticated_post("/v1/positions", EmptyBody {}).await?;

        raw.into_iter().map(convert_bitfinex_position).collect()
    }
}
