// =================================================================
// platform/lifecycle.rs - Platform Context and One-Time Startup
// =================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::registry::SymbolRegistry;
use super::types::{BridgeStats, PlatformState, RegistryConfig};
use super::PlatformError;
use crate::config::{Credentials, PlatformSettings, Settings};
use crate::exchange::{BitfinexClient, ExchangeClient, ExchangeError};
use trading_common::model::Symbol;

/// A connected trading platform backed by one exchange connection
pub struct Platform {
    pub(super) client: Arc<dyn ExchangeClient>,
    pub(super) registry: SymbolRegistry,
    state: Arc<watch::Sender<PlatformState>>,
    pump: Mutex<Option<JoinHandle<Result<(), ExchangeError>>>>,
}

impl Platform {
    /// Connect, subscribe the warm set and start the message pump
    pub async fn start(
        client: Arc<dyn ExchangeClient>,
        settings: &PlatformSettings,
    ) -> Result<Arc<Platform>, PlatformError> {
        Self::start_with_state(client, settings, Arc::new(watch::channel(PlatformState::Uninitialized).0))
            .await
    }

    async fn start_with_state(
        client: Arc<dyn ExchangeClient>,
        settings: &PlatformSettings,
        state: Arc<watch::Sender<PlatformState>>,
    ) -> Result<Arc<Platform>, PlatformError> {
        state.send_replace(PlatformState::Connecting);
        info!("Connecting to Bitfinex");

        if let Err(e) = client.connect().await {
            state.send_replace(PlatformState::Closed);
            return Err(PlatformError::Startup(format!(
                "Error connecting to bitfinex socket: {}",
                e
            )));
        }

        let platform = Arc::new(Platform {
            registry: SymbolRegistry::new(Arc::clone(&client), RegistryConfig::from(settings)),
            client: Arc::clone(&client),
            state,
            pump: Mutex::new(None),
        });

        for name in &settings.warm_symbols {
            if let Err(e) = platform.registry.resolve(name).await {
                if let Err(close_err) = platform.close().await {
                    warn!("Error tearing down after failed warm-up: {}", close_err);
                }
                return Err(PlatformError::Startup(format!(
                    "Failed to register warm symbol {}: {}",
                    name, e
                )));
            }
        }
        info!("Warm set registered: {:?}", settings.warm_symbols);

        // Subscriptions registered so far go out when the pump starts
        let pump_client = Arc::clone(&client);
        let pump = tokio::spawn(async move {
            let result = pump_client.run().await;
            if let Err(e) = &result {
                error!("Exchange message pump ended with error: {}", e);
            }
            result
        });
        *platform.pump.lock().await = Some(pump);

        platform.state.send_replace(PlatformState::Running);
        info!("Platform running");
        Ok(platform)
    }

    pub fn state(&self) -> PlatformState {
        *self.state.borrow()
    }

    pub(super) fn ensure_open(&self) -> Result<(), PlatformError> {
        match self.state() {
            PlatformState::Closed => Err(PlatformError::Closed),
            _ => Ok(()),
        }
    }

    /// Look up a symbol, subscribing to its ticker on first use
    pub async fn resolve_symbol(&self, name: &str) -> Result<Arc<Symbol>, PlatformError> {
        self.ensure_open()?;
        self.registry.resolve(name).await
    }

    /// Names of every symbol registered so far
    pub async fn symbols(&self) -> Vec<String> {
        self.registry.names().await
    }

    pub async fn bridge_stats(&self) -> Vec<BridgeStats> {
        self.registry.stats().await
    }

    /// Close the exchange connection and wait for every quote bridge and
    /// the message pump to finish. Calling it again is a no-op.
    pub async fn close(&self) -> Result<(), PlatformError> {
        if self.state.send_replace(PlatformState::Closed) == PlatformState::Closed {
            return Ok(());
        }
        info!("Closing platform");

        let result = self.client.close().await;
        if let Err(e) = &result {
            warn!("Error closing exchange connection: {}", e);
        }

        for bridge in self.registry.shutdown().await {
            if let Err(e) = bridge.await {
                warn!("Quote bridge task failed: {}", e);
            }
        }

        if let Some(pump) = self.pump.lock().await.take() {
            if let Err(e) = pump.await {
                warn!("Message pump task failed: {}", e);
            }
        }

        info!("Platform closed");
        result.map_err(PlatformError::from)
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

type StartupOutcome = Option<Result<Arc<Platform>, String>>;

/// Exactly-once access to the platform.
///
/// The first `get()` performs startup; concurrent callers wait for it and
/// every later caller receives the same instance, or the same startup error.
/// Startup runs in its own task, so a caller that gives up waiting does not
/// cancel it.
pub struct PlatformProvider {
    client: Arc<dyn ExchangeClient>,
    settings: PlatformSettings,
    state: Arc<watch::Sender<PlatformState>>,
    started: AtomicBool,
    outcome: Arc<watch::Sender<StartupOutcome>>,
}

impl PlatformProvider {
    pub fn new(client: Arc<dyn ExchangeClient>, settings: PlatformSettings) -> Self {
        let (state, _) = watch::channel(PlatformState::Uninitialized);
        let (outcome, _) = watch::channel(None);

        Self {
            client,
            settings,
            state: Arc::new(state),
            started: AtomicBool::new(false),
            outcome: Arc::new(outcome),
        }
    }

    /// Provider backed by the Bitfinex client
    pub fn bitfinex(settings: &Settings, credentials: Credentials) -> Self {
        let client = BitfinexClient::new(credentials.key, credentials.secret)
            .with_ws_url(settings.exchange.ws_url.clone())
            .with_api_url(settings.exchange.api_url.clone())
            .with_request_timeout(settings.exchange.request_timeout());

        Self::new(Arc::new(client), settings.platform.clone())
    }

    pub async fn get(&self) -> Result<Arc<Platform>, PlatformError> {
        if !self.started.swap(true, Ordering::AcqRel) {
            self.spawn_startup();
        }

        let mut rx = self.outcome.subscribe();
        let outcome = loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                break outcome;
            }
            if rx.changed().await.is_err() {
                break Err("startup task is gone".to_string());
            }
        };

        outcome.map_err(PlatformError::Startup)
    }

    fn spawn_startup(&self) {
        let client = Arc::clone(&self.client);
        let settings = self.settings.clone();
        let state = Arc::clone(&self.state);
        let final_state = Arc::clone(&self.state);
        let outcome = Arc::clone(&self.outcome);

        tokio::spawn(async move {
            let startup = tokio::spawn(async move {
                Platform::start_with_state(client, &settings, state)
                    .await
                    .map_err(|e| match e {
                        PlatformError::Startup(message) => message,
                        other => other.to_string(),
                    })
            });

            let result = match startup.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Platform startup task failed: {}", e);
                    final_state.send_replace(PlatformState::Closed);
                    Err(format!("startup task failed: {}", e))
                }
            };
            outcome.send_replace(Some(result));
        });
    }

    pub fn state(&self) -> PlatformState {
        *self.state.borrow()
    }
}
