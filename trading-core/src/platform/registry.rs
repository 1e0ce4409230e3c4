// =================================================================
// platform/registry.rs - Symbol Registry
// =================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::quote_bridge::QuoteBridge;
use super::types::{BridgeStats, RegistryConfig};
use super::PlatformError;
use crate::exchange::utils::validate_bitfinex_symbol;
use crate::exchange::{ChannelKind, ExchangeClient};
use trading_common::model::Symbol;

struct Entry {
    symbol: Arc<Symbol>,
    malformed: Arc<AtomicU64>,
}

#[derive(Default)]
struct RegistryInner {
    symbols: HashMap<String, Entry>,
    bridges: Vec<JoinHandle<()>>,
    closed: bool,
}

/// Cache of symbol handles, one exchange subscription per name.
///
/// Lookup, subscription and bridge start all happen under one lock, so
/// concurrent resolution of the same name never subscribes twice.
pub struct SymbolRegistry {
    client: Arc<dyn ExchangeClient>,
    config: RegistryConfig,
    shutdown_tx: broadcast::Sender<()>,
    inner: Mutex<RegistryInner>,
}

impl SymbolRegistry {
    pub fn new(client: Arc<dyn ExchangeClient>, config: RegistryConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            client,
            config,
            shutdown_tx,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Look up a symbol, subscribing to it on first use
    pub async fn resolve(&self, name: &str) -> Result<Arc<Symbol>, PlatformError> {
        let name = validate_bitfinex_symbol(name)
            .map_err(|e| PlatformError::InvalidSymbol(e.to_string()))?;

        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(PlatformError::Closed);
        }

        if let Some(entry) = inner.symbols.get(&name) {
            return Ok(Arc::clone(&entry.symbol));
        }

        let (symbol, publisher) = Symbol::new(
            name.clone(),
            self.config.asset_class,
            self.config.tick_size,
            self.config.quote_buffer,
        );
        let (raw_tx, raw_rx) = mpsc::channel(self.config.tick_buffer.max(1));

        self.client
            .subscribe(ChannelKind::Ticker, &name, raw_tx)
            .await;

        let bridge = QuoteBridge::new(publisher, raw_rx, self.shutdown_tx.subscribe());
        let malformed = bridge.malformed_counter();
        inner.bridges.push(bridge.spawn());

        inner.symbols.insert(
            name.clone(),
            Entry {
                symbol: Arc::clone(&symbol),
                malformed,
            },
        );

        info!("Registered symbol {} ({} total)", name, inner.symbols.len());
        Ok(symbol)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.symbols.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Names of every registered symbol, sorted
    pub async fn names(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut names: Vec<String> = inner.symbols.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn stats(&self) -> Vec<BridgeStats> {
        let inner = self.inner.lock().await;
        let mut stats: Vec<BridgeStats> = inner
            .symbols
            .iter()
            .map(|(name, entry)| BridgeStats {
                symbol: name.clone(),
                published: entry.symbol.stats().published(),
                dropped: entry.symbol.dropped_quotes(),
                malformed: entry.malformed.load(Ordering::Relaxed),
            })
            .collect();
        stats.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        stats
    }

    /// Stop accepting symbols, signal every bridge and hand back their
    /// join handles
    pub async fn shutdown(&self) -> Vec<JoinHandle<()>> {
        let mut inner = self.inner.lock().await;
        inner.closed = true;

        // No receivers just means there were no bridges
        let _ = self.shutdown_tx.send(());
        debug!("Shutdown signalled to {} quote bridges", inner.bridges.len());

        std::mem::take(&mut inner.bridges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::tests::MockExchange;
    use std::time::Duration;
    use tokio::time::timeout;
    use trading_common::model::{AssetClass, Quotes};

    fn registry(mock: &Arc<MockExchange>) -> SymbolRegistry {
        SymbolRegistry::new(mock.clone(), RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_handle() {
        let mock = Arc::new(MockExchange::new());
        let registry = registry(&mock);

        let first = registry.resolve("BTCUSD").await.unwrap();
        let second = registry.resolve("BTCUSD").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mock.subscription_count("BTCUSD"), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_names_are_normalized() {
        let mock = Arc::new(MockExchange::new());
        let registry = registry(&mock);

        let upper = registry.resolve("BTCUSD").await.unwrap();
        let lower = registry.resolve("btcusd").await.unwrap();

        assert!(Arc::ptr_eq(&upper, &lower));
        assert_eq!(upper.name(), "BTCUSD");
        assert_eq!(upper.asset_class(), AssetClass::Fx);
        assert_eq!(upper.tick_size(), 0.01);
        assert_eq!(mock.subscription_count("BTCUSD"), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected_without_subscribing() {
        let mock = Arc::new(MockExchange::new());
        let registry = registry(&mock);

        assert!(matches!(
            registry.resolve("BTC/USD").await,
            Err(PlatformError::InvalidSymbol(_))
        ));
        assert!(matches!(
            registry.resolve("").await,
            Err(PlatformError::InvalidSymbol(_))
        ));
        assert_eq!(mock.total_subscriptions(), 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution_subscribes_once() {
        let mock = Arc::new(MockExchange::new().with_subscribe_delay(Duration::from_millis(5)));
        let registry = Arc::new(registry(&mock));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.resolve("ETHUSD").await.unwrap() }));
        }

        let mut symbols = Vec::new();
        for handle in handles {
            symbols.push(handle.await.unwrap());
        }

        assert!(symbols.iter().all(|s| Arc::ptr_eq(s, &symbols[0])));
        assert_eq!(mock.subscription_count("ETHUSD"), 1);
    }

    #[tokio::test]
    async fn test_ticks_flow_to_resolved_symbol() {
        let mock = Arc::new(MockExchange::new());
        let registry = registry(&mock);
        let symbol = registry.resolve("BTCUSD").await.unwrap();

        mock.push_tick("BTCUSD", vec![100.5, 0.0, 100.7]).await;

        let quote = timeout(Duration::from_secs(1), symbol.recv_quote()).await.unwrap();
        assert_eq!(quote, Some(Quotes::new(100.5, 100.7)));

        let stats = registry.stats().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].symbol, "BTCUSD");
        assert_eq!(stats[0].published, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_streams_and_rejects_new_symbols() {
        let mock = Arc::new(MockExchange::new());
        let registry = registry(&mock);
        let btc = registry.resolve("BTCUSD").await.unwrap();
        let ltc = registry.resolve("LTCUSD").await.unwrap();

        let handles = registry.shutdown().await;
        assert_eq!(handles.len(), 2);
        for handle in handles {
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }

        assert_eq!(btc.recv_quote().await, None);
        assert_eq!(ltc.recv_quote().await, None);
        assert!(matches!(registry.resolve("ETHUSD").await, Err(PlatformError::Closed)));
        assert_eq!(registry.names().await, vec!["BTCUSD".to_string(), "LTCUSD".to_string()]);
    }
}
