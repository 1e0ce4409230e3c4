// =================================================================
// platform/quote_bridge.rs - Raw Tick to Quote Stream Bridge
// =================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::exchange::RawTick;
use trading_common::model::{QuotePublisher, Quotes};

// Fixed field positions in a ticker update
const BID_INDEX: usize = 0;
const ASK_INDEX: usize = 2;

/// Extract bid/ask from a raw tick; `None` when the tick is too short
pub fn quote_from_tick(tick: &[f64]) -> Option<Quotes> {
    let bid = *tick.get(BID_INDEX)?;
    let ask = *tick.get(ASK_INDEX)?;
    Some(Quotes { bid, ask })
}

/// Per-symbol task republishing raw ticks as quotes.
///
/// Publishing never waits: a quote the consumer cannot take right away is
/// dropped and counted. The bridge ends when the exchange closes the raw
/// tick channel or when the platform shuts down; either way the publisher
/// is dropped and the symbol's quote stream closes.
pub struct QuoteBridge {
    publisher: QuotePublisher,
    raw_rx: mpsc::Receiver<RawTick>,
    shutdown_rx: broadcast::Receiver<()>,
    malformed: Arc<AtomicU64>,
}

impl QuoteBridge {
    pub fn new(
        publisher: QuotePublisher,
        raw_rx: mpsc::Receiver<RawTick>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            publisher,
            raw_rx,
            shutdown_rx,
            malformed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of ticks skipped for missing fields
    pub fn malformed_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.malformed)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let name = self.publisher.symbol_name().to_string();
        debug!("Quote bridge started for {}", name);

        loop {
            tokio::select! {
                tick = self.raw_rx.recv() => {
                    match tick {
                        Some(tick) => self.forward(&tick),
                        None => {
                            info!("Bitfinex {} channel died", name);
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Quote bridge for {} stopped by shutdown", name);
                    break;
                }
            }
        }
        // Dropping `self.publisher` here closes the quote stream
    }

    fn forward(&self, tick: &[f64]) {
        match quote_from_tick(tick) {
            Some(quote) => {
                self.publisher.try_publish(quote);
            }
            None => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Skipping malformed tick for {} ({} fields)",
                    self.publisher.symbol_name(),
                    tick.len()
                );
            }
        }
    }
}
