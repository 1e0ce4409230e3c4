// =================================================================
// model/symbol.rs - Symbol Handle and Quote Stream
// =================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::types::{AssetClass, Quotes};

/// Counters shared between a symbol and its publisher
#[derive(Debug, Default)]
pub struct StreamStats {
    published: AtomicU64,
    dropped: AtomicU64,
}

impl StreamStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A tradable instrument and its live quote stream.
///
/// Symbols are shared as `Arc<Symbol>`. All holders read from the same
/// stream, so each quote is delivered to exactly one reader.
pub struct Symbol {
    name: String,
    asset_class: AssetClass,
    tick_size: f64,
    quotes: Mutex<mpsc::Receiver<Quotes>>,
    stats: Arc<StreamStats>,
}

impl Symbol {
    /// Create a symbol together with the only publisher of its stream.
    ///
    /// `buffer` is the number of quotes the stream holds for a consumer
    /// that is not currently receiving (at least one).
    pub fn new(
        name: impl Into<String>,
        asset_class: AssetClass,
        tick_size: f64,
        buffer: usize,
    ) -> (Arc<Symbol>, QuotePublisher) {
        let name = name.into();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let stats = Arc::new(StreamStats::default());

        let symbol = Arc::new(Symbol {
            name: name.clone(),
            asset_class,
            tick_size,
            quotes: Mutex::new(rx),
            stats: Arc::clone(&stats),
        });

        let publisher = QuotePublisher { name, tx, stats };

        (symbol, publisher)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    /// Wait for the next quote. Returns `None` once the stream is closed
    /// and every buffered quote has been delivered.
    pub async fn recv_quote(&self) -> Option<Quotes> {
        self.quotes.lock().await.recv().await
    }

    /// Take a buffered quote without waiting
    pub fn try_recv_quote(&self) -> Option<Quotes> {
        let mut rx = self.quotes.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Number of quotes discarded because no consumer could take them
    pub fn dropped_quotes(&self) -> u64 {
        self.stats.dropped()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("asset_class", &self.asset_class)
            .field("tick_size", &self.tick_size)
            .field("dropped", &self.stats.dropped())
            .finish()
    }
}

/// Sending half of a symbol's quote stream.
///
/// There is exactly one publisher per symbol; dropping it closes the stream.
#[derive(Debug)]
pub struct QuotePublisher {
    name: String,
    tx: mpsc::Sender<Quotes>,
    stats: Arc<StreamStats>,
}

impl QuotePublisher {
    /// Publish without waiting. Returns false when the quote was dropped.
    pub fn try_publish(&self, quote: Quotes) -> bool {
        match self.tx.try_send(quote) {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(symbol = %self.name, dropped, "Quote dropped");
                false
            }
        }
    }

    pub fn symbol_name(&self) -> &str {
        &self.name
    }
}
