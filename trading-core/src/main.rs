use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};

use trading_common::model::Order;
use trading_core::{
    config::{Credentials, Settings},
    logging,
    platform::{Platform, PlatformError, PlatformProvider},
};

#[derive(Parser)]
#[command(name = "bitfinex-adapter")]
#[command(about = "Bitfinex trading platform adapter")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream quotes until Ctrl+C
    Watch {
        #[arg(short, long)]
        symbol: Vec<String>,
        /// Stop after this many quotes per symbol
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// List open positions
    Positions,
    /// Place a limit order, or a stop order with --stop
    Order {
        #[arg(short, long)]
        symbol: String,
        /// Negative to sell
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,
        #[arg(short, long)]
        price: f64,
        #[arg(long)]
        stop: bool,
    },
    Cancel {
        #[arg(long)]
        id: u64,
    },
    CancelAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = Cli::parse().command.unwrap_or(Commands::Watch {
        symbol: Vec::new(),
        count: None,
    });

    dotenv().ok();
    logging::init("info");

    let settings = Settings::new().context("Failed to load settings")?;
    let credentials = Credentials::from_env()
        .map_err(PlatformError::from)
        .unwrap_or_else(|e| exit_on_startup_error(e));

    let provider = PlatformProvider::bitfinex(&settings, credentials);
    let platform = provider.get().await.unwrap_or_else(|e| exit_on_startup_error(e));

    let result = tokio::select! {
        result = run(command, &platform) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down...");
            Ok(())
        }
    };

    platform.close().await?;
    info!("Shutdown complete");
    result
}

/// Log a startup error and terminate the process
fn exit_on_startup_error(e: PlatformError) -> ! {
    error!("{}", e);
    std::process::exit(if e.is_fatal() { 1 } else { 2 })
}

async fn run(command: Commands, platform: &Arc<Platform>) -> anyhow::Result<()> {
    match command {
        Commands::Watch { symbol, count } => {
            let names = if symbol.is_empty() {
                platform.symbols().await
            } else {
                symbol
            };
            watch(platform, names, count).await?;
        }

        Commands::Positions => {
            let positions = platform.list_positions().await?;
            if positions.is_empty() {
                println!("No open positions");
            }
            for position in positions {
                println!(
                    "{} {} @ {}",
                    position.symbol.name(),
                    position.amount,
                    position.price
                );
            }
        }

        Commands::Order {
            symbol,
            amount,
            price,
            stop,
        } => {
            let symbol = platform.resolve_symbol(&symbol).await?;
            let order = if stop {
                Order::stop(symbol, amount, price)
            } else {
                Order::limit(symbol, amount, price)
            };
            let id = platform.place_order(&order).await?;
            println!("Order accepted: {}", id);
        }

        Commands::Cancel { id } => {
            platform.cancel_order(id).await?;
            println!("Order {} cancelled", id);
        }

        Commands::CancelAll => {
            platform.cancel_all_orders().await?;
            println!("All orders cancelled");
        }
    }

    Ok(())
}

async fn watch(platform: &Arc<Platform>, names: Vec<String>, count: Option<usize>) -> anyhow::Result<()> {
    let mut handles = Vec::new();

    for name in names {
        let symbol = platform.resolve_symbol(&name).await?;
        handles.push(tokio::spawn(async move {
            let mut seen = 0;
            while let Some(quote) = symbol.recv_quote().await {
                println!(
                    "{} bid {} ask {} mid {:.4} spread {:.4}",
                    symbol.name(),
                    quote.bid,
                    quote.ask,
                    quote.mid(),
                    quote.spread()
                );
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            info!("{}: {} quotes received", symbol.name(), seen);
        }));
    }

    info!("Watching {} symbols. Press Ctrl+C to stop.", handles.len());
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Quote watcher failed: {}", e);
        }
    }

    for stats in platform.bridge_stats().await {
        info!(
            "{}: published {}, dropped {}, malformed {}",
            stats.symbol, stats.published, stats.dropped, stats.malformed
        );
    }
    Ok(())
}
