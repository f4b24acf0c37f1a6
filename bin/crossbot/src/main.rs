use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, ExchangeClient, OrderEvent, PriceHistory, Result, TradingMode};
use engine::{BinanceClient, CrossoverTrader, Engine, EngineHandle, UserDataStream};
use paper::PaperClient;
use strategy::{StrategyConfig, StrategyFileConfig};

const EVENT_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().unwrap_or_else(|e| fatal(e));
    let strategy = StrategyFileConfig::load(&cfg.strategy_config_path).unwrap_or_else(|e| fatal(e));
    info!(mode = %cfg.trading_mode, pair = %strategy.trading_pair, "Crossbot starting");

    // ── Exchange wiring (injected based on TRADING_MODE) ─────────────────────
    let (event_tx, event_rx) = mpsc::channel::<OrderEvent>(EVENT_QUEUE_CAPACITY);
    let (client, history) = match cfg.trading_mode {
        TradingMode::Live => live_exchange(&cfg, &strategy, event_tx),
        TradingMode::Paper => paper_exchange(&cfg, &strategy, event_tx),
    }
    .unwrap_or_else(|e| fatal(e));

    if strategy.connector != client.name() {
        warn!(
            configured = %strategy.connector,
            actual = client.name(),
            "Configured connector differs from the active exchange client"
        );
    }

    // ── Engine ────────────────────────────────────────────────────────────────
    let tick_interval = strategy.tick_interval;
    let trader = CrossoverTrader::new(strategy, client, history).unwrap_or_else(|e| fatal(e));
    let (engine, handle) = Engine::new(trader, tick_interval, event_rx);
    let engine_task = tokio::spawn(engine.run());

    tokio::spawn(log_status(
        handle.clone(),
        Duration::from_secs(cfg.status_interval_secs.max(1)),
    ));

    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Stopping engine.");
    handle.stop().await;
    let _ = engine_task.await;
}

fn fatal(e: common::Error) -> ! {
    error!(error = %e, "Startup failed");
    eprintln!("crossbot: {e}");
    std::process::exit(1);
}

type Exchange = (Arc<dyn ExchangeClient>, Arc<dyn PriceHistory>);

/// Signed Binance client plus the user-data stream feeding order events.
fn live_exchange(
    cfg: &Config,
    strategy: &StrategyConfig,
    event_tx: mpsc::Sender<OrderEvent>,
) -> Result<Exchange> {
    info!("Live trading mode, using BinanceClient");
    let client = Arc::new(BinanceClient::new(
        cfg.binance_api_key.clone().unwrap_or_default(),
        cfg.binance_secret.clone().unwrap_or_default(),
    )?);

    let stream = UserDataStream::new(client.clone(), strategy.trading_pair.clone(), event_tx);
    tokio::spawn(stream.run());

    let history: Arc<dyn PriceHistory> = client.clone();
    let client: Arc<dyn ExchangeClient> = client;
    Ok((client, history))
}

/// Simulated client fed by Binance public quotes; klines come from the same
/// public endpoint as in live mode.
fn paper_exchange(
    cfg: &Config,
    strategy: &StrategyConfig,
    event_tx: mpsc::Sender<OrderEvent>,
) -> Result<Exchange> {
    info!(
        slippage_bps = %cfg.paper_slippage_bps,
        quote_balance = %cfg.paper_quote_balance,
        base_balance = %cfg.paper_base_balance,
        "Paper trading mode, using PaperClient"
    );
    let pair = strategy.trading_pair.clone();
    let paper = Arc::new(
        PaperClient::new(cfg.paper_slippage_bps, event_tx)
            .with_balance(pair.quote(), cfg.paper_quote_balance)
            .with_balance(pair.base(), cfg.paper_base_balance),
    );
    let public = Arc::new(BinanceClient::public()?);

    tokio::spawn(feed_quotes(
        paper.clone(),
        public.clone(),
        pair,
        strategy.tick_interval,
    ));

    let history: Arc<dyn PriceHistory> = public;
    let client: Arc<dyn ExchangeClient> = paper;
    Ok((client, history))
}

/// Poll the Binance book ticker and hand each quote to the simulator.
async fn feed_quotes(
    paper: Arc<PaperClient>,
    public: Arc<BinanceClient>,
    pair: common::TradingPair,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match public.book_ticker(&pair).await {
            Ok(quote) => paper.update_quote(&pair, quote.bid, quote.ask).await,
            Err(e) => warn!(pair = %pair, error = %e, "Book ticker poll failed"),
        }
    }
}

async fn log_status(handle: EngineHandle, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately; skip it so the trader has run once.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match handle.status().await {
            Some(report) => info!("Status\n{report}"),
            None => break,
        }
    }
}
