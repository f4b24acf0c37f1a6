use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{CandleInterval, Error, Result, TradingPair};

use crate::signal::SignalPolicy;
use crate::sizing::SellQuantityPolicy;

/// Strategy config file (TOML).
///
/// Example `config/crossover.toml`:
/// ```toml
/// [strategy]
/// connector = "binance"
/// trading_pair = "BTC-USDT"
/// order_amount = "25"       # quote asset per buy
/// market_swing = "1"        # percent below the moving average
/// ma_crossover = 20         # periods in the moving average
/// sell_markup = "1.5"       # percent above the fill price
/// cool_off_interval = 300   # seconds between buys, optional
/// stop_loss = "5"           # percent drift before liquidation, optional
/// candle_interval = "1d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    pub strategy: StrategyParams,
}

/// Parameters as the operator writes them. Percentages are whole numbers
/// (`1` means 1%); [`StrategyConfig`] holds the validated fractions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyParams {
    /// Exchange connector name, e.g. "binance".
    pub connector: String,
    /// Trading pair, e.g. "BTC-USDT".
    pub trading_pair: String,
    /// Quote-asset amount spent per buy.
    pub order_amount: Decimal,
    pub market_swing: Decimal,
    /// Moving-average window in candle periods.
    pub ma_crossover: u32,
    pub sell_markup: Decimal,
    #[serde(default)]
    pub cool_off_interval: Option<u64>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub signal_policy: SignalPolicy,
    #[serde(default)]
    pub sell_quantity_policy: SellQuantityPolicy,
    #[serde(default)]
    pub candle_interval: CandleInterval,
    /// Seconds between ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: u64,
    /// Drop candidates the budget cannot cover instead of shrinking them.
    #[serde(default)]
    pub all_or_none: bool,
}

fn default_tick_interval() -> u64 {
    10
}

/// Validated, immutable strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub connector: String,
    pub trading_pair: TradingPair,
    pub order_amount: Decimal,
    /// Fraction, e.g. 0.01 for 1%.
    pub market_swing: Decimal,
    pub window: usize,
    /// Fraction.
    pub sell_markup: Decimal,
    pub cool_off: Option<Duration>,
    /// Fraction. `None` disables the stop-loss monitor.
    pub stop_loss: Option<Decimal>,
    pub signal_policy: SignalPolicy,
    pub sell_quantity_policy: SellQuantityPolicy,
    pub candle_interval: CandleInterval,
    pub tick_interval: Duration,
    pub all_or_none: bool,
}

impl StrategyFileConfig {
    /// Read, parse and validate the strategy file at `path`.
    pub fn load(path: &str) -> Result<StrategyConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        let file: StrategyFileConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse strategy config at '{path}': {e}"))
        })?;
        let config = StrategyConfig::try_from(file.strategy)?;
        info!(
            path,
            pair = %config.trading_pair,
            connector = %config.connector,
            window = config.window,
            "Loaded strategy config"
        );
        Ok(config)
    }
}

impl TryFrom<StrategyParams> for StrategyConfig {
    type Error = Error;

    fn try_from(p: StrategyParams) -> Result<Self> {
        if p.connector.trim().is_empty() {
            return Err(Error::Config("connector must not be empty".into()));
        }
        let trading_pair: TradingPair = p.trading_pair.parse()?;

        if p.order_amount <= Decimal::ZERO {
            return Err(Error::Config(format!(
                "order_amount must be greater than 0, got {}",
                p.order_amount
            )));
        }
        if p.ma_crossover < 1 {
            return Err(Error::Config("ma_crossover must be at least 1 period".into()));
        }
        if p.tick_interval == 0 {
            return Err(Error::Config("tick_interval must be at least 1 second".into()));
        }

        let market_swing = percent_to_fraction("market_swing", p.market_swing)?;
        let sell_markup = percent_to_fraction("sell_markup", p.sell_markup)?;
        let stop_loss = p
            .stop_loss
            .map(|v| percent_to_fraction("stop_loss", v))
            .transpose()?;

        Ok(Self {
            connector: p.connector.trim().to_lowercase(),
            trading_pair,
            order_amount: p.order_amount,
            market_swing,
            window: p.ma_crossover as usize,
            sell_markup,
            cool_off: p.cool_off_interval.map(Duration::from_secs),
            stop_loss,
            signal_policy: p.signal_policy,
            sell_quantity_policy: p.sell_quantity_policy,
            candle_interval: p.candle_interval,
            tick_interval: Duration::from_secs(p.tick_interval),
            all_or_none: p.all_or_none,
        })
    }
}

/// Percentages must lie strictly between 0 and 100.
fn percent_to_fraction(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO || value >= dec!(100) {
        return Err(Error::Config(format!(
            "{field} must be between 0 and 100 (exclusive), got {value}"
        )));
    }
    Ok(value / dec!(100))
}
