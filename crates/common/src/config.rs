use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{Error, Result, TradingMode};

/// Process-level configuration loaded from environment variables at startup.
/// Strategy parameters live in the TOML file at `strategy_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials, required in live mode only
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_slippage_bps: Decimal,
    pub paper_quote_balance: Decimal,
    pub paper_base_balance: Decimal,

    // Strategy config file path
    pub strategy_config_path: String,

    /// How often the binary logs the status report.
    pub status_interval_secs: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode: TradingMode = required_env("TRADING_MODE")?.parse()?;

        let binance_api_key = optional_env("BINANCE_API_KEY");
        let binance_secret = optional_env("BINANCE_SECRET");
        if trading_mode == TradingMode::Live
            && (binance_api_key.is_none() || binance_secret.is_none())
        {
            return Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET are required when TRADING_MODE=live".into(),
            ));
        }

        Ok(Config {
            binance_api_key,
            binance_secret,
            trading_mode,
            paper_slippage_bps: parsed_env("PAPER_SLIPPAGE_BPS", Decimal::from(10))?,
            paper_quote_balance: parsed_env("PAPER_QUOTE_BALANCE", Decimal::from(10_000))?,
            paper_base_balance: parsed_env("PAPER_BASE_BALANCE", Decimal::ZERO)?,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/crossover.toml".to_string()),
            status_interval_secs: parsed_env("STATUS_INTERVAL_SECS", 300)?,
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}
