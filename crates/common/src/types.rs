use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Spot trading pair written as `BASE-QUOTE`, e.g. `BTC-USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Exchange symbol without separator, e.g. `BTCUSDT`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('-') => {
                Ok(Self::new(base, quote))
            }
            _ => Err(Error::Config(format!(
                "trading pair must look like BASE-QUOTE, got '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for TradingPair {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// A proposed order that has not been submitted yet. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCandidate {
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl OrderCandidate {
    pub fn buy(price: Decimal, quantity: Decimal) -> Self {
        Self {
            side: OrderSide::Buy,
            price,
            quantity,
        }
    }

    pub fn sell(price: Decimal, quantity: Decimal) -> Self {
        Self {
            side: OrderSide::Sell,
            price,
            quantity,
        }
    }

    /// Quote-asset value of the candidate.
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// An order to be submitted to the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client-assigned id; exchanges echo it back on every event for the order.
    pub client_order_id: String,
    pub pair: TradingPair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl OrderRequest {
    pub fn limit(pair: TradingPair, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            client_order_id: format!("mac-{}", uuid::Uuid::new_v4().simple()),
            pair,
            side,
            order_type: OrderType::Limit,
            quantity,
            price,
        }
    }

    pub fn from_candidate(pair: TradingPair, candidate: &OrderCandidate) -> Self {
        Self::limit(pair, candidate.side, candidate.quantity, candidate.price)
    }
}

/// Resting order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub pair: TradingPair,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OpenOrder {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).max(Duration::zero())
    }
}

/// Snapshot of a completely filled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub pair: TradingPair,
    pub side: OrderSide,
    /// Average execution price.
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Order lifecycle notification delivered to the trader between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Created(OpenOrder),
    Filled(Fill),
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::Created(order) => &order.id,
            OrderEvent::Filled(fill) => &fill.order_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub total: Decimal,
    pub available: Decimal,
}

impl AssetBalance {
    pub fn new(asset: impl Into<String>, total: Decimal, available: Decimal) -> Self {
        Self {
            asset: asset.into(),
            total,
            available,
        }
    }
}

/// Base and quote balances for one trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub base: AssetBalance,
    pub quote: AssetBalance,
}

/// Candle sampling interval for historical closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[default]
    #[serde(rename = "1d")]
    OneDay,
}

impl CandleInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::ThirtyMinutes => "30m",
            CandleInterval::OneHour => "1h",
            CandleInterval::FourHours => "4h",
            CandleInterval::OneDay => "1d",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl FromStr for TradingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            other => Err(Error::Config(format!(
                "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trading_pair_parses_and_builds_symbol() {
        let pair: TradingPair = "eth-usdt".parse().unwrap();
        assert_eq!(pair.base(), "ETH");
        assert_eq!(pair.quote(), "USDT");
        assert_eq!(pair.symbol(), "ETHUSDT");
        assert_eq!(pair.to_string(), "ETH-USDT");
    }

    #[test]
    fn trading_pair_rejects_missing_separator() {
        assert!("BTCUSDT".parse::<TradingPair>().is_err());
        assert!("-USDT".parse::<TradingPair>().is_err());
        assert!("A-B-C".parse::<TradingPair>().is_err());
    }

    #[test]
    fn trading_mode_parses_case_insensitively() {
        assert_eq!("Paper".parse::<TradingMode>().unwrap(), TradingMode::Paper);
        assert_eq!(" live ".parse::<TradingMode>().unwrap(), TradingMode::Live);
        assert!("demo".parse::<TradingMode>().is_err());
    }

    #[test]
    fn client_order_ids_fit_binance_limit() {
        let pair = TradingPair::new("BTC", "USDT");
        let req = OrderRequest::limit(pair, OrderSide::Buy, dec!(0.01), dec!(100));
        assert!(req.client_order_id.len() <= 36);
        assert_eq!(req.order_type, OrderType::Limit);
    }

    #[test]
    fn order_age_never_negative() {
        let now = Utc::now();
        let order = OpenOrder {
            id: "1".into(),
            pair: TradingPair::new("BTC", "USDT"),
            side: OrderSide::Buy,
            price: dec!(1),
            quantity: dec!(1),
            created_at: now + Duration::seconds(5),
        };
        assert_eq!(order.age(now), Duration::zero());
    }
}
