use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{Balances, CandleInterval, OpenOrder, OrderRequest, Result, TradingPair};

/// Abstraction over the exchange connection.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Order lifecycle notifications are not part of this trait; each client
/// publishes `OrderEvent`s on the channel handed to it at construction.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Connector name used in logs and the status report.
    fn name(&self) -> &str;

    /// True once the connector can accept orders for its markets.
    async fn ready(&self) -> bool;

    /// Best price on one side of the book: the ask when `is_buy`, the bid otherwise.
    async fn current_price(&self, pair: &TradingPair, is_buy: bool) -> Result<Decimal>;

    /// Submit an order and return its id once the exchange accepted it.
    async fn submit_order(&self, order: &OrderRequest) -> Result<String>;

    async fn cancel_order(&self, pair: &TradingPair, order_id: &str) -> Result<()>;

    async fn open_orders(&self, pair: &TradingPair) -> Result<Vec<OpenOrder>>;

    async fn balances(&self, pair: &TradingPair) -> Result<Balances>;
}

/// Source of historical closing prices.
#[async_trait]
pub trait PriceHistory: Send + Sync {
    /// Return the latest `limit` closes for `pair`, oldest first.
    async fn fetch_closes(
        &self,
        pair: &TradingPair,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<Decimal>>;
}
