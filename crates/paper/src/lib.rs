use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use common::{
    AssetBalance, Balances, Error, ExchangeClient, Fill, OpenOrder, OrderEvent, OrderRequest,
    OrderSide, Result, TradingPair,
};

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy)]
struct Quote {
    bid: Decimal,
    ask: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ledger {
    total: Decimal,
    locked: Decimal,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    order: OpenOrder,
    /// Asset and amount held back until the order fills or is cancelled.
    locked_asset: String,
    locked_amount: Decimal,
}

/// Simulated exchange client for paper trading.
///
/// Limit orders rest until a quote crosses them: a buy fills once the ask is
/// at or below its price, a sell once the bid is at or above it. Fills apply
/// slippage against the trader and are reported on the same event queue the
/// live user-data stream feeds. No real orders are ever sent to Binance.
pub struct PaperClient {
    balances: RwLock<HashMap<String, Ledger>>,
    /// Latest quote per pair, updated via `update_quote`.
    quotes: RwLock<HashMap<TradingPair, Quote>>,
    resting: RwLock<Vec<RestingOrder>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: Decimal,
    event_tx: mpsc::Sender<OrderEvent>,
}

impl PaperClient {
    pub fn new(slippage_bps: Decimal, event_tx: mpsc::Sender<OrderEvent>) -> Self {
        info!(slippage_bps = %slippage_bps, "PaperClient initialized");
        Self {
            balances: RwLock::new(HashMap::new()),
            quotes: RwLock::new(HashMap::new()),
            resting: RwLock::new(Vec::new()),
            slippage_bps,
            event_tx,
        }
    }

    /// Seed the simulated wallet.
    pub fn with_balance(mut self, asset: impl Into<String>, amount: Decimal) -> Self {
        self.balances.get_mut().entry(asset.into()).or_default().total += amount;
        self
    }

    fn fill_price(&self, side: OrderSide, limit: Decimal) -> Decimal {
        let slip = self.slippage_bps / BPS;
        match side {
            OrderSide::Buy => limit * (Decimal::ONE + slip),
            OrderSide::Sell => limit * (Decimal::ONE - slip),
        }
    }

    /// Store the latest quote for a pair and fill every resting order it crosses.
    pub async fn update_quote(&self, pair: &TradingPair, bid: Decimal, ask: Decimal) {
        self.quotes
            .write()
            .await
            .insert(pair.clone(), Quote { bid, ask });
        self.match_resting(pair).await;
    }

    async fn match_resting(&self, pair: &TradingPair) {
        let Some(quote) = self.quotes.read().await.get(pair).copied() else {
            return;
        };

        let crossed: Vec<RestingOrder> = {
            let mut resting = self.resting.write().await;
            let (hit, keep): (Vec<_>, Vec<_>) = resting.drain(..).partition(|r| {
                r.order.pair == *pair
                    && match r.order.side {
                        OrderSide::Buy => quote.ask > Decimal::ZERO && quote.ask <= r.order.price,
                        OrderSide::Sell => quote.bid > Decimal::ZERO && quote.bid >= r.order.price,
                    }
            });
            *resting = keep;
            hit
        };

        for resting in crossed {
            let fill = self.settle(resting).await;
            self.emit(OrderEvent::Filled(fill));
        }
    }

    /// Move funds for a filled order and build its fill.
    async fn settle(&self, resting: RestingOrder) -> Fill {
        let order = resting.order;
        let price = self.fill_price(order.side, order.price);
        let notional = price * order.quantity;

        let mut balances = self.balances.write().await;
        let locked = balances.entry(resting.locked_asset).or_default();
        locked.locked -= resting.locked_amount;
        match order.side {
            OrderSide::Buy => {
                balances.entry(order.pair.quote().to_string()).or_default().total -= notional;
                balances.entry(order.pair.base().to_string()).or_default().total += order.quantity;
            }
            OrderSide::Sell => {
                balances.entry(order.pair.base().to_string()).or_default().total -= order.quantity;
                balances.entry(order.pair.quote().to_string()).or_default().total += notional;
            }
        }
        drop(balances);

        debug!(
            order_id = %order.id,
            side = %order.side,
            limit = %order.price,
            fill = %price,
            qty = %order.quantity,
            "Paper fill simulated"
        );

        Fill {
            order_id: order.id,
            pair: order.pair,
            side: order.side,
            price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        }
    }

    /// Never waits: the engine consuming these events may be the caller.
    fn emit(&self, event: OrderEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!(error = %e, "Paper order event dropped");
        }
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    fn name(&self) -> &str {
        "paper"
    }

    async fn ready(&self) -> bool {
        !self.quotes.read().await.is_empty()
    }

    async fn current_price(&self, pair: &TradingPair, is_buy: bool) -> Result<Decimal> {
        let quotes = self.quotes.read().await;
        let quote = quotes
            .get(pair)
            .ok_or_else(|| Error::Exchange(format!("No price available for {pair}")))?;
        Ok(if is_buy { quote.ask } else { quote.bid })
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<String> {
        if order.quantity <= Decimal::ZERO || order.price <= Decimal::ZERO {
            return Err(Error::OrderRejected(format!(
                "invalid price {} or quantity {}",
                order.price, order.quantity
            )));
        }

        let (locked_asset, locked_amount) = match order.side {
            OrderSide::Buy => (
                order.pair.quote().to_string(),
                self.fill_price(OrderSide::Buy, order.price) * order.quantity,
            ),
            OrderSide::Sell => (order.pair.base().to_string(), order.quantity),
        };

        {
            let mut balances = self.balances.write().await;
            let ledger = balances.entry(locked_asset.clone()).or_default();
            let available = ledger.total - ledger.locked;
            if available < locked_amount {
                return Err(Error::OrderRejected(format!(
                    "insufficient {locked_asset}: need {locked_amount}, available {available}"
                )));
            }
            ledger.locked += locked_amount;
        }

        let open = OpenOrder {
            id: order.client_order_id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            created_at: Utc::now(),
        };
        self.resting.write().await.push(RestingOrder {
            order: open.clone(),
            locked_asset,
            locked_amount,
        });
        debug!(order_id = %open.id, side = %open.side, price = %open.price, qty = %open.quantity, "Paper order resting");

        self.emit(OrderEvent::Created(open));
        self.match_resting(&order.pair).await;
        Ok(order.client_order_id.clone())
    }

    async fn cancel_order(&self, _pair: &TradingPair, order_id: &str) -> Result<()> {
        let cancelled = {
            let mut resting = self.resting.write().await;
            let idx = resting
                .iter()
                .position(|r| r.order.id == order_id)
                .ok_or_else(|| Error::Exchange(format!("Unknown order {order_id}")))?;
            resting.remove(idx)
        };

        self.balances
            .write()
            .await
            .entry(cancelled.locked_asset)
            .or_default()
            .locked -= cancelled.locked_amount;
        debug!(order_id, "Paper order cancelled");
        Ok(())
    }

    async fn open_orders(&self, pair: &TradingPair) -> Result<Vec<OpenOrder>> {
        Ok(self
            .resting
            .read()
            .await
            .iter()
            .filter(|r| r.order.pair == *pair)
            .map(|r| r.order.clone())
            .collect())
    }

    async fn balances(&self, pair: &TradingPair) -> Result<Balances> {
        let balances = self.balances.read().await;
        let snapshot = |asset: &str| {
            let ledger = balances.get(asset).copied().unwrap_or_default();
            AssetBalance::new(asset, ledger.total, ledger.total - ledger.locked)
        };
        Ok(Balances {
            base: snapshot(pair.base()),
            quote: snapshot(pair.quote()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    fn client(slippage_bps: Decimal) -> (PaperClient, mpsc::Receiver<OrderEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let client = PaperClient::new(slippage_bps, tx)
            .with_balance("USDT", dec!(1000))
            .with_balance("BTC", dec!(1));
        (client, rx)
    }

    fn buy(price: Decimal, qty: Decimal) -> OrderRequest {
        OrderRequest::limit(pair(), OrderSide::Buy, qty, price)
    }

    fn sell(price: Decimal, qty: Decimal) -> OrderRequest {
        OrderRequest::limit(pair(), OrderSide::Sell, qty, price)
    }

    #[tokio::test]
    async fn ready_only_after_first_quote() {
        let (client, _rx) = client(dec!(0));
        assert!(!client.ready().await);
        assert!(client.current_price(&pair(), true).await.is_err());

        client.update_quote(&pair(), dec!(99), dec!(101)).await;
        assert!(client.ready().await);
        assert_eq!(client.current_price(&pair(), true).await.unwrap(), dec!(101));
        assert_eq!(client.current_price(&pair(), false).await.unwrap(), dec!(99));
    }

    #[tokio::test]
    async fn buy_rests_until_ask_reaches_limit() {
        let (client, mut rx) = client(dec!(0));
        client.update_quote(&pair(), dec!(101), dec!(102)).await;

        let id = client.submit_order(&buy(dec!(100), dec!(2))).await.unwrap();
        assert!(matches!(rx.recv().await, Some(OrderEvent::Created(o)) if o.id == id));
        assert_eq!(client.open_orders(&pair()).await.unwrap().len(), 1);

        let locked = client.balances(&pair()).await.unwrap();
        assert_eq!(locked.quote.total, dec!(1000));
        assert_eq!(locked.quote.available, dec!(800));

        client.update_quote(&pair(), dec!(99), dec!(100)).await;
        match rx.recv().await {
            Some(OrderEvent::Filled(fill)) => {
                assert_eq!(fill.order_id, id);
                assert_eq!(fill.price, dec!(100));
                assert_eq!(fill.quantity, dec!(2));
            }
            other => panic!("expected fill, got {other:?}"),
        }

        let after = client.balances(&pair()).await.unwrap();
        assert_eq!(after.quote.total, dec!(800));
        assert_eq!(after.quote.available, dec!(800));
        assert_eq!(after.base.total, dec!(3));
        assert!(client.open_orders(&pair()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn marketable_sell_fills_on_submit_with_slippage() {
        let (client, mut rx) = client(dec!(10));
        client.update_quote(&pair(), dec!(1000), dec!(1001)).await;

        let id = client.submit_order(&sell(dec!(1000), dec!(0.5))).await.unwrap();
        assert!(matches!(rx.recv().await, Some(OrderEvent::Created(_))));
        match rx.recv().await {
            Some(OrderEvent::Filled(fill)) => {
                assert_eq!(fill.order_id, id);
                assert_eq!(fill.price, dec!(999));
            }
            other => panic!("expected fill, got {other:?}"),
        }

        let balances = client.balances(&pair()).await.unwrap();
        assert_eq!(balances.base.total, dec!(0.5));
        assert_eq!(balances.quote.total, dec!(1499.5));
    }

    #[tokio::test]
    async fn insufficient_balance_is_rejected() {
        let (client, _rx) = client(dec!(0));
        client.update_quote(&pair(), dec!(99), dec!(101)).await;

        let err = client.submit_order(&buy(dec!(100), dec!(20))).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected(_)));
        let err = client.submit_order(&sell(dec!(200), dec!(2))).await.unwrap_err();
        assert!(matches!(err, Error::OrderRejected(_)));
        assert!(client.open_orders(&pair()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_releases_locked_funds() {
        let (client, _rx) = client(dec!(0));
        client.update_quote(&pair(), dec!(99), dec!(101)).await;

        let id = client.submit_order(&sell(dec!(150), dec!(0.75))).await.unwrap();
        assert_eq!(client.balances(&pair()).await.unwrap().base.available, dec!(0.25));

        client.cancel_order(&pair(), &id).await.unwrap();
        assert_eq!(client.balances(&pair()).await.unwrap().base.available, dec!(1));
        assert!(client.cancel_order(&pair(), &id).await.is_err());
    }
}
