//! In-memory collaborators for engine unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{
    AssetBalance, Balances, CandleInterval, Error, ExchangeClient, OpenOrder, OrderRequest,
    PriceHistory, Result, TradingPair,
};
use strategy::{SellQuantityPolicy, SignalPolicy, StrategyConfig};

/// Window 3, swing 5%, markup 1%, 100 USDT per order, no cool-off, no stop-loss.
pub fn sample_config() -> StrategyConfig {
    StrategyConfig {
        connector: "mock".into(),
        trading_pair: TradingPair::new("BTC", "USDT"),
        order_amount: dec!(100),
        market_swing: dec!(0.05),
        window: 3,
        sell_markup: dec!(0.01),
        cool_off: None,
        stop_loss: None,
        signal_policy: SignalPolicy::Dip,
        sell_quantity_policy: SellQuantityPolicy::PreserveNotional,
        candle_interval: CandleInterval::OneDay,
        tick_interval: Duration::from_secs(1),
        all_or_none: false,
    }
}

pub struct MockExchange {
    ready: AtomicBool,
    reject: AtomicBool,
    next_id: AtomicUsize,
    pub bid: Mutex<Decimal>,
    pub ask: Mutex<Decimal>,
    pub quote_available: Mutex<Decimal>,
    pub open: Mutex<Vec<OpenOrder>>,
    submitted: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            reject: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
            bid: Mutex::new(dec!(100)),
            ask: Mutex::new(dec!(100)),
            quote_available: Mutex::new(dec!(10000)),
            open: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn reject_orders(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn set_prices(&self, bid: Decimal, ask: Decimal) {
        *self.bid.lock().unwrap() = bid;
        *self.ask.lock().unwrap() = ask;
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn current_price(&self, _pair: &TradingPair, is_buy: bool) -> Result<Decimal> {
        Ok(if is_buy {
            *self.ask.lock().unwrap()
        } else {
            *self.bid.lock().unwrap()
        })
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<String> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::OrderRejected("insufficient balance".into()));
        }
        let id = format!("order-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.submitted.lock().unwrap().push(order.clone());
        self.open.lock().unwrap().push(OpenOrder {
            id: id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn cancel_order(&self, _pair: &TradingPair, order_id: &str) -> Result<()> {
        self.cancelled.lock().unwrap().push(order_id.to_string());
        self.open.lock().unwrap().retain(|o| o.id != order_id);
        Ok(())
    }

    async fn open_orders(&self, _pair: &TradingPair) -> Result<Vec<OpenOrder>> {
        Ok(self.open.lock().unwrap().clone())
    }

    async fn balances(&self, pair: &TradingPair) -> Result<Balances> {
        let quote = *self.quote_available.lock().unwrap();
        Ok(Balances {
            base: AssetBalance::new(pair.base(), dec!(1), dec!(1)),
            quote: AssetBalance::new(pair.quote(), quote, quote),
        })
    }
}

/// Serves a fixed series of closes and counts how often it was asked.
pub struct FixedHistory {
    closes: Mutex<Vec<Decimal>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FixedHistory {
    pub fn new(closes: Vec<Decimal>) -> Self {
        Self {
            closes: Mutex::new(closes),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceHistory for FixedHistory {
    async fn fetch_closes(
        &self,
        _pair: &TradingPair,
        _interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Http("connection reset".into()));
        }
        let closes = self.closes.lock().unwrap();
        let start = closes.len().saturating_sub(limit);
        Ok(closes[start..].to_vec())
    }
}
