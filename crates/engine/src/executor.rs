use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{ExchangeClient, Fill, OrderCandidate, OrderRequest, Result, TradingPair};
use strategy::{markup_sell, SellQuantityPolicy, StrategyConfig, TraderState};

/// Outcome of the pre-submission gates for a buy candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Submit,
    CoolingOff,
    NonPositiveSize,
}

/// Submits the trader's orders to the exchange.
///
/// Buys pass the cool-off and size gates first; each buy fill is answered
/// with a markup sell. Nothing is retried here: a failed submission is
/// returned to the caller.
pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    pair: TradingPair,
    cool_off: Option<Duration>,
    sell_markup: Decimal,
    sell_policy: SellQuantityPolicy,
    order_amount: Decimal,
}

impl OrderExecutor {
    pub fn new(client: Arc<dyn ExchangeClient>, cfg: &StrategyConfig) -> Self {
        Self {
            client,
            pair: cfg.trading_pair.clone(),
            cool_off: cfg.cool_off,
            sell_markup: cfg.sell_markup,
            sell_policy: cfg.sell_quantity_policy,
            order_amount: cfg.order_amount,
        }
    }

    pub fn admit(&self, candidate: &OrderCandidate, state: &TraderState, now: f64) -> Admission {
        if state.in_cool_off(now, self.cool_off) {
            Admission::CoolingOff
        } else if candidate.quantity <= Decimal::ZERO {
            Admission::NonPositiveSize
        } else {
            Admission::Submit
        }
    }

    /// Gate and submit a buy candidate. The cool-off clock only starts once
    /// the exchange has accepted the order.
    pub async fn execute(
        &self,
        candidate: Option<OrderCandidate>,
        state: &mut TraderState,
        now: f64,
    ) -> Result<Option<String>> {
        let Some(candidate) = candidate else {
            return Ok(None);
        };

        match self.admit(&candidate, state, now) {
            Admission::Submit => {}
            Admission::CoolingOff => {
                info!(
                    last_order = state.last_order_timestamp,
                    "Buy suppressed: cool-off interval still running"
                );
                return Ok(None);
            }
            Admission::NonPositiveSize => {
                warn!(quantity = %candidate.quantity, "Buy suppressed: non-positive quantity");
                return Ok(None);
            }
        }

        let order_id = self.submit(&candidate).await?;
        state.record_buy(order_id.clone(), now);
        Ok(Some(order_id))
    }

    /// The markup sell answering a buy fill.
    pub fn markup_sell_for(&self, fill: &Fill) -> OrderCandidate {
        markup_sell(
            fill.price,
            fill.quantity,
            self.sell_markup,
            self.sell_policy,
            self.order_amount,
        )
    }

    /// Submit the markup sell for a buy this trader placed.
    pub async fn on_buy_filled(&self, fill: &Fill, state: &mut TraderState) -> Result<Option<String>> {
        let sell = self.markup_sell_for(fill);
        if sell.quantity <= Decimal::ZERO {
            warn!(order_id = %fill.order_id, quantity = %sell.quantity, "Markup sell skipped: non-positive quantity");
            return Ok(None);
        }
        let order_id = self.submit(&sell).await?;
        state.record_sell(order_id.clone());
        Ok(Some(order_id))
    }

    /// Submit a limit order for the trader's pair.
    pub async fn submit(&self, candidate: &OrderCandidate) -> Result<String> {
        let request = OrderRequest::from_candidate(self.pair.clone(), candidate);
        let order_id = self.client.submit_order(&request).await?;
        info!(
            pair = %self.pair,
            side = %candidate.side,
            price = %candidate.price,
            qty = %candidate.quantity,
            order_id = %order_id,
            "Order submitted"
        );
        Ok(order_id)
    }
}
