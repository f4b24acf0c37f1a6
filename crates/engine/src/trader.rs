use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use common::{ExchangeClient, Fill, OpenOrder, OrderCandidate, OrderEvent, OrderSide, PriceHistory, Result};
use risk::{BudgetChecker, StopLossMonitor};
use strategy::{Readiness, SignalGenerator, StrategyConfig, TraderState};

use crate::executor::OrderExecutor;
use crate::status::{ActiveOrderRow, StatusReport};

/// Moving-average crossover trader for one market.
///
/// Each `tick` runs readiness gate → signal generation → budget adjustment →
/// order execution → stop-loss check, strictly in that order. Order events
/// are delivered through `on_event` between ticks; the engine guarantees the
/// two never overlap, so the trader needs no locking.
pub struct CrossoverTrader {
    config: StrategyConfig,
    client: Arc<dyn ExchangeClient>,
    history: Arc<dyn PriceHistory>,
    signals: SignalGenerator,
    budget: BudgetChecker,
    executor: OrderExecutor,
    stop_loss: Option<StopLossMonitor>,
    state: TraderState,
}

impl CrossoverTrader {
    pub fn new(
        config: StrategyConfig,
        client: Arc<dyn ExchangeClient>,
        history: Arc<dyn PriceHistory>,
    ) -> Result<Self> {
        Ok(Self {
            signals: SignalGenerator::from_config(&config)?,
            budget: BudgetChecker::new(),
            executor: OrderExecutor::new(client.clone(), &config),
            stop_loss: config.stop_loss.map(StopLossMonitor::new),
            state: TraderState::new(),
            config,
            client,
            history,
        })
    }

    pub fn state(&self) -> &TraderState {
        &self.state
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Gate every tick on connector readiness. Logs the not-ready state on
    /// every call and the transition to ready only once.
    pub async fn check_ready(&mut self) -> bool {
        self.poll_readiness().await != Readiness::NotReady
    }

    async fn poll_readiness(&mut self) -> Readiness {
        let readiness = self.state.observe_ready(self.client.ready().await);
        match readiness {
            Readiness::BecameReady => info!("{} ready. Happy trading!", self.client.name()),
            Readiness::NotReady => warn!("{} not ready. Please wait.", self.client.name()),
            Readiness::StillReady => {}
        }
        readiness
    }

    /// One evaluation cycle. A fetch error aborts the rest of this tick only;
    /// a rejected buy is logged and the stop-loss check still runs.
    pub async fn tick(&mut self, now: f64) -> Result<()> {
        if !self.check_ready().await {
            return Ok(());
        }

        let candidate = match self.generate_proposal().await? {
            Some(proposal) => self.adjust_to_budget(proposal).await?,
            None => None,
        };

        if let Err(e) = self.executor.execute(candidate, &mut self.state, now).await {
            error!(pair = %self.config.trading_pair, error = %e, "Buy submission failed");
        }

        if self.stop_loss.is_some() {
            self.check_stop_loss().await?;
        }
        Ok(())
    }

    /// Fetch closes, evaluate the moving-average signal and, when it fires,
    /// price a buy at the current ask.
    pub async fn generate_proposal(&mut self) -> Result<Option<OrderCandidate>> {
        let closes = self
            .history
            .fetch_closes(
                &self.config.trading_pair,
                self.config.candle_interval,
                self.signals.required_closes(),
            )
            .await?;

        let reading = self.signals.evaluate(&closes)?;
        self.state.last_reading = Some(reading);
        debug!(
            average = %reading.average,
            threshold = %reading.threshold,
            last_close = %reading.last_close,
            triggered = reading.triggered,
            "Moving average evaluated"
        );

        if !reading.triggered {
            return Ok(None);
        }

        let ask = self
            .client
            .current_price(&self.config.trading_pair, true)
            .await?;
        let proposal = self.signals.propose(&reading, ask);
        if proposal.is_none() {
            warn!(ask = %ask, "Signal fired but the ask price is unusable");
        }
        Ok(proposal)
    }

    async fn adjust_to_budget(&self, proposal: OrderCandidate) -> Result<Option<OrderCandidate>> {
        let balances = self.client.balances(&self.config.trading_pair).await?;
        Ok(self
            .budget
            .adjust(vec![proposal], &balances, self.config.all_or_none)
            .into_iter()
            .next())
    }

    /// Cancel and liquidate every order this trader placed that drifted past
    /// the stop-loss spread. Other orders on the account are left alone. A
    /// failure on one order is logged and the rest still run.
    pub async fn check_stop_loss(&mut self) -> Result<()> {
        let Some(monitor) = &self.stop_loss else {
            return Ok(());
        };
        let pair = &self.config.trading_pair;

        let open_orders: Vec<OpenOrder> = self
            .client
            .open_orders(pair)
            .await?
            .into_iter()
            .filter(|o| self.state.owns(&o.id))
            .collect();
        if open_orders.is_empty() {
            return Ok(());
        }

        let current_price = self.client.current_price(pair, false).await?;
        if current_price <= Decimal::ZERO {
            warn!(price = %current_price, "Stop-loss check skipped: no usable market price");
            return Ok(());
        }

        for breach in monitor.breaches(&open_orders, current_price) {
            let order_id = breach.order.id.clone();
            if let Err(e) = self.client.cancel_order(pair, &order_id).await {
                error!(order_id = %order_id, error = %e, "Stop-loss cancel failed");
                continue;
            }
            self.state.take_order(&order_id);

            match self.executor.submit(&breach.liquidation(current_price)).await {
                Ok(sell_id) => {
                    info!(
                        cancelled = %order_id,
                        liquidation = %sell_id,
                        price = %current_price,
                        qty = %breach.order.quantity,
                        "Stop-loss liquidation submitted"
                    );
                    self.state.record_sell(sell_id);
                }
                Err(e) => {
                    error!(order_id = %order_id, error = %e, "Stop-loss liquidation failed");
                }
            }
        }
        Ok(())
    }

    /// Dispatch an order event from the exchange.
    pub async fn on_event(&mut self, event: OrderEvent) -> Result<()> {
        match event {
            OrderEvent::Created(order) => {
                self.on_order_created(&order);
                Ok(())
            }
            OrderEvent::Filled(fill) => match self.state.take_order(&fill.order_id) {
                Some(OrderSide::Buy) => self.on_buy_filled(&fill).await,
                Some(OrderSide::Sell) => {
                    self.on_sell_filled(&fill);
                    Ok(())
                }
                None => {
                    debug!(order_id = %fill.order_id, "Ignoring fill for an order this trader did not place");
                    Ok(())
                }
            },
        }
    }

    fn on_order_created(&self, order: &OpenOrder) {
        if !self.state.owns(&order.id) {
            return;
        }
        info!(
            order_id = %order.id,
            price = %order.price,
            qty = %order.quantity,
            "{} order created",
            if order.side == OrderSide::Buy { "Buy" } else { "Sell" }
        );
    }

    async fn on_buy_filled(&mut self, fill: &Fill) -> Result<()> {
        info!(
            order_id = %fill.order_id,
            price = %fill.price,
            qty = %fill.quantity,
            "Buy order filled"
        );
        self.executor.on_buy_filled(fill, &mut self.state).await?;
        Ok(())
    }

    fn on_sell_filled(&mut self, fill: &Fill) {
        self.state.closed_trades += 1;
        info!(
            order_id = %fill.order_id,
            price = %fill.price,
            qty = %fill.quantity,
            closed_trades = self.state.closed_trades,
            "Sell order filled"
        );
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let pair = &self.config.trading_pair;
        let balances = self.client.balances(pair).await?;
        let open_orders = self.client.open_orders(pair).await?;
        let current_price = self.client.current_price(pair, false).await.ok();
        let now = Utc::now();

        Ok(StatusReport {
            connector: self.client.name().to_string(),
            pair: pair.clone(),
            ready: self.state.connector_ready,
            reading: self.state.last_reading,
            current_price,
            balances,
            closed_trades: self.state.closed_trades,
            orders: open_orders
                .iter()
                .filter(|o| self.state.owns(&o.id))
                .map(|o| ActiveOrderRow::from_order(o, current_price, now))
                .collect(),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
