use std::collections::HashMap;
use std::time::Duration;

use common::OrderSide;

use crate::signal::MovingAverageReading;

/// What a connector readiness check changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// First ready observation after startup or after a not-ready spell.
    BecameReady,
    StillReady,
    NotReady,
}

/// Mutable state owned by one trader instance. Never persisted.
#[derive(Debug, Default)]
pub struct TraderState {
    pub connector_ready: bool,
    /// Epoch seconds of the last accepted buy; 0 means never ordered.
    pub last_order_timestamp: f64,
    /// Sell orders that filled since startup.
    pub closed_trades: u64,
    /// Most recent moving-average evaluation, kept for the status report.
    pub last_reading: Option<MovingAverageReading>,
    /// Orders this trader submitted and still expects events for.
    owned_orders: HashMap<String, OrderSide>,
}

impl TraderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a readiness observation. Only the false → true edge reports
    /// `BecameReady`.
    pub fn observe_ready(&mut self, ready: bool) -> Readiness {
        let was_ready = std::mem::replace(&mut self.connector_ready, ready);
        match (was_ready, ready) {
            (_, false) => Readiness::NotReady,
            (false, true) => Readiness::BecameReady,
            (true, true) => Readiness::StillReady,
        }
    }

    /// True while a previous buy is younger than `cool_off`.
    /// The boundary is open: at exactly `last + cool_off` buying resumes.
    pub fn in_cool_off(&self, now: f64, cool_off: Option<Duration>) -> bool {
        match cool_off {
            Some(interval) => self.last_order_timestamp > now - interval.as_secs_f64(),
            None => false,
        }
    }

    /// Record an accepted buy submission.
    pub fn record_buy(&mut self, order_id: impl Into<String>, now: f64) {
        self.last_order_timestamp = now;
        self.owned_orders.insert(order_id.into(), OrderSide::Buy);
    }

    pub fn record_sell(&mut self, order_id: impl Into<String>) {
        self.owned_orders.insert(order_id.into(), OrderSide::Sell);
    }

    /// Forget a completed order, returning its side if this trader placed it.
    pub fn take_order(&mut self, order_id: &str) -> Option<OrderSide> {
        self.owned_orders.remove(order_id)
    }

    pub fn owns(&self, order_id: &str) -> bool {
        self.owned_orders.contains_key(order_id)
    }
}
