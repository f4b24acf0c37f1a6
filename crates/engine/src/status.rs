use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use common::{Balances, OpenOrder, OrderSide, TradingPair};
use risk::StopLossMonitor;
use strategy::MovingAverageReading;

/// One line of the active-orders table.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOrderRow {
    pub id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Distance from the current price as a fraction; `None` without a price.
    pub spread: Option<Decimal>,
    pub age: Duration,
}

impl ActiveOrderRow {
    pub fn from_order(order: &OpenOrder, current_price: Option<Decimal>, now: DateTime<Utc>) -> Self {
        Self {
            id: order.id.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            spread: current_price.and_then(|p| StopLossMonitor::spread(order.price, p)),
            age: order.age(now),
        }
    }
}

/// Operator-facing snapshot of the trader.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub connector: String,
    pub pair: TradingPair,
    pub ready: bool,
    pub reading: Option<MovingAverageReading>,
    pub current_price: Option<Decimal>,
    pub balances: Balances,
    pub closed_trades: u64,
    pub orders: Vec<ActiveOrderRow>,
}

fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Market: {} {}", self.connector, self.pair)?;
        if !self.ready {
            writeln!(f, "  connector not ready")?;
        }

        match &self.reading {
            Some(r) => {
                writeln!(f, "  Moving average: {}", r.average.round_dp(8).normalize())?;
                writeln!(f, "  Threshold:      {}", r.threshold.round_dp(8).normalize())?;
                writeln!(f, "  Latest close:   {}", r.last_close.normalize())?;
            }
            None => writeln!(f, "  Moving average: n/a (no evaluation yet)")?,
        }
        if let Some(price) = self.current_price {
            writeln!(f, "  Current price:  {}", price.normalize())?;
        }

        writeln!(f, "Assets:")?;
        for balance in [&self.balances.base, &self.balances.quote] {
            writeln!(
                f,
                "  {:<8} total {:>18}  available {:>18}",
                balance.asset,
                balance.total.normalize().to_string(),
                balance.available.normalize().to_string()
            )?;
        }

        writeln!(f, "Closed trades: {}", self.closed_trades)?;

        if self.orders.is_empty() {
            return write!(f, "No active orders.");
        }
        writeln!(f, "Active orders:")?;
        writeln!(
            f,
            "  {:<4} {:>16} {:>16} {:>9} {:>9}",
            "Side", "Price", "Amount", "Spread", "Age"
        )?;
        for row in &self.orders {
            let spread = row
                .spread
                .map(|s| format!("{}%", (s * Decimal::ONE_HUNDRED).round_dp(2)))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                f,
                "  {:<4} {:>16} {:>16} {:>9} {:>9}",
                row.side.to_string(),
                row.price.normalize().to_string(),
                row.quantity.normalize().to_string(),
                spread,
                format_age(row.age)
            )?;
        }
        Ok(())
    }
}
