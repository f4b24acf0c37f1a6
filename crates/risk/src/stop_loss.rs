use rust_decimal::Decimal;
use tracing::info;

use common::{OpenOrder, OrderCandidate};

/// An open order whose price drifted past the stop-loss spread.
#[derive(Debug, Clone, PartialEq)]
pub struct StopLossBreach {
    pub order: OpenOrder,
    /// `|order.price - current_price| / current_price`.
    pub spread: Decimal,
}

impl StopLossBreach {
    /// Sell the order's full quantity at the current price.
    pub fn liquidation(&self, current_price: Decimal) -> OrderCandidate {
        OrderCandidate::sell(current_price, self.order.quantity)
    }
}

/// Scans open orders for stop-loss breaches.
///
/// Only selects; cancelling and liquidating is up to the caller, which owns
/// the exchange client.
#[derive(Debug, Clone)]
pub struct StopLossMonitor {
    max_spread: Decimal,
}

impl StopLossMonitor {
    /// `max_spread` is a fraction, e.g. 0.05 for 5%.
    pub fn new(max_spread: Decimal) -> Self {
        Self { max_spread }
    }

    /// Relative distance between an order price and the market.
    /// `None` when the market price is not positive.
    pub fn spread(order_price: Decimal, current_price: Decimal) -> Option<Decimal> {
        if current_price <= Decimal::ZERO {
            return None;
        }
        (order_price - current_price).abs().checked_div(current_price)
    }

    /// Orders whose spread is strictly greater than the limit.
    pub fn breaches(&self, orders: &[OpenOrder], current_price: Decimal) -> Vec<StopLossBreach> {
        orders
            .iter()
            .filter_map(|order| {
                let spread = Self::spread(order.price, current_price)?;
                if spread <= self.max_spread {
                    return None;
                }
                info!(
                    id = %order.id,
                    side = %order.side,
                    price = %order.price,
                    current = %current_price,
                    spread = %spread,
                    "Stop-loss triggered"
                );
                Some(StopLossBreach {
                    order: order.clone(),
                    spread,
                })
            })
            .collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderSide, TradingPair};
    use rust_decimal_macros::dec;

    fn make_order(id: &str, price: Decimal, quantity: Decimal) -> OpenOrder {
        OpenOrder {
            id: id.into(),
            pair: TradingPair::new("BTC", "USDT"),
            side: OrderSide::Sell,
            price,
            quantity,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn breach_beyond_spread_is_reported() {
        let monitor = StopLossMonitor::new(dec!(0.05));
        let orders = vec![
            make_order("near", dec!(1020), dec!(1)),
            make_order("far", dec!(1100), dec!(0.5)),
        ];

        let breaches = monitor.breaches(&orders, dec!(1000));
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].order.id, "far");
        assert_eq!(breaches[0].spread, dec!(0.1));

        let sell = breaches[0].liquidation(dec!(1000));
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.price, dec!(1000));
        assert_eq!(sell.quantity, dec!(0.5));
    }

    #[test]
    fn spread_equal_to_limit_is_kept() {
        let monitor = StopLossMonitor::new(dec!(0.05));
        let orders = vec![
            make_order("above", dec!(1050), dec!(1)),
            make_order("below", dec!(950), dec!(1)),
        ];
        assert!(monitor.breaches(&orders, dec!(1000)).is_empty());
    }

    #[test]
    fn drift_below_market_counts_too() {
        let monitor = StopLossMonitor::new(dec!(0.05));
        let orders = vec![make_order("low", dec!(900), dec!(1))];
        assert_eq!(monitor.breaches(&orders, dec!(1000)).len(), 1);
    }

    #[test]
    fn non_positive_market_price_skips_everything() {
        let monitor = StopLossMonitor::new(dec!(0.01));
        let orders = vec![make_order("x", dec!(5000), dec!(1))];
        assert!(monitor.breaches(&orders, dec!(0)).is_empty());
        assert!(StopLossMonitor::spread(dec!(1), dec!(-1)).is_none());
    }
}
