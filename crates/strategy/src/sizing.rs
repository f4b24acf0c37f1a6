use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use common::OrderCandidate;

/// Tolerance subtracted from a filled quantity so the follow-up sell never
/// asks for more than the wallet received.
pub const DUST_EPSILON: Decimal = dec!(0.00001);

/// How the quantity of the markup sell is derived from a buy fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellQuantityPolicy {
    /// Keep the notional of the fill: `max(fill_price * fill_qty / sell_price, fill_qty - DUST_EPSILON)`.
    #[default]
    PreserveNotional,
    /// Spend the configured order amount again: `order_amount / sell_price`.
    OrderAmount,
}

impl SellQuantityPolicy {
    pub fn quantity(
        &self,
        fill_price: Decimal,
        fill_qty: Decimal,
        sell_price: Decimal,
        order_amount: Decimal,
    ) -> Decimal {
        match self {
            SellQuantityPolicy::PreserveNotional => {
                let notional_qty = (fill_price * fill_qty)
                    .checked_div(sell_price)
                    .unwrap_or(Decimal::ZERO);
                notional_qty.max(fill_qty - DUST_EPSILON)
            }
            SellQuantityPolicy::OrderAmount => order_amount
                .checked_div(sell_price)
                .unwrap_or(Decimal::ZERO),
        }
    }
}

/// `fill_price * (1 + markup)`.
pub fn sell_price(fill_price: Decimal, markup: Decimal) -> Decimal {
    fill_price * (Decimal::ONE + markup)
}

/// The offsetting sell for a buy fill.
pub fn markup_sell(
    fill_price: Decimal,
    fill_qty: Decimal,
    markup: Decimal,
    policy: SellQuantityPolicy,
    order_amount: Decimal,
) -> OrderCandidate {
    let price = sell_price(fill_price, markup);
    let quantity = policy.quantity(fill_price, fill_qty, price, order_amount);
    OrderCandidate::sell(price, quantity)
}
