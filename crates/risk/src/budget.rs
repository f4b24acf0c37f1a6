use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use common::{Balances, OrderCandidate, OrderSide};

/// Quantities are cut to this many decimal places when scaled down.
const QUANTITY_DP: u32 = 8;

/// Fits order candidates into the available wallet balances.
///
/// Buys consume available quote, sells consume available base. Candidates
/// are admitted in order and each one reduces what is left for the next.
#[derive(Debug, Clone, Default)]
pub struct BudgetChecker;

impl BudgetChecker {
    pub fn new() -> Self {
        Self
    }

    /// With `all_or_none` a candidate that does not fit is dropped; otherwise
    /// its quantity is scaled down to what the balance covers.
    pub fn adjust(
        &self,
        candidates: Vec<OrderCandidate>,
        balances: &Balances,
        all_or_none: bool,
    ) -> Vec<OrderCandidate> {
        let mut quote_left = balances.quote.available.max(Decimal::ZERO);
        let mut base_left = balances.base.available.max(Decimal::ZERO);

        candidates
            .into_iter()
            .filter_map(|mut candidate| {
                let affordable = match candidate.side {
                    OrderSide::Buy => quote_left
                        .checked_div(candidate.price)
                        .unwrap_or(Decimal::ZERO),
                    OrderSide::Sell => base_left,
                };

                if candidate.quantity > affordable {
                    if all_or_none {
                        warn!(
                            side = %candidate.side,
                            wanted = %candidate.quantity,
                            affordable = %affordable,
                            "Candidate dropped: insufficient balance"
                        );
                        return None;
                    }
                    let scaled =
                        affordable.round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero);
                    debug!(
                        side = %candidate.side,
                        wanted = %candidate.quantity,
                        scaled = %scaled,
                        "Candidate scaled down to balance"
                    );
                    candidate.quantity = scaled;
                }

                if candidate.quantity <= Decimal::ZERO {
                    return None;
                }

                match candidate.side {
                    OrderSide::Buy => quote_left -= candidate.notional(),
                    OrderSide::Sell => base_left -= candidate.quantity,
                }
                Some(candidate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AssetBalance;
    use rust_decimal_macros::dec;

    fn balances(base: Decimal, quote: Decimal) -> Balances {
        Balances {
            base: AssetBalance::new("BTC", base, base),
            quote: AssetBalance::new("USDT", quote, quote),
        }
    }

    #[test]
    fn affordable_candidates_pass_untouched() {
        let out = BudgetChecker::new().adjust(
            vec![OrderCandidate::buy(dec!(100), dec!(0.5))],
            &balances(dec!(0), dec!(1000)),
            false,
        );
        assert_eq!(out, vec![OrderCandidate::buy(dec!(100), dec!(0.5))]);
    }

    #[test]
    fn oversized_buy_is_scaled_down() {
        let out = BudgetChecker::new().adjust(
            vec![OrderCandidate::buy(dec!(100), dec!(2))],
            &balances(dec!(0), dec!(150)),
            false,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quantity, dec!(1.5));
    }

    #[test]
    fn oversized_buy_is_dropped_when_all_or_none() {
        let out = BudgetChecker::new().adjust(
            vec![OrderCandidate::buy(dec!(100), dec!(2))],
            &balances(dec!(0), dec!(150)),
            true,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn empty_wallet_drops_candidates() {
        let out = BudgetChecker::new().adjust(
            vec![
                OrderCandidate::buy(dec!(100), dec!(1)),
                OrderCandidate::sell(dec!(100), dec!(1)),
            ],
            &balances(dec!(0), dec!(0)),
            false,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn balance_is_consumed_across_candidates() {
        let out = BudgetChecker::new().adjust(
            vec![
                OrderCandidate::buy(dec!(10), dec!(6)),
                OrderCandidate::buy(dec!(10), dec!(6)),
            ],
            &balances(dec!(0), dec!(100)),
            false,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].quantity, dec!(6));
        assert_eq!(out[1].quantity, dec!(4));
    }

    #[test]
    fn sells_are_limited_by_base_balance() {
        let out = BudgetChecker::new().adjust(
            vec![OrderCandidate::sell(dec!(100), dec!(3))],
            &balances(dec!(1.25), dec!(0)),
            false,
        );
        assert_eq!(out[0].quantity, dec!(1.25));
    }
}
