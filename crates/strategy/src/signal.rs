use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Error, OrderCandidate, Result};

use crate::config::StrategyConfig;
use crate::indicators::SimpleMovingAverage;

/// Which side of the threshold triggers a buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Buy when the latest close falls below the threshold.
    #[default]
    Dip,
    /// Buy when the latest close rises above the threshold.
    Rise,
}

/// Result of comparing the latest close against the moving-average threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverageReading {
    pub average: Decimal,
    /// `average * (1 - swing)`.
    pub threshold: Decimal,
    pub last_close: Decimal,
    pub triggered: bool,
}

/// Turns a series of closes into buy candidates.
///
/// Evaluation is pure: callers fetch the closes and the current ask price
/// and hand them in, so this type never touches the network.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    sma: SimpleMovingAverage,
    swing: Decimal,
    policy: SignalPolicy,
    order_amount: Decimal,
}

impl SignalGenerator {
    pub fn new(
        window: usize,
        swing: Decimal,
        policy: SignalPolicy,
        order_amount: Decimal,
    ) -> Result<Self> {
        let sma = SimpleMovingAverage::new(window)
            .ok_or_else(|| Error::Config("moving-average window must be at least 1".into()))?;
        Ok(Self {
            sma,
            swing,
            policy,
            order_amount,
        })
    }

    pub fn from_config(cfg: &StrategyConfig) -> Result<Self> {
        Self::new(cfg.window, cfg.market_swing, cfg.signal_policy, cfg.order_amount)
    }

    /// Closes needed per evaluation: the window plus the current sample.
    pub fn required_closes(&self) -> usize {
        self.sma.period + 1
    }

    /// Average the `window` closes preceding the last one and test the last
    /// close against the swing threshold.
    pub fn evaluate(&self, closes: &[Decimal]) -> Result<MovingAverageReading> {
        let required = self.required_closes();
        let insufficient = || Error::InsufficientHistory {
            required,
            available: closes.len(),
        };
        if closes.len() < required {
            return Err(insufficient());
        }
        let (&last_close, prior) = closes.split_last().ok_or_else(insufficient)?;
        let average = self.sma.compute(prior).ok_or_else(insufficient)?;
        let threshold = average * (Decimal::ONE - self.swing);

        let triggered = match self.policy {
            SignalPolicy::Dip => last_close < threshold,
            SignalPolicy::Rise => last_close > threshold,
        };

        Ok(MovingAverageReading {
            average,
            threshold,
            last_close,
            triggered,
        })
    }

    /// Size a buy at `ask` when the reading triggered.
    /// A non-positive ask yields no candidate.
    pub fn propose(&self, reading: &MovingAverageReading, ask: Decimal) -> Option<OrderCandidate> {
        if !reading.triggered || ask <= Decimal::ZERO {
            return None;
        }
        let quantity = self.order_amount.checked_div(ask)?;
        Some(OrderCandidate::buy(ask, quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderSide;
    use rust_decimal_macros::dec;

    fn generator(policy: SignalPolicy) -> SignalGenerator {
        SignalGenerator::new(3, dec!(0.05), policy, dec!(90)).unwrap()
    }

    #[test]
    fn dip_below_threshold_triggers_buy() {
        let gen = generator(SignalPolicy::Dip);
        let reading = gen
            .evaluate(&[dec!(100), dec!(100), dec!(100), dec!(90)])
            .unwrap();
        assert_eq!(reading.average, dec!(100));
        assert_eq!(reading.threshold, dec!(95));
        assert!(reading.triggered);

        let candidate = gen.propose(&reading, dec!(90)).unwrap();
        assert_eq!(candidate.side, OrderSide::Buy);
        assert_eq!(candidate.price, dec!(90));
        assert_eq!(candidate.quantity, dec!(1));
    }

    #[test]
    fn close_at_threshold_does_not_trigger_either_policy() {
        let closes = [dec!(100), dec!(100), dec!(100), dec!(95)];
        assert!(!generator(SignalPolicy::Dip).evaluate(&closes).unwrap().triggered);
        assert!(!generator(SignalPolicy::Rise).evaluate(&closes).unwrap().triggered);
    }

    #[test]
    fn rise_policy_inverts_the_test() {
        let gen = generator(SignalPolicy::Rise);
        let up = gen.evaluate(&[dec!(100), dec!(100), dec!(100), dec!(99)]).unwrap();
        assert!(up.triggered);
        let down = gen.evaluate(&[dec!(100), dec!(100), dec!(100), dec!(90)]).unwrap();
        assert!(!down.triggered);
    }

    #[test]
    fn only_the_trailing_window_is_averaged() {
        let gen = generator(SignalPolicy::Dip);
        // The leading 1 is outside the window and must not drag the average down.
        let reading = gen
            .evaluate(&[dec!(1), dec!(100), dec!(100), dec!(100), dec!(96)])
            .unwrap();
        assert_eq!(reading.average, dec!(100));
        assert!(!reading.triggered);
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let gen = generator(SignalPolicy::Dip);
        let err = gen.evaluate(&[dec!(100), dec!(100), dec!(90)]).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientHistory { required: 4, available: 3 }
        ));
        assert!(gen.evaluate(&[]).is_err());
    }

    #[test]
    fn no_candidate_without_trigger_or_price() {
        let gen = generator(SignalPolicy::Dip);
        let quiet = gen.evaluate(&[dec!(100), dec!(100), dec!(100), dec!(100)]).unwrap();
        assert!(gen.propose(&quiet, dec!(100)).is_none());

        let hot = gen.evaluate(&[dec!(100), dec!(100), dec!(100), dec!(50)]).unwrap();
        assert!(gen.propose(&hot, dec!(0)).is_none());
    }

    #[test]
    fn zero_window_is_a_config_error() {
        let err = SignalGenerator::new(0, dec!(0.05), SignalPolicy::Dip, dec!(90)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
