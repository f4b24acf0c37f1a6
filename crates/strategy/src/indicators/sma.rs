use rust_decimal::Decimal;

/// Simple (unweighted) moving average over the last `period` values.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    pub period: usize,
}

impl SimpleMovingAverage {
    /// `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        (period >= 1).then_some(Self { period })
    }

    /// Mean of the last `period` values (oldest first).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, values: &[Decimal]) -> Option<Decimal> {
        if values.len() < self.period {
            return None;
        }
        let window = &values[values.len() - self.period..];
        let sum: Decimal = window.iter().copied().sum();
        Some(sum / Decimal::from(self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_returns_none_when_insufficient_data() {
        let sma = SimpleMovingAverage::new(3).unwrap();
        assert!(sma.compute(&[dec!(1), dec!(2)]).is_none());
    }

    #[test]
    fn sma_uses_only_the_trailing_window() {
        let sma = SimpleMovingAverage::new(2).unwrap();
        let value = sma.compute(&[dec!(100), dec!(4), dec!(6)]).unwrap();
        assert_eq!(value, dec!(5));
    }

    #[test]
    fn sma_is_exact_for_decimal_prices() {
        // 0.1 + 0.2 + 0.3 drifts in f64; decimals must not.
        let sma = SimpleMovingAverage::new(3).unwrap();
        let value = sma.compute(&[dec!(0.1), dec!(0.2), dec!(0.3)]).unwrap();
        assert_eq!(value, dec!(0.2));
    }

    #[test]
    fn sma_rejects_zero_period() {
        assert!(SimpleMovingAverage::new(0).is_none());
    }
}
