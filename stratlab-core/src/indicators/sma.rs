//! Simple Moving Average (SMA) and the fast-minus-slow SMA difference.
//!
//! Mean of a column over a trailing window ending at the current bar.
//! Lookback: period - 1 (first non-zero value at index period-1).

use super::Indicator;
use crate::domain::{Bar, Column};

/// Mean of `column` over the `period` bars ending at `index`, inclusive.
///
/// Returns `0.0` while `index < period - 1`.
pub fn moving_average(bars: &[Bar], column: Column, period: usize, index: usize) -> f64 {
    if period == 0 || index + 1 < period {
        return 0.0;
    }
    let window = &bars[(index + 1 - period)..=index];
    let sum: f64 = window.iter().map(|bar| bar.get(column)).sum();
    sum / period as f64
}

/// `moving_average(fast) - moving_average(slow)`.
///
/// Each leg applies its own warmup rule, so the difference can be non-zero
/// before the slow leg has enough history.
pub fn moving_average_difference(
    bars: &[Bar],
    column: Column,
    fast: usize,
    slow: usize,
    index: usize,
) -> f64 {
    moving_average(bars, column, fast, index) - moving_average(bars, column, slow, index)
}

#[derive(Debug, Clone)]
pub struct Sma {
    column: Column,
    period: usize,
}

impl Sma {
    pub fn new(column: Column, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self { column, period }
    }
}

impl Indicator for Sma {
    fn name(&self) -> String {
        format!("sma_{}_{}", self.column, self.period)
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| moving_average(bars, self.column, self.period, i))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct MaDifference {
    column: Column,
    fast: usize,
    slow: usize,
}

impl MaDifference {
    pub fn new(column: Column, fast: usize, slow: usize) -> Self {
        assert!(fast >= 1 && slow >= 1, "MA difference periods must be >= 1");
        Self { column, fast, slow }
    }
}

impl Indicator for MaDifference {
    fn name(&self) -> String {
        format!("madiff_{}_{}_{}", self.column, self.fast, self.slow)
    }

    fn lookback(&self) -> usize {
        self.fast.max(self.slow).saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| moving_average_difference(bars, self.column, self.fast, self.slow, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_hand_computed_five_bars() {
        let bars = make_bars(&[2.0, 4.0, 6.0, 8.0, 10.0]);
        // period 3: zero until index 2
        assert_eq!(moving_average(&bars, Column::Close, 3, 0), 0.0);
        assert_eq!(moving_average(&bars, Column::Close, 3, 1), 0.0);
        assert_approx(moving_average(&bars, Column::Close, 3, 2), 4.0, DEFAULT_EPSILON);
        assert_approx(moving_average(&bars, Column::Close, 3, 3), 6.0, DEFAULT_EPSILON);
        assert_approx(moving_average(&bars, Column::Close, 3, 4), 8.0, DEFAULT_EPSILON);
        // period 5 covers the whole table only at the last bar
        assert_approx(moving_average(&bars, Column::Close, 5, 4), 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_column() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Sma::new(Column::Close, 1).compute(&bars);
        assert_eq!(result, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn sma_reads_requested_column() {
        let bars = make_bars(&[10.0, 20.0]);
        // make_bars sets high = max(open, close) + 1
        let high = moving_average(&bars, Column::High, 2, 1);
        assert_approx(high, (11.0 + 21.0) / 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[10.0, 11.0]);
        let result = Sma::new(Column::Close, 5).compute(&bars);
        assert!(result.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn difference_is_fast_minus_slow() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // fast(2) at 5 = 5.5, slow(4) at 5 = 4.5
        assert_approx(
            moving_average_difference(&bars, Column::Close, 2, 4, 5),
            1.0,
            DEFAULT_EPSILON,
        );
        // slow leg still warming up at index 1 → fast - 0
        assert_approx(
            moving_average_difference(&bars, Column::Close, 2, 4, 1),
            1.5,
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn lookbacks() {
        assert_eq!(Sma::new(Column::Close, 20).lookback(), 19);
        assert_eq!(MaDifference::new(Column::Close, 12, 26).lookback(), 25);
    }
}
