//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR is the plain arithmetic mean of the last `period` true ranges.
//! Lookback: period (the first bar has no previous close).

use super::Indicator;
use crate::domain::Bar;

/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar], index: usize) -> f64 {
    let bar = &bars[index];
    if index == 0 {
        return bar.high - bar.low;
    }
    let prev_close = bars[index - 1].close;
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Mean true range over the `period` bars ending at `index`.
///
/// Returns `0.0` while `index < period`, one bar longer than the SMA warmup.
pub fn average_true_range(bars: &[Bar], period: usize, index: usize) -> f64 {
    if period == 0 || index < period {
        return 0.0;
    }
    let sum: f64 = ((index + 1 - period)..=index)
        .map(|k| true_range(bars, k))
        .sum();
    sum / period as f64
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self { period }
    }
}

impl Indicator for Atr {
    fn name(&self) -> String {
        format!("atr_{}", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| average_true_range(bars, self.period, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, |108-102|, |100-102|) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, |107-106|, |98-106|) = 9
        ]);
        assert_approx(true_range(&bars, 0), 10.0, DEFAULT_EPSILON);
        assert_approx(true_range(&bars, 1), 8.0, DEFAULT_EPSILON);
        assert_approx(true_range(&bars, 2), 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        // Gap up: prev close 100, current bar 110-115-108
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, |115-100|, |108-100|) = 15
        ]);
        assert_approx(true_range(&bars, 1), 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ]);
        let result = Atr::new(3).compute(&bars);

        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 0.0);
        assert_eq!(result[2], 0.0);
        // ATR[3] = mean(8, 9, 6), ATR[4] = mean(9, 6, 6)
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(result[4], 7.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_lookback() {
        assert_eq!(Atr::new(14).lookback(), 14);
    }
}
