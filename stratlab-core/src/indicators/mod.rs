//! Indicator library.
//!
//! Every indicator exists in two forms:
//! - a pure per-index function (`moving_average(bars, column, period, index)`)
//!   that reads the bar table up to and including `index`;
//! - an `Indicator` implementation whose `compute()` produces the full series
//!   by evaluating the per-index function once per bar.
//!
//! Strategy programs never call the per-index functions directly. They go
//! through `IndicatorCache`, which computes each distinct key once per run and
//! serves lookups from the stored series.
//!
//! Insufficient history yields `0.0`, not NaN. Downstream comparisons in
//! strategy programs rely on that edge value.

pub mod atr;
pub mod bollinger;
pub mod cache;
pub mod sma;
pub mod supertrend;

pub use atr::{average_true_range, true_range, Atr};
pub use bollinger::{bollinger, standard_deviation, Bands, Bollinger, BollingerBand, StdDev};
pub use cache::{IndicatorCache, IndicatorKey};
pub use sma::{moving_average, moving_average_difference, MaDifference, Sma};
pub use supertrend::{trend_direction, Supertrend, SupertrendOutput, TrendSeries};

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. Values inside the warmup window are `0.0`.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_Close_20", "atr_14").
    fn name(&self) -> String;

    /// Number of leading bars that only produce the warmup value.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLC: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            let mut bar = Bar::ohlc(format!("t{i}"), open, high, low, close);
            bar.volume = 1000.0;
            bar
        })
        .collect()
}

/// Create bars from explicit (open, high, low, close) tuples for testing.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar::ohlc(format!("t{i}"), open, high, low, close))
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
