//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(column, period)
//! - Upper: middle + mult * stddev(column, period)
//! - Lower: middle - mult * stddev(column, period)
//!
//! Uses population stddev (divide by N), two-pass so rounding can never push
//! the variance below zero. Lookback: period - 1.

use super::sma::moving_average;
use super::Indicator;
use crate::domain::{Bar, Column};
use serde::{Deserialize, Serialize};

/// Population standard deviation of `column` over the `period` bars ending at
/// `index`. Returns `0.0` while `index < period - 1`.
pub fn standard_deviation(bars: &[Bar], column: Column, period: usize, index: usize) -> f64 {
    if period == 0 || index + 1 < period {
        return 0.0;
    }
    let window = &bars[(index + 1 - period)..=index];
    let mean = moving_average(bars, column, period, index);
    let variance = window
        .iter()
        .map(|bar| {
            let diff = bar.get(column) - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    variance.max(0.0).sqrt()
}

/// All three bands at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger(
    bars: &[Bar],
    column: Column,
    period: usize,
    multiplier: f64,
    index: usize,
) -> Bands {
    let middle = moving_average(bars, column, period, index);
    let width = multiplier * standard_deviation(bars, column, period, index);
    Bands {
        upper: middle + width,
        middle,
        lower: middle - width,
    }
}

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

impl BollingerBand {
    pub fn select(&self, bands: Bands) -> f64 {
        match self {
            BollingerBand::Upper => bands.upper,
            BollingerBand::Middle => bands.middle,
            BollingerBand::Lower => bands.lower,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StdDev {
    column: Column,
    period: usize,
}

impl StdDev {
    pub fn new(column: Column, period: usize) -> Self {
        assert!(period >= 1, "stddev period must be >= 1");
        Self { column, period }
    }
}

impl Indicator for StdDev {
    fn name(&self) -> String {
        format!("stddev_{}_{}", self.column, self.period)
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| standard_deviation(bars, self.column, self.period, i))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    column: Column,
    period: usize,
    multiplier: f64,
    band: BollingerBand,
}

impl Bollinger {
    pub fn new(column: Column, period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            column,
            period,
            multiplier,
            band,
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> String {
        format!(
            "bollinger_{}_{}_{}_{}",
            self.band.label(),
            self.column,
            self.period,
            self.multiplier
        )
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| {
                self.band
                    .select(bollinger(bars, self.column, self.period, self.multiplier, i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn stddev_hand_computed() {
        // window [2, 4, 4, 4, 5, 5, 7, 9] has population stddev 2
        let bars = make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_approx(
            standard_deviation(&bars, Column::Close, 8, 7),
            2.0,
            DEFAULT_EPSILON,
        );
        assert_eq!(standard_deviation(&bars, Column::Close, 8, 6), 0.0);
    }

    #[test]
    fn bollinger_middle_is_sma() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let mid = Bollinger::new(Column::Close, 3, 2.0, BollingerBand::Middle).compute(&bars);
        assert_eq!(mid[0], 0.0);
        assert_eq!(mid[1], 0.0);
        assert_approx(mid[2], 11.0, DEFAULT_EPSILON);
        assert_approx(mid[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let bars = make_bars(&[10.0, 11.5, 12.0, 9.0, 14.0, 13.0]);
        for i in 0..bars.len() {
            let b = bollinger(&bars, Column::Close, 3, 2.5, i);
            assert_approx(b.upper - b.middle, b.middle - b.lower, 1e-9);
            assert!(b.upper >= b.lower);
        }
    }

    #[test]
    fn bollinger_constant_price_zero_width() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0]);
        let b = bollinger(&bars, Column::Close, 3, 2.0, 3);
        assert_approx(b.upper, 100.0, DEFAULT_EPSILON);
        assert_approx(b.lower, 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_lookback_and_name() {
        let bb = Bollinger::new(Column::Close, 20, 2.0, BollingerBand::Upper);
        assert_eq!(bb.lookback(), 19);
        assert_eq!(bb.name(), "bollinger_upper_Close_20_2");
    }
}
