//! Supertrend — ATR-based trend direction with a trailing stop.
//!
//! Inherently sequential: the direction at bar i depends on the stop at bar
//! i-1, so the whole series is built in one forward pass and cached per
//! (period, factor). Recomputing from scratch per bar would be quadratic.
//!
//! Per bar:
//! - `mid = (high + low) / 2`, bands at `mid ± factor * atr`
//! - close above the previous stop → up, below → down, equal → carry
//! - stop = lower band when up, upper band when down
//!
//! Bar 0 starts up with the lower band as its stop.

use super::atr::average_true_range;
use super::Indicator;
use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Direction and trailing stop for every bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub up: Vec<bool>,
    pub stop: Vec<f64>,
}

impl TrendSeries {
    pub fn compute(bars: &[Bar], period: usize, factor: f64) -> Self {
        let n = bars.len();
        let mut up = Vec::with_capacity(n);
        let mut stop = Vec::with_capacity(n);

        for (i, bar) in bars.iter().enumerate() {
            let atr = average_true_range(bars, period, i);
            let mid = (bar.high + bar.low) / 2.0;
            let upper = mid + factor * atr;
            let lower = mid - factor * atr;

            let is_up = if i == 0 {
                true
            } else {
                let prev_stop = stop[i - 1];
                if bar.close > prev_stop {
                    true
                } else if bar.close < prev_stop {
                    false
                } else {
                    up[i - 1]
                }
            };

            up.push(is_up);
            stop.push(if is_up { lower } else { upper });
        }

        Self { up, stop }
    }

    pub fn len(&self) -> usize {
        self.up.len()
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }
}

/// Trend direction at `index` ("is up").
///
/// Builds the series up to `index` on every call. Use `IndicatorCache` for
/// repeated per-bar queries.
pub fn trend_direction(bars: &[Bar], period: usize, factor: f64, index: usize) -> bool {
    TrendSeries::compute(&bars[..=index], period, factor).up[index]
}

/// Which Supertrend series an indicator instance exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupertrendOutput {
    /// 1.0 when trending up, 0.0 when trending down.
    Direction,
    /// The trailing stop level.
    Stop,
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    factor: f64,
    output: SupertrendOutput,
}

impl Supertrend {
    pub fn new(period: usize, factor: f64, output: SupertrendOutput) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self {
            period,
            factor,
            output,
        }
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> String {
        let prefix = match self.output {
            SupertrendOutput::Direction => "supertrend_up",
            SupertrendOutput::Stop => "supertrend_stop",
        };
        format!("{prefix}_{}_{}", self.period, self.factor)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let series = TrendSeries::compute(bars, self.period, self.factor);
        match self.output {
            SupertrendOutput::Direction => series
                .up
                .iter()
                .map(|&up| if up { 1.0 } else { 0.0 })
                .collect(),
            SupertrendOutput::Stop => series.stop,
        }
    }
}
