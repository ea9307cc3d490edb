//! Indicator cache — one full series per distinct (kind, column, params) key.
//!
//! The first lookup of a key computes the series over the whole bar table;
//! every later lookup is an index into the stored vector. Because each value
//! depends only on bars at or before its index, computing the full series up
//! front never leaks future data into an earlier bar.
//!
//! The simulation driver owns the cache and builds a fresh one per run.

use super::{
    Atr, Bollinger, BollingerBand, Indicator, MaDifference, Sma, StdDev, Supertrend,
    SupertrendOutput,
};
use crate::domain::{Bar, Column};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

/// Cache key: indicator kind with its source column and parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorKey {
    MovingAverage {
        column: Column,
        period: usize,
    },
    MovingAverageDifference {
        column: Column,
        fast: usize,
        slow: usize,
    },
    StandardDeviation {
        column: Column,
        period: usize,
    },
    Bollinger {
        column: Column,
        period: usize,
        multiplier: f64,
        band: BollingerBand,
    },
    AverageTrueRange {
        period: usize,
    },
    TrendUp {
        period: usize,
        factor: f64,
    },
    TrendStop {
        period: usize,
        factor: f64,
    },
}

impl IndicatorKey {
    /// Build the indicator this key describes.
    pub fn indicator(&self) -> Box<dyn Indicator> {
        match *self {
            IndicatorKey::MovingAverage { column, period } => Box::new(Sma::new(column, period)),
            IndicatorKey::MovingAverageDifference { column, fast, slow } => {
                Box::new(MaDifference::new(column, fast, slow))
            }
            IndicatorKey::StandardDeviation { column, period } => {
                Box::new(StdDev::new(column, period))
            }
            IndicatorKey::Bollinger {
                column,
                period,
                multiplier,
                band,
            } => Box::new(Bollinger::new(column, period, multiplier, band)),
            IndicatorKey::AverageTrueRange { period } => Box::new(Atr::new(period)),
            IndicatorKey::TrendUp { period, factor } => Box::new(Supertrend::new(
                period,
                factor,
                SupertrendOutput::Direction,
            )),
            IndicatorKey::TrendStop { period, factor } => {
                Box::new(Supertrend::new(period, factor, SupertrendOutput::Stop))
            }
        }
    }

    /// Whether lookups of this key are read as booleans by programs.
    pub fn is_boolean(&self) -> bool {
        matches!(self, IndicatorKey::TrendUp { .. })
    }

    /// Canonical tuple used for equality and hashing. Floats compare by bit
    /// pattern so `NaN` parameters still produce a usable key.
    fn identity(&self) -> (u8, Option<Column>, [u64; 3]) {
        match *self {
            IndicatorKey::MovingAverage { column, period } => {
                (0, Some(column), [period as u64, 0, 0])
            }
            IndicatorKey::MovingAverageDifference { column, fast, slow } => {
                (1, Some(column), [fast as u64, slow as u64, 0])
            }
            IndicatorKey::StandardDeviation { column, period } => {
                (2, Some(column), [period as u64, 0, 0])
            }
            IndicatorKey::Bollinger {
                column,
                period,
                multiplier,
                band,
            } => (
                3,
                Some(column),
                [period as u64, multiplier.to_bits(), band as u64],
            ),
            IndicatorKey::AverageTrueRange { period } => (4, None, [period as u64, 0, 0]),
            IndicatorKey::TrendUp { period, factor } => {
                (5, None, [period as u64, factor.to_bits(), 0])
            }
            IndicatorKey::TrendStop { period, factor } => {
                (6, None, [period as u64, factor.to_bits(), 0])
            }
        }
    }
}

impl PartialEq for IndicatorKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for IndicatorKey {}

impl Hash for IndicatorKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Lazily filled store of indicator series for one bar table.
#[derive(Debug, Default)]
pub struct IndicatorCache {
    series: HashMap<IndicatorKey, Vec<f64>>,
    /// Keys in first-use order.
    order: Vec<IndicatorKey>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key` at `index`, computing the full series on first use.
    pub fn value(&mut self, bars: &[Bar], key: IndicatorKey, index: usize) -> f64 {
        self.series_for(bars, key)[index]
    }

    /// Full series for `key`, computing it on first use.
    pub fn series_for(&mut self, bars: &[Bar], key: IndicatorKey) -> &[f64] {
        if !self.series.contains_key(&key) {
            let indicator = key.indicator();
            let values = indicator.compute(bars);
            debug_assert_eq!(
                values.len(),
                bars.len(),
                "indicator '{}' produced {} values for {} bars",
                indicator.name(),
                values.len(),
                bars.len()
            );
            tracing::debug!(indicator = %indicator.name(), bars = bars.len(), "indicator_computed");
            self.order.push(key);
            self.series.insert(key, values);
        }
        &self.series[&key]
    }

    /// Drop every cached series.
    pub fn clear(&mut self) {
        self.series.clear();
        self.order.clear();
    }

    pub fn contains(&self, key: &IndicatorKey) -> bool {
        self.series.contains_key(key)
    }

    /// Number of distinct keys computed so far.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Consume the cache into named traces for display overlays.
    pub fn into_traces(self) -> BTreeMap<String, Vec<f64>> {
        let mut series = self.series;
        self.order
            .into_iter()
            .filter_map(|key| {
                series
                    .remove(&key)
                    .map(|values| (key.indicator().name(), values))
            })
            .collect()
    }
}
