//! Per-bar evaluation context.
//!
//! The driver builds a new context for every bar, binding that bar's index,
//! close, and time. Anything that must outlive the bar (ledger, globals,
//! indicator cache) is borrowed from the driver; loop counters and the loop
//! budget belong to the bar.

use super::globals::GlobalStore;
use crate::domain::Bar;
use crate::engine::Portfolio;
use crate::indicators::{IndicatorCache, IndicatorKey};
use std::collections::HashMap;

pub struct EvalContext<'a> {
    bars: &'a [Bar],
    index: usize,
    pub(crate) portfolio: &'a mut Portfolio,
    pub(crate) globals: &'a mut GlobalStore,
    indicators: &'a mut IndicatorCache,
    pub(crate) locals: HashMap<String, f64>,
    pub(crate) iterations: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        bars: &'a [Bar],
        index: usize,
        portfolio: &'a mut Portfolio,
        globals: &'a mut GlobalStore,
        indicators: &'a mut IndicatorCache,
    ) -> Self {
        Self {
            bars,
            index,
            portfolio,
            globals,
            indicators,
            locals: HashMap::new(),
            iterations: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn bar(&self) -> &'a Bar {
        let bars: &'a [Bar] = self.bars;
        &bars[self.index]
    }

    pub fn close(&self) -> f64 {
        self.bar().close
    }

    pub fn time(&self) -> &'a str {
        &self.bar().time
    }

    pub fn indicator(&mut self, key: IndicatorKey) -> f64 {
        self.indicators.value(self.bars, key, self.index)
    }

    /// Append a line to the run log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.portfolio.journal_mut().note(line);
    }
}
