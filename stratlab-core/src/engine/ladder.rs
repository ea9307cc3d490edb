//! Grid ladder and take-profit trigger.
//!
//! A ladder is a set of descending limit-buy levels sized so that filling
//! every level would deploy exactly the starting cash. Once any buy opens a
//! position the ladder locks: further placements are ignored until the
//! position returns to flat or is closed explicitly.
//!
//! Both checks run once per bar after the strategy program, against that
//! bar's close.

use super::ledger::{OrderOutcome, Portfolio};
use serde::{Deserialize, Serialize};

/// One level of the ladder. Only `filled` changes after placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridOrder {
    pub price: f64,
    pub quantity: f64,
    pub filled: bool,
}

/// Result of a placement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// A new ladder with this many levels replaced the previous one.
    Placed(usize),
    /// A position is open; the existing ladder was left alone.
    Locked,
    /// Nothing could be sized; the ladder is now empty.
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLadder {
    orders: Vec<GridOrder>,
    locked: bool,
}

impl GridLadder {
    /// Size `count` levels below `anchor`, each `step_pct` percent apart, with
    /// quantities growing geometrically by `1 + growth` so that the whole
    /// ladder costs `budget`.
    ///
    /// Returns an empty ladder when nothing can be sized.
    pub fn plan(count: usize, growth: f64, step_pct: f64, anchor: f64, budget: f64) -> Vec<GridOrder> {
        let step = step_pct / 100.0;
        let ratio = 1.0 + growth;
        let levels: Vec<(f64, f64)> = (0..count)
            .map(|n| {
                let price = anchor * (1.0 - n as f64 * step);
                (price, ratio.powi(n as i32))
            })
            .collect();

        let sum: f64 = levels.iter().map(|(price, weight)| price * weight).sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Vec::new();
        }

        let base_qty = budget / sum;
        levels
            .into_iter()
            .map(|(price, weight)| GridOrder {
                price,
                quantity: base_qty * weight,
                filled: false,
            })
            .collect()
    }

    pub fn orders(&self) -> &[GridOrder] {
        &self.orders
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Levels not yet filled.
    pub fn pending(&self) -> usize {
        self.orders.iter().filter(|o| !o.filled).count()
    }

    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    pub(crate) fn clear(&mut self) {
        self.orders.clear();
        self.locked = false;
    }
}

impl Portfolio {
    /// Replace the ladder with a freshly sized one, unless a position has
    /// locked it. Sizing uses the starting cash as the budget.
    pub fn place_grid(&mut self, count: usize, growth: f64, step_pct: f64, anchor: f64) -> PlacementOutcome {
        if self.ladder.is_locked() {
            return PlacementOutcome::Locked;
        }
        let orders = GridLadder::plan(count, growth, step_pct, anchor, self.initial_cash());
        if orders.is_empty() {
            self.ladder.orders.clear();
            return PlacementOutcome::Cleared;
        }
        let placed = orders.len();
        self.ladder.orders = orders;
        tracing::debug!(levels = placed, anchor, step_pct, growth, "grid_placed");
        PlacementOutcome::Placed(placed)
    }

    /// Execute every unfilled level at or above `price`, each at its own
    /// level price. A level is spent even when the buy is rejected.
    pub fn check_fills(&mut self, price: f64, time: &str, index: usize) -> Vec<OrderOutcome> {
        let mut outcomes = Vec::new();
        for i in 0..self.ladder.orders.len() {
            let order = self.ladder.orders[i];
            if order.filled || !(order.price >= price) {
                continue;
            }
            outcomes.push(self.buy_quantity(order.quantity, order.price, time, index));
            // A fill can never flatten the position, so the ladder is still intact.
            self.ladder.orders[i].filled = true;
        }
        outcomes
    }

    /// Arm the take-profit trigger at `pct` percent above the average entry.
    pub fn set_take_profit_percent(&mut self, pct: f64) {
        self.take_profit_pct = Some(pct);
    }

    /// Exit the whole position once `price` reaches the armed target.
    pub fn check_take_profit(&mut self, price: f64, time: &str, index: usize) -> Option<OrderOutcome> {
        let pct = self.take_profit_pct?;
        if self.is_flat() {
            return None;
        }
        let avg = self.avg_price()?;
        if !(price >= avg * (1.0 + pct / 100.0)) {
            return None;
        }
        tracing::debug!(bar = index, price, avg, pct, "take_profit_triggered");
        let outcome = self.sell_percent_of_position(100.0, price, time, index);
        self.take_profit_pct = None;
        Some(outcome)
    }
}
