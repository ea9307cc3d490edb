//! Portfolio ledger — cash, one long position, cost basis, and the trade journal.
//!
//! Every trade mutates the accumulators together so that `cost_basis_qty`
//! always equals `position_qty`, and appends a human-readable line plus a
//! structured [`Fill`] to the journal. Invalid requests never error; they
//! return [`OrderOutcome::Rejected`] and leave the ledger untouched.
//!
//! When a sell leaves the position below [`DUST_THRESHOLD`] the position is
//! flat: surplus cash above the starting balance is swept into realized
//! profit, the accumulators are zeroed, and the grid ladder and take-profit
//! trigger are released.

use super::ladder::GridLadder;
use crate::domain::{Fill, Marker, Side, Sizing};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Positions smaller than this are treated as no position.
pub const DUST_THRESHOLD: f64 = 1e-8;

/// Slack allowed when a quantity buy costs marginally more than the cash on hand.
pub const CASH_TOLERANCE: f64 = 1e-8;

/// Why the ledger declined an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("order amount is zero, negative, or not a number")]
    NonPositiveAmount,

    #[error("not enough cash")]
    InsufficientCash,

    #[error("not enough position to sell")]
    InsufficientPosition,

    #[error("price must be finite and positive")]
    InvalidPrice,
}

/// Result of a ledger operation. The simulation ignores rejections; the
/// outcome exists for callers that want to inspect them.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled(Fill),
    Rejected(RejectReason),
}

impl OrderOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderOutcome::Filled(_))
    }

    pub fn fill(&self) -> Option<&Fill> {
        match self {
            OrderOutcome::Filled(fill) => Some(fill),
            OrderOutcome::Rejected(_) => None,
        }
    }
}

/// Ordered run output written by the ledger and by program `log` statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeJournal {
    pub lines: Vec<String>,
    pub fills: Vec<Fill>,
    pub buys: Vec<Marker>,
    pub sells: Vec<Marker>,
}

impl TradeJournal {
    pub fn note(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

/// Single-asset long-only ledger.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: f64,
    position_qty: f64,
    cost_basis_qty: f64,
    cost_basis_sum: f64,
    initial_cash: f64,
    realized_profit: f64,
    pub(crate) ladder: GridLadder,
    pub(crate) take_profit_pct: Option<f64>,
    journal: TradeJournal,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position_qty: 0.0,
            cost_basis_qty: 0.0,
            cost_basis_sum: 0.0,
            initial_cash,
            realized_profit: 0.0,
            ladder: GridLadder::default(),
            take_profit_pct: None,
            journal: TradeJournal::default(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_qty(&self) -> f64 {
        self.position_qty
    }

    pub fn cost_basis_qty(&self) -> f64 {
        self.cost_basis_qty
    }

    pub fn cost_basis_sum(&self) -> f64 {
        self.cost_basis_sum
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn realized_profit(&self) -> f64 {
        self.realized_profit
    }

    pub fn ladder(&self) -> &GridLadder {
        &self.ladder
    }

    pub fn take_profit_pct(&self) -> Option<f64> {
        self.take_profit_pct
    }

    pub fn journal(&self) -> &TradeJournal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut TradeJournal {
        &mut self.journal
    }

    pub fn into_journal(self) -> TradeJournal {
        self.journal
    }

    pub fn is_flat(&self) -> bool {
        self.position_qty < DUST_THRESHOLD
    }

    /// Volume-weighted entry price of the open position.
    pub fn avg_price(&self) -> Option<f64> {
        (self.cost_basis_qty > 0.0).then(|| self.cost_basis_sum / self.cost_basis_qty)
    }

    pub fn net_worth(&self, price: f64) -> f64 {
        self.cash + self.position_qty * price
    }

    /// Cash is back at its starting value (within 1e-8).
    pub fn balance_is_initial(&self) -> bool {
        (self.cash - self.initial_cash).abs() < 1e-8
    }

    /// Spend `pct` percent of current cash at `price`.
    pub fn buy_percent_of_cash(
        &mut self,
        pct: f64,
        price: f64,
        time: &str,
        index: usize,
    ) -> OrderOutcome {
        let spend = self.cash * (pct / 100.0);
        if !spend.is_finite() || spend <= 0.0 {
            return reject(Side::Buy, RejectReason::NonPositiveAmount, index);
        }
        if spend > self.cash {
            return reject(Side::Buy, RejectReason::InsufficientCash, index);
        }
        if !valid_price(price) {
            return reject(Side::Buy, RejectReason::InvalidPrice, index);
        }

        let qty = spend / price;
        self.journal.note(format!(
            "{time} BUY  {pct:.2}% -> -{spend:.2} cash, +{qty:.4} units"
        ));
        OrderOutcome::Filled(self.apply_buy(qty, price, spend, Sizing::Percent(pct), time, index))
    }

    /// Buy an explicit quantity at `price`. Used by ladder fills.
    pub fn buy_quantity(&mut self, qty: f64, price: f64, time: &str, index: usize) -> OrderOutcome {
        if !valid_price(price) {
            return reject(Side::Buy, RejectReason::InvalidPrice, index);
        }
        let cost = qty * price;
        if !cost.is_finite() || cost <= 0.0 {
            return reject(Side::Buy, RejectReason::NonPositiveAmount, index);
        }
        if cost > self.cash + CASH_TOLERANCE {
            return reject(Side::Buy, RejectReason::InsufficientCash, index);
        }

        self.journal.note(format!(
            "{time} BUY  {qty:.4} units @ {price:.2} -> -{cost:.2} cash"
        ));
        OrderOutcome::Filled(self.apply_buy(qty, price, cost, Sizing::Quantity, time, index))
    }

    /// Sell `pct` percent of the open position at `price`.
    pub fn sell_percent_of_position(
        &mut self,
        pct: f64,
        price: f64,
        time: &str,
        index: usize,
    ) -> OrderOutcome {
        let qty = self.position_qty * (pct / 100.0);
        if !qty.is_finite() || qty <= 0.0 {
            return reject(Side::Sell, RejectReason::NonPositiveAmount, index);
        }
        if qty > self.position_qty {
            return reject(Side::Sell, RejectReason::InsufficientPosition, index);
        }
        if !price.is_finite() || price < 0.0 {
            return reject(Side::Sell, RejectReason::InvalidPrice, index);
        }

        let gained = qty * price;
        let remaining = (self.position_qty - qty) / self.position_qty;
        self.cash += gained;
        self.position_qty -= qty;
        self.cost_basis_qty -= qty;
        self.cost_basis_sum *= remaining;

        self.journal.note(format!(
            "{time} SELL {pct:.2}% -> +{gained:.2} cash, -{qty:.4} units"
        ));
        let fill = Fill {
            bar_index: index,
            time: time.to_string(),
            side: Side::Sell,
            sizing: Sizing::Percent(pct),
            price,
            quantity: qty,
            cash_delta: gained,
        };
        self.journal.fills.push(fill.clone());
        self.journal.sells.push(Marker {
            bar_index: index,
            price,
        });
        tracing::debug!(bar = index, price, quantity = qty, "sell_filled");

        if self.is_flat() {
            self.settle_flat();
        }
        OrderOutcome::Filled(fill)
    }

    /// Sell everything (if anything is held) and release the ladder and
    /// take-profit trigger regardless.
    pub fn close_position(&mut self, price: f64, time: &str, index: usize) -> Option<OrderOutcome> {
        let outcome = (self.position_qty > 0.0)
            .then(|| self.sell_percent_of_position(100.0, price, time, index));
        self.ladder.clear();
        self.take_profit_pct = None;
        outcome
    }

    fn apply_buy(
        &mut self,
        qty: f64,
        price: f64,
        spent: f64,
        sizing: Sizing,
        time: &str,
        index: usize,
    ) -> Fill {
        self.cash = (self.cash - spent).max(0.0);
        self.position_qty += qty;
        self.cost_basis_qty += qty;
        self.cost_basis_sum += qty * price;
        self.ladder.lock();

        let fill = Fill {
            bar_index: index,
            time: time.to_string(),
            side: Side::Buy,
            sizing,
            price,
            quantity: qty,
            cash_delta: -spent,
        };
        self.journal.fills.push(fill.clone());
        self.journal.buys.push(Marker {
            bar_index: index,
            price,
        });
        tracing::debug!(bar = index, price, quantity = qty, "buy_filled");
        fill
    }

    fn settle_flat(&mut self) {
        if self.cash > self.initial_cash {
            let profit = self.cash - self.initial_cash;
            self.realized_profit += profit;
            self.cash = self.initial_cash;
            self.journal.note(format!(
                "-> PROFIT realised: +{profit:.2} (total {:.2})",
                self.realized_profit
            ));
        }
        self.position_qty = 0.0;
        self.cost_basis_qty = 0.0;
        self.cost_basis_sum = 0.0;
        self.ladder.clear();
        self.take_profit_pct = None;
    }
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

fn reject(side: Side, reason: RejectReason, index: usize) -> OrderOutcome {
    tracing::debug!(bar = index, side = ?side, %reason, "order_rejected");
    OrderOutcome::Rejected(reason)
}
