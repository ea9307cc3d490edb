//! Backtesting engine — ledger, grid ladder, and the bar-by-bar driver.
//!
//! The driver replays the bar table in order. For each bar the strategy
//! program runs first, then the ladder fill check, then the take-profit
//! check, then an equity snapshot is recorded.

pub mod ladder;
pub mod ledger;
pub mod loop_runner;
pub mod state;

pub use ladder::{GridLadder, GridOrder, PlacementOutcome};
pub use ledger::{
    OrderOutcome, Portfolio, RejectReason, TradeJournal, CASH_TOLERANCE, DUST_THRESHOLD,
};
pub use loop_runner::{run_backtest, Simulation};
pub use state::{EquityPoint, PartialRun, RunError, RunReport, RunState, Summary};
