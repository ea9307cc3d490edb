//! Run lifecycle, per-bar snapshots, and run result types.

use crate::domain::{Fill, Marker};
use crate::fingerprint::RunFingerprint;
use crate::program::{ProgramError, RuntimeFault};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Lifecycle of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Ledger snapshot taken after all per-bar processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: String,
    pub cash: f64,
    /// Cash plus the position marked at the bar's close.
    pub net_worth: f64,
}

/// Final ledger state, with the position marked at the last close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub cash: f64,
    pub position_qty: f64,
    pub net_worth: f64,
    pub realized_profit: f64,
}

impl Summary {
    /// The result block appended to the run log.
    pub fn lines(&self) -> Vec<String> {
        vec![
            "=== RESULT ===".to_string(),
            format!("Cash:  {:.2}", self.cash),
            format!("Units: {:.4}", self.position_qty),
            format!("Net:   {:.2}", self.net_worth),
            format!("Total profit: {:.2}", self.realized_profit),
        ]
    }
}

/// Everything a completed run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub fingerprint: RunFingerprint,
    pub bar_count: usize,
    /// Trade lines, program `log` output, and the result block, in order.
    pub log: Vec<String>,
    pub equity: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub buys: Vec<Marker>,
    pub sells: Vec<Marker>,
    /// Full series of every indicator the program read, keyed by name.
    pub traces: BTreeMap<String, Vec<f64>>,
    pub summary: Summary,
}

/// Output accumulated before a run aborted. Never a complete result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRun {
    pub fingerprint: RunFingerprint,
    /// Bar at which the program faulted; its equity point is absent.
    pub failed_at: usize,
    pub log: Vec<String>,
    pub equity: Vec<EquityPoint>,
    pub fills: Vec<Fill>,
    pub complete: bool,
}

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed strategy program: {0}")]
    Program(#[from] ProgramError),

    #[error("strategy fault at bar {bar}: {fault}")]
    Fault {
        bar: usize,
        fault: RuntimeFault,
        partial: Box<PartialRun>,
    },
}

impl RunError {
    /// Output produced before the fault, if the run got that far.
    pub fn partial(&self) -> Option<&PartialRun> {
        match self {
            RunError::Fault { partial, .. } => Some(&**partial),
            _ => None,
        }
    }
}
