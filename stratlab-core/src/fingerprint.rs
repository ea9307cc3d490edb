//! Run fingerprinting: content hashes that identify a backtest's inputs.
//!
//! The program hash covers the canonical JSON of the authored program; the
//! dataset hash covers the canonical JSON of the bar table. The run ID hashes
//! both together with the starting cash, so identical inputs always map to
//! the same ID and output directory.

use crate::domain::{Bar, DatasetHash, ProgramHash, RunId};
use crate::program::Program;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub program_hash: ProgramHash,
    pub dataset_hash: DatasetHash,
    pub initial_cash: f64,
    pub run_id: RunId,
}

impl RunFingerprint {
    pub fn new(program_hash: ProgramHash, dataset_hash: DatasetHash, initial_cash: f64) -> Self {
        let run_id = RunId::derive(&program_hash, &dataset_hash, initial_cash);
        Self {
            program_hash,
            dataset_hash,
            initial_cash,
            run_id,
        }
    }

    pub fn compute(program: &Program, bars: &[Bar], initial_cash: f64) -> Self {
        Self::new(
            program_hash(program),
            dataset_hash(bars),
            initial_cash,
        )
    }
}

pub fn program_hash(program: &Program) -> ProgramHash {
    ProgramHash::from_bytes(program.canonical_json().as_bytes())
}

pub fn dataset_hash(bars: &[Bar]) -> DatasetHash {
    let json = serde_json::to_vec(bars).expect("bars must serialize");
    DatasetHash::from_bytes(&json)
}
