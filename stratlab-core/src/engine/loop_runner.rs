//! Bar-by-bar simulation loop.
//!
//! Four phases per bar, in order:
//! 1. Strategy program, bound to this bar
//! 2. Grid ladder fill check at the close
//! 3. Take-profit check at the close
//! 4. Equity snapshot
//!
//! Every run starts from fresh state: full cash, empty ladder, disarmed
//! take-profit, no globals, empty indicator cache.

use super::ledger::Portfolio;
use super::state::{EquityPoint, PartialRun, RunError, RunReport, RunState, Summary};
use crate::domain::Bar;
use crate::fingerprint::{dataset_hash, RunFingerprint};
use crate::indicators::IndicatorCache;
use crate::program::{CompiledProgram, EvalContext, GlobalStore, Program};

/// A validated backtest over one bar table.
#[derive(Debug)]
pub struct Simulation<'a> {
    bars: &'a [Bar],
    program: CompiledProgram,
    fingerprint: RunFingerprint,
    state: RunState,
}

impl<'a> Simulation<'a> {
    /// Validate inputs and compile the program. On error no run exists, so
    /// nothing ever leaves `Idle`.
    pub fn new(bars: &'a [Bar], program: &Program, initial_cash: f64) -> Result<Self, RunError> {
        if bars.is_empty() {
            return Err(RunError::InvalidInput("bar table is empty".into()));
        }
        if !initial_cash.is_finite() || initial_cash < 0.0 {
            return Err(RunError::InvalidInput(format!(
                "initial cash must be finite and non-negative, got {initial_cash}"
            )));
        }
        let program = CompiledProgram::compile(program)?;
        let fingerprint =
            RunFingerprint::new(program.hash().clone(), dataset_hash(bars), initial_cash);
        Ok(Self {
            bars,
            program,
            fingerprint,
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn fingerprint(&self) -> &RunFingerprint {
        &self.fingerprint
    }

    /// Replay every bar. Re-running yields an identical report.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        self.state = RunState::Running;
        let initial_cash = self.fingerprint.initial_cash;
        tracing::info!(
            run_id = %self.fingerprint.run_id.short(12),
            bars = self.bars.len(),
            initial_cash,
            "backtest_started"
        );

        let mut portfolio = Portfolio::new(initial_cash);
        let mut globals = GlobalStore::new();
        let mut cache = IndicatorCache::new();
        let mut equity = Vec::with_capacity(self.bars.len());

        for (t, bar) in self.bars.iter().enumerate() {
            // ─── Phase 1: Strategy program ───
            let outcome = {
                let mut ctx =
                    EvalContext::new(self.bars, t, &mut portfolio, &mut globals, &mut cache);
                self.program.run_bar(&mut ctx)
            };
            if let Err(fault) = outcome {
                self.state = RunState::Failed;
                tracing::warn!(bar = t, time = %bar.time, %fault, "backtest_aborted");
                let mut journal = portfolio.into_journal();
                journal.note(format!("=== ABORTED at bar {t} ({}): {fault} ===", bar.time));
                let partial = PartialRun {
                    fingerprint: self.fingerprint.clone(),
                    failed_at: t,
                    log: journal.lines,
                    equity,
                    fills: journal.fills,
                    complete: false,
                };
                return Err(RunError::Fault {
                    bar: t,
                    fault,
                    partial: Box::new(partial),
                });
            }

            // ─── Phase 2: Ladder fills ───
            portfolio.check_fills(bar.close, &bar.time, t);

            // ─── Phase 3: Take-profit ───
            portfolio.check_take_profit(bar.close, &bar.time, t);

            // ─── Phase 4: Equity snapshot ───
            debug_assert!(portfolio.cash() >= 0.0, "negative cash at bar {t}");
            debug_assert!(portfolio.position_qty() >= 0.0, "negative position at bar {t}");
            debug_assert_eq!(portfolio.cost_basis_qty(), portfolio.position_qty());
            equity.push(EquityPoint {
                time: bar.time.clone(),
                cash: portfolio.cash(),
                net_worth: portfolio.net_worth(bar.close),
            });
        }

        let last_close = self.bars[self.bars.len() - 1].close;
        let summary = Summary {
            cash: portfolio.cash(),
            position_qty: portfolio.position_qty(),
            net_worth: portfolio.net_worth(last_close),
            realized_profit: portfolio.realized_profit(),
        };

        let mut journal = portfolio.into_journal();
        for line in summary.lines() {
            journal.note(line);
        }

        self.state = RunState::Completed;
        tracing::info!(
            run_id = %self.fingerprint.run_id.short(12),
            fills = journal.fills.len(),
            net_worth = summary.net_worth,
            realized_profit = summary.realized_profit,
            "backtest_completed"
        );

        Ok(RunReport {
            fingerprint: self.fingerprint.clone(),
            bar_count: self.bars.len(),
            log: journal.lines,
            equity,
            fills: journal.fills,
            buys: journal.buys,
            sells: journal.sells,
            traces: cache.into_traces(),
            summary,
        })
    }
}

/// Validate, compile, and run a backtest in one call.
pub fn run_backtest(
    bars: &[Bar],
    program: &Program,
    initial_cash: f64,
) -> Result<RunReport, RunError> {
    Simulation::new(bars, program, initial_cash)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::program::{ArithmeticOp, Expr, Statement};

    #[test]
    fn empty_bar_table_is_invalid() {
        let err = run_backtest(&[], &Program::default(), 1000.0).unwrap_err();
        assert!(matches!(err, RunError::InvalidInput(_)));
    }

    #[test]
    fn bad_initial_cash_is_invalid() {
        let bars = make_bars(&[1.0]);
        for cash in [-1.0, f64::NAN, f64::INFINITY] {
            let err = run_backtest(&bars, &Program::default(), cash).unwrap_err();
            assert!(matches!(err, RunError::InvalidInput(_)), "cash {cash}");
        }
    }

    #[test]
    fn malformed_program_never_starts() {
        let bars = make_bars(&[1.0]);
        let program = Program::new(vec![Statement::Call {
            name: "missing".into(),
        }]);
        assert!(matches!(
            Simulation::new(&bars, &program, 1000.0),
            Err(RunError::Program(_))
        ));
    }

    #[test]
    fn state_transitions() {
        let bars = make_bars(&[1.0, 2.0]);
        let mut sim = Simulation::new(&bars, &Program::default(), 100.0).unwrap();
        assert_eq!(sim.state(), RunState::Idle);
        let report = sim.run().unwrap();
        assert_eq!(sim.state(), RunState::Completed);
        assert_eq!(report.equity.len(), 2);
        assert_eq!(report.summary.net_worth, 100.0);
    }

    #[test]
    fn fault_carries_partial_output() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        // divides by (close - 2), which is zero on bar 1
        let program = Program::new(vec![Statement::Log {
            value: Expr::arithmetic(
                ArithmeticOp::Div,
                Expr::number(1.0),
                Expr::arithmetic(ArithmeticOp::Sub, Expr::column("Close"), Expr::number(2.0)),
            ),
        }]);
        let mut sim = Simulation::new(&bars, &program, 100.0).unwrap();
        let err = sim.run().unwrap_err();
        assert_eq!(sim.state(), RunState::Failed);

        let partial = err.partial().expect("fault keeps partial output");
        assert!(!partial.complete);
        assert_eq!(partial.failed_at, 1);
        assert_eq!(partial.equity.len(), 1);
        assert_eq!(partial.log[0], "-1");
        assert!(partial.log[1].starts_with("=== ABORTED at bar 1"));
    }

    #[test]
    fn reruns_are_identical() {
        let bars = make_bars(&[10.0, 9.0, 11.0, 12.0, 8.0]);
        let program = Program::new(vec![Statement::Buy {
            amount: Expr::number(20.0),
        }]);
        let mut sim = Simulation::new(&bars, &program, 500.0).unwrap();
        let first = sim.run().unwrap();
        let second = sim.run().unwrap();
        assert_eq!(first, second);
    }
}
