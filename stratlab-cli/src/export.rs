//! Run artifacts: trade log, equity curve CSV, fill tape CSV, and JSON report.
//!
//! Each run lands in `output_dir/<run id prefix>/`, so re-running identical
//! inputs overwrites the same directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stratlab_core::domain::{Fill, Sizing};
use stratlab_core::engine::{EquityPoint, PartialRun, RunReport};
use stratlab_core::fingerprint::RunFingerprint;

/// Hex characters of the run id used for directory names.
pub const RUN_DIR_PREFIX: usize = 12;

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: bar_index, time, cash, net_worth
pub fn export_equity_csv(equity: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "time", "cash", "net_worth"])?;
    for (i, point) in equity.iter().enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.time,
            &format!("{:.8}", point.cash),
            &format!("{:.8}", point.net_worth),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: bar_index, time, side, percent, price, quantity, cash_delta.
/// `percent` is empty for ladder fills, which are sized by quantity.
pub fn export_trades_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "time",
        "side",
        "percent",
        "price",
        "quantity",
        "cash_delta",
    ])?;
    for f in fills {
        let percent = match f.sizing {
            Sizing::Percent(pct) => format!("{pct}"),
            Sizing::Quantity => String::new(),
        };
        wtr.write_record([
            &f.bar_index.to_string(),
            &f.time,
            &format!("{:?}", f.side),
            &percent,
            &format!("{:.8}", f.price),
            &format!("{:.8}", f.quantity),
            &format!("{:.8}", f.cash_delta),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn log_text(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn run_dir(fingerprint: &RunFingerprint, output_dir: &Path) -> Result<PathBuf> {
    let dir = output_dir.join(fingerprint.run_id.short(RUN_DIR_PREFIX));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    Ok(dir)
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Save a completed run:
/// - `log.txt`: trade log, program output, and result block
/// - `equity.csv`: one row per bar
/// - `trades.csv`: every fill
/// - `result.json`: the full report, including indicator traces
///
/// Returns the run directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(&report.fingerprint, output_dir)?;
    write(&dir, "log.txt", &log_text(&report.log))?;
    write(&dir, "equity.csv", &export_equity_csv(&report.equity)?)?;
    write(&dir, "trades.csv", &export_trades_csv(&report.fills)?)?;
    let json = serde_json::to_string_pretty(report).context("failed to serialize RunReport")?;
    write(&dir, "result.json", &json)?;
    Ok(dir)
}

/// Save what an aborted run produced. `partial.json` replaces `result.json`
/// so an incomplete run is never mistaken for a finished one.
pub fn save_partial(partial: &PartialRun, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(&partial.fingerprint, output_dir)?;
    write(&dir, "log.txt", &log_text(&partial.log))?;
    write(&dir, "equity.csv", &export_equity_csv(&partial.equity)?)?;
    write(&dir, "trades.csv", &export_trades_csv(&partial.fills)?)?;
    let json = serde_json::to_string_pretty(partial).context("failed to serialize PartialRun")?;
    write(&dir, "partial.json", &json)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratlab_core::program::{Expr, Statement};
    use stratlab_core::{run_backtest, synthetic, Program, RunError};

    fn buy_and_hold() -> Program {
        Program::new(vec![Statement::If {
            condition: Expr::BalanceIsInitial,
            then: vec![Statement::Buy {
                amount: Expr::number(50.0),
            }],
            otherwise: vec![],
        }])
    }

    #[test]
    fn equity_csv_has_row_per_bar() {
        let bars = synthetic::flat(4, 10.0);
        let report = run_backtest(&bars, &buy_and_hold(), 100.0).unwrap();
        let csv = export_equity_csv(&report.equity).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "bar_index,time,cash,net_worth");
        assert!(lines[1].starts_with("0,2024-01-01 00:00:00,50.00000000,100.00000000"));
    }

    #[test]
    fn trades_csv_marks_ladder_fills() {
        let mut portfolio = stratlab_core::engine::Portfolio::new(1000.0);
        portfolio.buy_percent_of_cash(25.0, 100.0, "t0", 0);
        portfolio.buy_quantity(1.0, 90.0, "t1", 1);
        let csv = export_trades_csv(&portfolio.journal().fills).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,t0,Buy,25,"));
        assert!(lines[2].starts_with("1,t1,Buy,,"));
    }

    #[test]
    fn saves_full_artifact_set() {
        let dir = tempfile::tempdir().unwrap();
        let bars = synthetic::random_walk(50, 1);
        let report = run_backtest(&bars, &buy_and_hold(), 1000.0).unwrap();

        let run_dir = save_artifacts(&report, dir.path()).unwrap();
        assert_eq!(
            run_dir.file_name().unwrap().to_string_lossy(),
            report.fingerprint.run_id.short(RUN_DIR_PREFIX)
        );
        for name in ["log.txt", "equity.csv", "trades.csv", "result.json"] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }

        let log = std::fs::read_to_string(run_dir.join("log.txt")).unwrap();
        assert!(log.contains("=== RESULT ==="));
        let json = std::fs::read_to_string(run_dir.join("result.json")).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fills, report.fills);
        assert_eq!(back, report, "result.json must reload bit-exact");
    }

    #[test]
    fn aborted_run_writes_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let program = Program::new(vec![Statement::Log {
            value: Expr::arithmetic(
                stratlab_core::program::ArithmeticOp::Div,
                Expr::number(1.0),
                Expr::number(0.0),
            ),
        }]);
        let err = run_backtest(&synthetic::flat(3, 1.0), &program, 10.0).unwrap_err();
        let RunError::Fault { partial, .. } = err else {
            panic!("expected a strategy fault");
        };

        let run_dir = save_partial(&partial, dir.path()).unwrap();
        assert!(run_dir.join("partial.json").exists());
        assert!(!run_dir.join("result.json").exists());
        let log = std::fs::read_to_string(run_dir.join("log.txt")).unwrap();
        assert!(log.starts_with("=== ABORTED at bar 0"));
    }
}
