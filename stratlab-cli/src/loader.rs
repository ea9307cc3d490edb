//! Bar tables from CSV and strategy programs from JSON.
//!
//! CSV headers are the bar column names (`Time,Open,High,Low,Close,...`).
//! `Time` is kept as text; the volume columns may be omitted and read as 0.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;
use stratlab_core::domain::Bar;
use stratlab_core::Program;

use crate::config::BarSource;

/// Parse bars from any CSV reader. Row numbers in errors are 1-based data rows.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, record) in rdr.deserialize::<Bar>().enumerate() {
        let bar = record.with_context(|| format!("bad bar on row {}", i + 1))?;
        bars.push(bar);
    }

    let odd = bars.iter().filter(|bar| !bar.is_sane()).count();
    if odd > 0 {
        tracing::warn!(rows = odd, "bars with inconsistent OHLC values");
    }
    Ok(bars)
}

pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open bars {}", path.display()))?;
    let bars = read_bars(file).with_context(|| format!("failed to read {}", path.display()))?;
    if bars.is_empty() {
        bail!("{} has no bars", path.display());
    }
    tracing::info!(path = %path.display(), bars = bars.len(), "bars_loaded");
    Ok(bars)
}

pub fn load_bars(source: &BarSource) -> Result<Vec<Bar>> {
    match source {
        BarSource::Csv(path) => load_bars_csv(path),
        BarSource::Synthetic { len, seed } => {
            tracing::info!(bars = len, seed, "synthetic_bars");
            Ok(stratlab_core::synthetic::random_walk(*len, *seed))
        }
    }
}

pub fn load_program(path: &Path) -> Result<Program> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read program {}", path.display()))?;
    Program::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}
