//! StratLab CLI — run strategy programs against bar tables.
//!
//! Commands:
//! - `run` — backtest a JSON program over CSV or synthetic bars and save artifacts
//! - `check` — compile a program and report what it reads

mod config;
mod export;
mod loader;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stratlab_core::program::CompiledProgram;
use stratlab_core::{RunError, Simulation};
use tracing_subscriber::EnvFilter;

use config::{FileConfig, Overrides, RunConfig};

#[derive(Parser)]
#[command(
    name = "stratlab",
    about = "StratLab CLI — single-asset strategy backtester"
)]
struct Cli {
    /// Diagnostic log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and save its artifacts.
    Run {
        /// Path to a TOML config file with a [run] section.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bar table.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// JSON strategy program.
        #[arg(long)]
        program: Option<PathBuf>,

        /// Starting cash. Defaults to 10000.
        #[arg(long)]
        initial_cash: Option<f64>,

        /// Use N seeded random-walk bars instead of a CSV.
        #[arg(long, value_name = "N")]
        synthetic: Option<usize>,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Artifact root. Defaults to ./results.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Do not print the trade log.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Compile a program and report errors without running it.
    Check {
        /// JSON strategy program.
        #[arg(long)]
        program: PathBuf,
    },
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("bad --log-level '{level}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            config,
            bars,
            program,
            initial_cash,
            synthetic,
            seed,
            output_dir,
            quiet,
        } => {
            let file = match config {
                Some(path) => FileConfig::from_file(&path)?,
                None => FileConfig::default(),
            };
            let flags = Overrides {
                initial_cash,
                bars,
                program,
                output_dir,
                synthetic,
                seed,
            };
            run_cmd(RunConfig::resolve(file, flags)?, quiet)
        }
        Commands::Check { program } => check_cmd(&program),
    }
}

fn run_cmd(config: RunConfig, quiet: bool) -> Result<()> {
    let bars = loader::load_bars(&config.bars)?;
    let program = loader::load_program(&config.program)?;

    let mut sim = Simulation::new(&bars, &program, config.initial_cash)?;
    match sim.run() {
        Ok(report) => {
            if !quiet {
                for line in &report.log {
                    println!("{line}");
                }
            }
            let dir = export::save_artifacts(&report, &config.output_dir)?;
            println!("Artifacts saved to: {}", dir.display());
            Ok(())
        }
        Err(RunError::Fault {
            bar,
            fault,
            partial,
        }) => {
            if !quiet {
                for line in &partial.log {
                    println!("{line}");
                }
            }
            let dir = export::save_partial(&partial, &config.output_dir)?;
            println!("Partial artifacts saved to: {}", dir.display());
            anyhow::bail!("strategy fault at bar {bar}: {fault}")
        }
        Err(err) => Err(err.into()),
    }
}

fn check_cmd(path: &std::path::Path) -> Result<()> {
    let program = loader::load_program(path)?;
    let compiled = CompiledProgram::compile(&program)
        .with_context(|| format!("{} does not compile", path.display()))?;

    println!("OK: {}", path.display());
    for line in check_summary(&compiled) {
        println!("  {line}");
    }
    Ok(())
}

/// What `check` reports for a compiled program.
fn check_summary(compiled: &CompiledProgram) -> Vec<String> {
    let indicators: Vec<_> = compiled
        .indicator_keys()
        .iter()
        .map(|k| k.indicator())
        .collect();
    let names: Vec<String> = indicators.iter().map(|i| i.name()).collect();
    let warmup = indicators.iter().map(|i| i.lookback()).max().unwrap_or(0);
    vec![
        format!("hash:        {}", compiled.hash().0),
        format!("statements:  {}", compiled.len()),
        format!("procedures:  {}", compiled.procedure_names().join(", ")),
        format!("indicators:  {}", names.join(", ")),
        format!("warmup bars: {warmup}"),
    ]
}
