//! Run configuration: a `[run]` TOML section merged with command-line flags.
//!
//! ```toml
//! [run]
//! initial_cash = 10000.0
//! bars = "data/btc_15m.csv"
//! program = "demos/grid_take_profit.json"
//! output_dir = "results"
//! ```
//!
//! Flags win over the file. Only `program` and a bar source are required.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;
pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no {setting} given: set `{setting}` under [run] or pass --{flag}")]
    Missing {
        setting: &'static str,
        flag: &'static str,
    },

    #[error("initial cash must be finite and non-negative, got {0}")]
    InvalidCash(f64),

    #[error("--synthetic needs at least one bar")]
    EmptySynthetic,
}

/// The `[run]` table. Every key is optional so flags can fill the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub initial_cash: Option<f64>,
    pub bars: Option<PathBuf>,
    pub program: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Parsed config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub run: RunSection,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub initial_cash: Option<f64>,
    pub bars: Option<PathBuf>,
    pub program: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub synthetic: Option<usize>,
    pub seed: u64,
}

/// Where the bar table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BarSource {
    Csv(PathBuf),
    /// Seeded random walk of `len` bars.
    Synthetic { len: usize, seed: u64 },
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub initial_cash: f64,
    pub bars: BarSource,
    pub program: PathBuf,
    pub output_dir: PathBuf,
}

impl RunConfig {
    /// Merge file settings with flags. `--synthetic` replaces any CSV path.
    pub fn resolve(file: FileConfig, flags: Overrides) -> Result<Self, ConfigError> {
        let run = file.run;

        let initial_cash = flags
            .initial_cash
            .or(run.initial_cash)
            .unwrap_or(DEFAULT_INITIAL_CASH);
        if !initial_cash.is_finite() || initial_cash < 0.0 {
            return Err(ConfigError::InvalidCash(initial_cash));
        }

        let bars = match flags.synthetic {
            Some(0) => return Err(ConfigError::EmptySynthetic),
            Some(len) => BarSource::Synthetic {
                len,
                seed: flags.seed,
            },
            None => BarSource::Csv(flags.bars.or(run.bars).ok_or(ConfigError::Missing {
                setting: "bars",
                flag: "bars",
            })?),
        };

        let program = flags.program.or(run.program).ok_or(ConfigError::Missing {
            setting: "program",
            flag: "program",
        })?;

        let output_dir = flags
            .output_dir
            .or(run.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            initial_cash,
            bars,
            program,
            output_dir,
        })
    }
}
