//! StratLab Core — single-asset strategy backtesting engine.
//!
//! This crate contains:
//! - The bar table and its numeric columns
//! - Indicator library and the per-run indicator cache
//! - Portfolio ledger with grid ladder and take-profit trigger
//! - Strategy programs: authored model, compiler, interpreter
//! - Simulation driver producing logs, equity curve, markers, and summary
//! - Run fingerprinting and seeded synthetic bar tables

pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod program;
pub mod synthetic;

pub use engine::{run_backtest, RunError, RunReport, Simulation};
pub use program::Program;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: run inputs and outputs are Send + Sync so
    /// independent backtests can run on worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::RunId>();
        require_sync::<domain::RunId>();

        // Indicators
        require_send::<indicators::IndicatorCache>();
        require_sync::<indicators::IndicatorCache>();
        require_send::<Box<dyn indicators::Indicator>>();
        require_sync::<Box<dyn indicators::Indicator>>();

        // Programs
        require_send::<program::Program>();
        require_sync::<program::Program>();
        require_send::<program::CompiledProgram>();
        require_sync::<program::CompiledProgram>();
        require_send::<program::GlobalStore>();
        require_sync::<program::GlobalStore>();

        // Engine types
        require_send::<engine::Portfolio>();
        require_sync::<engine::Portfolio>();
        require_send::<engine::RunReport>();
        require_sync::<engine::RunReport>();
        require_send::<engine::RunError>();
        require_sync::<engine::RunError>();
        require_send::<engine::Simulation<'static>>();
        require_sync::<engine::Simulation<'static>>();
        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
    }

    /// Architecture contract: indicators see only the bar table, never the
    /// ledger. `compute` takes `&[Bar]` and nothing else.
    #[test]
    fn indicator_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            indicator: &dyn indicators::Indicator,
            bars: &[domain::Bar],
        ) -> Vec<f64> {
            indicator.compute(bars)
        }
    }
}
