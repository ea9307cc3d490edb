//! Strategy programs: authored model, compiler, and per-bar interpreter.
//!
//! An authored [`Program`] is compiled once per run into a
//! [`CompiledProgram`], then executed once per bar against a fresh
//! [`EvalContext`]. Globals live in a [`GlobalStore`] owned by the run.

pub mod compile;
pub mod context;
pub mod globals;
pub mod interpreter;
pub mod model;
pub mod value;

pub use compile::{indicator_key, CompiledProgram, Instr, Node, ProgramError};
pub use context::EvalContext;
pub use globals::GlobalStore;
pub use interpreter::{RuntimeFault, MAX_LOOP_ITERATIONS};
pub use model::{ArithmeticOp, CompareOp, Expr, IndicatorSpec, LogicOp, Program, Statement};
pub use value::Value;
