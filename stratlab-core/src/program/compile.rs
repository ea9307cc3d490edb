//! Compilation of authored programs into typed instruction trees.
//!
//! Compilation resolves column names, validates indicator parameters, binds
//! procedure calls to indices, and rejects call cycles. A compiled program
//! cannot fail for structural reasons at runtime; only arithmetic and loop
//! faults remain.

use super::model::{ArithmeticOp, CompareOp, Expr, IndicatorSpec, LogicOp, Program, Statement};
use super::value::Value;
use crate::domain::{Column, ProgramHash, UnknownColumn};
use crate::indicators::{BollingerBand, IndicatorKey};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that make a program unrunnable. Raised before any bar is processed.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownColumn(#[from] UnknownColumn),

    #[error("unknown procedure '{0}'")]
    UnknownProcedure(String),

    #[error("procedure '{0}' calls itself (directly or through other procedures)")]
    RecursiveProcedure(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ProgramError {
    ProgramError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Executable statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Buy(Node),
    Sell(Node),
    Close,
    Log(Node),
    DeclareGlobal(String),
    SetGlobal(String, Node),
    PlaceGrid {
        count: Node,
        growth: Node,
        step: Node,
        price: Node,
    },
    SetTakeProfit(Node),
    If {
        condition: Node,
        then: Vec<Instr>,
        otherwise: Vec<Instr>,
    },
    Repeat {
        times: Node,
        body: Vec<Instr>,
    },
    For {
        var: String,
        from: Node,
        to: Node,
        by: Option<Node>,
        body: Vec<Instr>,
    },
    /// Index into [`CompiledProgram::procedures`].
    Call(usize),
}

/// Executable expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Const(Value),
    Column(Column),
    Global(String),
    Variable(String),
    BarIndex,
    BarCount,
    BalanceIsInitial,
    Indicator(IndicatorKey),
    Compare(CompareOp, Box<Node>, Box<Node>),
    Logic(LogicOp, Box<Node>, Box<Node>),
    Not(Box<Node>),
    Arithmetic(ArithmeticOp, Box<Node>, Box<Node>),
}

/// A validated program ready to be interpreted once per bar.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub(crate) body: Vec<Instr>,
    pub(crate) procedures: Vec<Vec<Instr>>,
    names: Vec<String>,
    hash: ProgramHash,
}

impl CompiledProgram {
    pub fn compile(program: &Program) -> Result<Self, ProgramError> {
        let names: Vec<String> = program.procedures.keys().cloned().collect();
        let (body, procedures) = {
            let index: HashMap<&str, usize> = names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i))
                .collect();
            let compiler = Compiler { index: &index };
            let body = compiler.block(&program.body)?;
            let procedures = program
                .procedures
                .values()
                .map(|stmts| compiler.block(stmts))
                .collect::<Result<Vec<_>, _>>()?;
            (body, procedures)
        };

        reject_cycles(&procedures, &names)?;

        Ok(Self {
            body,
            procedures,
            names,
            hash: ProgramHash::from_bytes(program.canonical_json().as_bytes()),
        })
    }

    pub fn hash(&self) -> &ProgramHash {
        &self.hash
    }

    pub fn procedure_names(&self) -> &[String] {
        &self.names
    }

    /// Top-level statement count.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Every indicator the program can read, in first-appearance order.
    pub fn indicator_keys(&self) -> Vec<IndicatorKey> {
        let mut keys = Vec::new();
        for block in std::iter::once(&self.body).chain(self.procedures.iter()) {
            collect_block_keys(block, &mut keys);
        }
        keys
    }
}

struct Compiler<'a> {
    index: &'a HashMap<&'a str, usize>,
}

impl Compiler<'_> {
    fn block(&self, stmts: &[Statement]) -> Result<Vec<Instr>, ProgramError> {
        stmts.iter().map(|s| self.statement(s)).collect()
    }

    fn statement(&self, stmt: &Statement) -> Result<Instr, ProgramError> {
        Ok(match stmt {
            Statement::Buy { amount } => Instr::Buy(self.expr(amount)?),
            Statement::Sell { amount } => Instr::Sell(self.expr(amount)?),
            Statement::Close => Instr::Close,
            Statement::Log { value } => Instr::Log(self.expr(value)?),
            Statement::DeclareGlobal { key } => Instr::DeclareGlobal(key.clone()),
            Statement::SetGlobal { key, value } => Instr::SetGlobal(key.clone(), self.expr(value)?),
            Statement::PlaceGrid {
                count,
                growth,
                step,
                price,
            } => {
                if let Some(n) = count.as_literal() {
                    if !n.is_finite() || n < 0.0 {
                        return Err(invalid("count", format!("grid level count must be >= 0, got {n}")));
                    }
                }
                if let Some(s) = step.as_literal() {
                    if !s.is_finite() || s < 0.0 {
                        return Err(invalid("step", format!("grid step must be >= 0, got {s}")));
                    }
                }
                Instr::PlaceGrid {
                    count: self.expr(count)?,
                    growth: self.expr(growth)?,
                    step: self.expr(step)?,
                    price: self.expr(price)?,
                }
            }
            Statement::SetTakeProfit { percent } => Instr::SetTakeProfit(self.expr(percent)?),
            Statement::If {
                condition,
                then,
                otherwise,
            } => Instr::If {
                condition: self.expr(condition)?,
                then: self.block(then)?,
                otherwise: self.block(otherwise)?,
            },
            Statement::Repeat { times, body } => Instr::Repeat {
                times: self.expr(times)?,
                body: self.block(body)?,
            },
            Statement::For {
                var,
                from,
                to,
                by,
                body,
            } => Instr::For {
                var: var.clone(),
                from: self.expr(from)?,
                to: self.expr(to)?,
                by: by.as_ref().map(|e| self.expr(e)).transpose()?,
                body: self.block(body)?,
            },
            Statement::Call { name } => match self.index.get(name.as_str()) {
                Some(&i) => Instr::Call(i),
                None => return Err(ProgramError::UnknownProcedure(name.clone())),
            },
        })
    }

    fn expr(&self, expr: &Expr) -> Result<Node, ProgramError> {
        Ok(match expr {
            Expr::Number { value } => Node::Const(Value::Number(*value)),
            Expr::Bool { value } => Node::Const(Value::Bool(*value)),
            Expr::Column { column } => Node::Column(column.parse()?),
            Expr::GetGlobal { key } => Node::Global(key.clone()),
            Expr::Variable { name } => Node::Variable(name.clone()),
            Expr::BarIndex => Node::BarIndex,
            Expr::BarCount => Node::BarCount,
            Expr::BalanceIsInitial => Node::BalanceIsInitial,
            Expr::Indicator { indicator } => Node::Indicator(indicator_key(indicator)?),
            Expr::Compare { op, lhs, rhs } => {
                Node::Compare(*op, Box::new(self.expr(lhs)?), Box::new(self.expr(rhs)?))
            }
            Expr::Logic { op, lhs, rhs } => {
                Node::Logic(*op, Box::new(self.expr(lhs)?), Box::new(self.expr(rhs)?))
            }
            Expr::Not { value } => Node::Not(Box::new(self.expr(value)?)),
            Expr::Arithmetic { op, lhs, rhs } => {
                Node::Arithmetic(*op, Box::new(self.expr(lhs)?), Box::new(self.expr(rhs)?))
            }
        })
    }
}

fn period(name: &'static str, value: i64) -> Result<usize, ProgramError> {
    if value < 1 {
        return Err(invalid(name, format!("period must be >= 1, got {value}")));
    }
    usize::try_from(value).map_err(|_| invalid(name, format!("period {value} is too large")))
}

fn non_negative(name: &'static str, value: f64) -> Result<f64, ProgramError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(name, format!("must be finite and >= 0, got {value}")));
    }
    Ok(value)
}

/// Validate an authored indicator read into a cache key.
pub fn indicator_key(spec: &IndicatorSpec) -> Result<IndicatorKey, ProgramError> {
    match spec {
        IndicatorSpec::MovingAverage { column, period: p } => Ok(IndicatorKey::MovingAverage {
            column: column.parse()?,
            period: period("period", *p)?,
        }),
        IndicatorSpec::MovingAverageDifference { column, fast, slow } => {
            Ok(IndicatorKey::MovingAverageDifference {
                column: column.parse()?,
                fast: period("fast", *fast)?,
                slow: period("slow", *slow)?,
            })
        }
        IndicatorSpec::StandardDeviation { column, period: p } => {
            Ok(IndicatorKey::StandardDeviation {
                column: column.parse()?,
                period: period("period", *p)?,
            })
        }
        IndicatorSpec::BollingerUpper {
            column,
            period: p,
            multiplier,
        } => bollinger_key(column, *p, *multiplier, BollingerBand::Upper),
        IndicatorSpec::BollingerMiddle {
            column,
            period: p,
            multiplier,
        } => bollinger_key(column, *p, *multiplier, BollingerBand::Middle),
        IndicatorSpec::BollingerLower {
            column,
            period: p,
            multiplier,
        } => bollinger_key(column, *p, *multiplier, BollingerBand::Lower),
        IndicatorSpec::AverageTrueRange { period: p } => Ok(IndicatorKey::AverageTrueRange {
            period: period("period", *p)?,
        }),
        IndicatorSpec::TrendUp { period: p, factor } => Ok(IndicatorKey::TrendUp {
            period: period("period", *p)?,
            factor: non_negative("factor", *factor)?,
        }),
        IndicatorSpec::TrendStop { period: p, factor } => Ok(IndicatorKey::TrendStop {
            period: period("period", *p)?,
            factor: non_negative("factor", *factor)?,
        }),
    }
}

fn bollinger_key(
    column: &str,
    p: i64,
    multiplier: f64,
    band: BollingerBand,
) -> Result<IndicatorKey, ProgramError> {
    Ok(IndicatorKey::Bollinger {
        column: column.parse()?,
        period: period("period", p)?,
        multiplier: non_negative("multiplier", multiplier)?,
        band,
    })
}

fn collect_calls(block: &[Instr], out: &mut Vec<usize>) {
    for instr in block {
        match instr {
            Instr::Call(i) => out.push(*i),
            Instr::If { then, otherwise, .. } => {
                collect_calls(then, out);
                collect_calls(otherwise, out);
            }
            Instr::Repeat { body, .. } | Instr::For { body, .. } => collect_calls(body, out),
            _ => {}
        }
    }
}

/// Depth-first search over the call graph; any back edge is a cycle.
fn reject_cycles(procedures: &[Vec<Instr>], names: &[String]) -> Result<(), ProgramError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    let edges: Vec<Vec<usize>> = procedures
        .iter()
        .map(|body| {
            let mut calls = Vec::new();
            collect_calls(body, &mut calls);
            calls
        })
        .collect();

    fn visit(node: usize, edges: &[Vec<usize>], marks: &mut [Mark]) -> Option<usize> {
        marks[node] = Mark::Active;
        for &next in &edges[node] {
            match marks[next] {
                Mark::Active => return Some(next),
                Mark::Unvisited => {
                    if let Some(hit) = visit(next, edges, marks) {
                        return Some(hit);
                    }
                }
                Mark::Done => {}
            }
        }
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; procedures.len()];
    for start in 0..procedures.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(hit) = visit(start, &edges, &mut marks) {
                return Err(ProgramError::RecursiveProcedure(names[hit].clone()));
            }
        }
    }
    Ok(())
}

fn collect_block_keys(block: &[Instr], keys: &mut Vec<IndicatorKey>) {
    for instr in block {
        match instr {
            Instr::Buy(n)
            | Instr::Sell(n)
            | Instr::Log(n)
            | Instr::SetGlobal(_, n)
            | Instr::SetTakeProfit(n) => collect_node_keys(n, keys),
            Instr::PlaceGrid {
                count,
                growth,
                step,
                price,
            } => {
                for n in [count, growth, step, price] {
                    collect_node_keys(n, keys);
                }
            }
            Instr::If {
                condition,
                then,
                otherwise,
            } => {
                collect_node_keys(condition, keys);
                collect_block_keys(then, keys);
                collect_block_keys(otherwise, keys);
            }
            Instr::Repeat { times, body } => {
                collect_node_keys(times, keys);
                collect_block_keys(body, keys);
            }
            Instr::For {
                from, to, by, body, ..
            } => {
                collect_node_keys(from, keys);
                collect_node_keys(to, keys);
                if let Some(by) = by {
                    collect_node_keys(by, keys);
                }
                collect_block_keys(body, keys);
            }
            Instr::Close | Instr::DeclareGlobal(_) | Instr::Call(_) => {}
        }
    }
}

fn collect_node_keys(node: &Node, keys: &mut Vec<IndicatorKey>) {
    match node {
        Node::Indicator(key) => {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        Node::Compare(_, a, b) | Node::Logic(_, a, b) | Node::Arithmetic(_, a, b) => {
            collect_node_keys(a, keys);
            collect_node_keys(b, keys);
        }
        Node::Not(a) => collect_node_keys(a, keys),
        Node::Const(_)
        | Node::Column(_)
        | Node::Global(_)
        | Node::Variable(_)
        | Node::BarIndex
        | Node::BarCount
        | Node::BalanceIsInitial => {}
    }
}
