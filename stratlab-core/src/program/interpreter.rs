//! Tree-walking interpreter for compiled programs.
//!
//! One call to [`CompiledProgram::run_bar`] executes the program body for one
//! bar. Trading primitives act at the context's close price and time. Order
//! rejections are ignored here; the ledger records them as outcomes.

use super::compile::{CompiledProgram, Instr, Node};
use super::context::EvalContext;
use super::model::{ArithmeticOp, CompareOp, LogicOp};
use super::value::Value;
use thiserror::Error;

/// Upper bound on loop iterations (all loops combined) within a single bar.
pub const MAX_LOOP_ITERATIONS: usize = 100_000;

/// Errors raised while executing a program for one bar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFault {
    #[error("division by zero")]
    DivisionByZero,

    #[error("loop bound is not a finite number: {0}")]
    NonFiniteLoopBound(f64),

    #[error("loop step is zero")]
    ZeroLoopStep,

    #[error("more than {limit} loop iterations in one bar")]
    IterationLimit { limit: usize },

    #[error("grid level count must be a whole number between 0 and {limit}, got {count}")]
    InvalidGridCount { count: f64, limit: usize },
}

impl CompiledProgram {
    /// Execute the program body against one bar's context.
    pub fn run_bar(&self, ctx: &mut EvalContext<'_>) -> Result<(), RuntimeFault> {
        self.exec(&self.body, ctx)
    }

    fn exec(&self, block: &[Instr], ctx: &mut EvalContext<'_>) -> Result<(), RuntimeFault> {
        for instr in block {
            self.step(instr, ctx)?;
        }
        Ok(())
    }

    fn step(&self, instr: &Instr, ctx: &mut EvalContext<'_>) -> Result<(), RuntimeFault> {
        let (price, time, index) = (ctx.close(), ctx.time(), ctx.index());
        match instr {
            Instr::Buy(amount) => {
                let pct = self.number(amount, ctx)?;
                ctx.portfolio.buy_percent_of_cash(pct, price, time, index);
            }
            Instr::Sell(amount) => {
                let pct = self.number(amount, ctx)?;
                ctx.portfolio.sell_percent_of_position(pct, price, time, index);
            }
            Instr::Close => {
                ctx.portfolio.close_position(price, time, index);
            }
            Instr::Log(value) => {
                let line = self.eval(value, ctx)?.to_string();
                ctx.log(line);
            }
            Instr::DeclareGlobal(key) => ctx.globals.declare(key),
            Instr::SetGlobal(key, value) => {
                let value = self.number(value, ctx)?;
                ctx.globals.set(key, value);
            }
            Instr::PlaceGrid {
                count,
                growth,
                step,
                price: anchor,
            } => {
                let count = self.number(count, ctx)?;
                if !count.is_finite() || count < 0.0 || count > MAX_LOOP_ITERATIONS as f64 {
                    return Err(RuntimeFault::InvalidGridCount {
                        count,
                        limit: MAX_LOOP_ITERATIONS,
                    });
                }
                let growth = self.number(growth, ctx)?;
                let step = self.number(step, ctx)?;
                let anchor = self.number(anchor, ctx)?;
                ctx.portfolio
                    .place_grid(count.ceil() as usize, growth, step, anchor);
            }
            Instr::SetTakeProfit(percent) => {
                let pct = self.number(percent, ctx)?;
                ctx.portfolio.set_take_profit_percent(pct);
            }
            Instr::If {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition, ctx)?.as_bool() {
                    self.exec(then, ctx)?;
                } else {
                    self.exec(otherwise, ctx)?;
                }
            }
            Instr::Repeat { times, body } => {
                let times = finite(self.number(times, ctx)?)?;
                let mut done = 0.0;
                while done < times {
                    tick(ctx)?;
                    self.exec(body, ctx)?;
                    done += 1.0;
                }
            }
            Instr::For {
                var,
                from,
                to,
                by,
                body,
            } => {
                let from = finite(self.number(from, ctx)?)?;
                let to = finite(self.number(to, ctx)?)?;
                let step = match by {
                    Some(by) => finite(self.number(by, ctx)?)?.abs(),
                    None => 1.0,
                };
                if step == 0.0 {
                    return Err(RuntimeFault::ZeroLoopStep);
                }

                let ascending = from <= to;
                let mut i = from;
                while (ascending && i <= to) || (!ascending && i >= to) {
                    tick(ctx)?;
                    ctx.locals.insert(var.clone(), i);
                    self.exec(body, ctx)?;
                    if ascending {
                        i += step;
                    } else {
                        i -= step;
                    }
                }
            }
            Instr::Call(procedure) => self.exec(&self.procedures[*procedure], ctx)?,
        }
        Ok(())
    }

    fn number(&self, node: &Node, ctx: &mut EvalContext<'_>) -> Result<f64, RuntimeFault> {
        Ok(self.eval(node, ctx)?.as_number())
    }

    fn eval(&self, node: &Node, ctx: &mut EvalContext<'_>) -> Result<Value, RuntimeFault> {
        Ok(match node {
            Node::Const(value) => *value,
            Node::Column(column) => Value::Number(ctx.bar().get(*column)),
            Node::Global(key) => Value::Number(ctx.globals.get(key)),
            Node::Variable(name) => {
                Value::Number(ctx.locals.get(name).copied().unwrap_or(f64::NAN))
            }
            Node::BarIndex => Value::Number(ctx.index() as f64),
            Node::BarCount => Value::Number(ctx.bar_count() as f64),
            Node::BalanceIsInitial => Value::Bool(ctx.portfolio.balance_is_initial()),
            Node::Indicator(key) => {
                let v = ctx.indicator(*key);
                if key.is_boolean() {
                    Value::Bool(v != 0.0)
                } else {
                    Value::Number(v)
                }
            }
            Node::Compare(op, lhs, rhs) => {
                let a = self.number(lhs, ctx)?;
                let b = self.number(rhs, ctx)?;
                Value::Bool(match op {
                    CompareOp::Eq => a == b,
                    CompareOp::Ne => a != b,
                    CompareOp::Lt => a < b,
                    CompareOp::Le => a <= b,
                    CompareOp::Gt => a > b,
                    CompareOp::Ge => a >= b,
                })
            }
            Node::Logic(op, lhs, rhs) => {
                let left = self.eval(lhs, ctx)?.as_bool();
                Value::Bool(match op {
                    LogicOp::And => left && self.eval(rhs, ctx)?.as_bool(),
                    LogicOp::Or => left || self.eval(rhs, ctx)?.as_bool(),
                })
            }
            Node::Not(inner) => Value::Bool(!self.eval(inner, ctx)?.as_bool()),
            Node::Arithmetic(op, lhs, rhs) => {
                let a = self.number(lhs, ctx)?;
                let b = self.number(rhs, ctx)?;
                Value::Number(match op {
                    ArithmeticOp::Add => a + b,
                    ArithmeticOp::Sub => a - b,
                    ArithmeticOp::Mul => a * b,
                    ArithmeticOp::Div => {
                        if b == 0.0 {
                            return Err(RuntimeFault::DivisionByZero);
                        }
                        a / b
                    }
                    ArithmeticOp::Pow => a.powf(b),
                })
            }
        })
    }
}

fn finite(value: f64) -> Result<f64, RuntimeFault> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RuntimeFault::NonFiniteLoopBound(value))
    }
}

fn tick(ctx: &mut EvalContext<'_>) -> Result<(), RuntimeFault> {
    ctx.iterations += 1;
    if ctx.iterations > MAX_LOOP_ITERATIONS {
        return Err(RuntimeFault::IterationLimit {
            limit: MAX_LOOP_ITERATIONS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::engine::Portfolio;
    use crate::indicators::{make_bars, IndicatorCache};
    use crate::program::{Expr, GlobalStore, IndicatorSpec, Program, Statement};

    struct Harness {
        bars: Vec<Bar>,
        portfolio: Portfolio,
        globals: GlobalStore,
        cache: IndicatorCache,
    }

    impl Harness {
        fn new(closes: &[f64]) -> Self {
            Self {
                bars: make_bars(closes),
                portfolio: Portfolio::new(1000.0),
                globals: GlobalStore::new(),
                cache: IndicatorCache::new(),
            }
        }

        fn run(&mut self, body: Vec<Statement>, index: usize) -> Result<(), RuntimeFault> {
            let program = CompiledProgram::compile(&Program::new(body)).unwrap();
            self.run_compiled(&program, index)
        }

        fn run_compiled(&mut self, program: &CompiledProgram, index: usize) -> Result<(), RuntimeFault> {
            let mut ctx = EvalContext::new(
                &self.bars,
                index,
                &mut self.portfolio,
                &mut self.globals,
                &mut self.cache,
            );
            program.run_bar(&mut ctx)
        }

        fn lines(&self) -> &[String] {
            &self.portfolio.journal().lines
        }
    }

    fn log(value: Expr) -> Statement {
        Statement::Log { value }
    }

    fn num(v: f64) -> Expr {
        Expr::number(v)
    }

    #[test]
    fn log_formats_values() {
        let mut h = Harness::new(&[100.0, 101.5]);
        h.run(
            vec![
                log(Expr::column("Close")),
                log(Expr::Bool { value: true }),
                log(Expr::GetGlobal { key: "nope".into() }),
            ],
            1,
        )
        .unwrap();
        assert_eq!(h.lines(), &["101.5", "true", "NaN"]);
    }

    #[test]
    fn buy_and_close_use_the_bound_bar() {
        let mut h = Harness::new(&[100.0, 200.0]);
        h.run(vec![Statement::Buy { amount: num(50.0) }], 0).unwrap();
        assert_eq!(h.portfolio.position_qty(), 5.0);
        h.run(vec![Statement::Close], 1).unwrap();
        assert_eq!(h.portfolio.position_qty(), 0.0);
        assert_eq!(h.portfolio.realized_profit(), 500.0);
        assert!(h.lines()[1].starts_with("t1 SELL 100.00%"));
    }

    #[test]
    fn globals_persist_across_bars() {
        let mut h = Harness::new(&[1.0, 2.0, 3.0]);
        let program = CompiledProgram::compile(&Program::new(vec![
            Statement::DeclareGlobal { key: "n".into() },
            Statement::If {
                condition: Expr::compare(
                    CompareOp::Ne,
                    Expr::GetGlobal { key: "n".into() },
                    Expr::GetGlobal { key: "n".into() },
                ),
                then: vec![Statement::SetGlobal {
                    key: "n".into(),
                    value: num(0.0),
                }],
                otherwise: vec![],
            },
            Statement::SetGlobal {
                key: "n".into(),
                value: Expr::arithmetic(ArithmeticOp::Add, Expr::GetGlobal { key: "n".into() }, num(1.0)),
            },
        ]))
        .unwrap();
        for i in 0..3 {
            h.run_compiled(&program, i).unwrap();
        }
        assert_eq!(h.globals.get("n"), 3.0);
    }

    #[test]
    fn for_loop_counts_both_directions() {
        let mut h = Harness::new(&[1.0]);
        let counter = |from: f64, to: f64, by: Option<f64>| Statement::For {
            var: "i".into(),
            from: num(from),
            to: num(to),
            by: by.map(num),
            body: vec![log(Expr::Variable { name: "i".into() })],
        };
        h.run(vec![counter(1.0, 3.0, None), counter(10.0, 4.0, Some(3.0))], 0)
            .unwrap();
        assert_eq!(h.lines(), &["1", "2", "3", "10", "7", "4"]);
    }

    #[test]
    fn repeat_rounds_fractions_up_and_skips_negative() {
        let mut h = Harness::new(&[1.0]);
        h.run(
            vec![
                Statement::Repeat {
                    times: num(2.7),
                    body: vec![log(num(1.0))],
                },
                Statement::Repeat {
                    times: num(-3.0),
                    body: vec![log(num(2.0))],
                },
            ],
            0,
        )
        .unwrap();
        assert_eq!(h.lines(), &["1", "1", "1"]);
    }

    #[test]
    fn division_by_zero_faults() {
        let mut h = Harness::new(&[1.0]);
        let err = h
            .run(
                vec![log(Expr::arithmetic(ArithmeticOp::Div, num(1.0), num(0.0)))],
                0,
            )
            .unwrap_err();
        assert_eq!(err, RuntimeFault::DivisionByZero);
    }

    #[test]
    fn loop_faults() {
        let mut h = Harness::new(&[1.0]);
        let zero_step = Statement::For {
            var: "i".into(),
            from: num(0.0),
            to: num(1.0),
            by: Some(num(0.0)),
            body: vec![],
        };
        assert_eq!(h.run(vec![zero_step], 0), Err(RuntimeFault::ZeroLoopStep));

        let unbounded = Statement::Repeat {
            times: Expr::GetGlobal { key: "unset".into() },
            body: vec![],
        };
        assert!(matches!(
            h.run(vec![unbounded], 0),
            Err(RuntimeFault::NonFiniteLoopBound(v)) if v.is_nan()
        ));

        let runaway = Statement::Repeat {
            times: num(1e9),
            body: vec![],
        };
        assert_eq!(
            h.run(vec![runaway], 0),
            Err(RuntimeFault::IterationLimit {
                limit: MAX_LOOP_ITERATIONS
            })
        );
    }

    #[test]
    fn logic_short_circuits() {
        let mut h = Harness::new(&[1.0]);
        let faulty = Expr::arithmetic(ArithmeticOp::Div, num(1.0), num(0.0));
        let guarded = Expr::Logic {
            op: LogicOp::And,
            lhs: Box::new(Expr::Bool { value: false }),
            rhs: Box::new(faulty),
        };
        h.run(vec![log(guarded)], 0).unwrap();
        assert_eq!(h.lines(), &["false"]);
    }

    #[test]
    fn trend_indicator_reads_as_bool() {
        let mut h = Harness::new(&[10.0, 11.0, 12.0]);
        h.run(
            vec![log(Expr::Indicator {
                indicator: IndicatorSpec::TrendUp {
                    period: 1,
                    factor: 1.0,
                },
            })],
            2,
        )
        .unwrap();
        assert_eq!(h.lines(), &["true"]);
    }

    #[test]
    fn grid_and_take_profit_primitives() {
        let mut h = Harness::new(&[100.0]);
        h.run(
            vec![
                Statement::PlaceGrid {
                    count: num(3.0),
                    growth: num(0.1),
                    step: num(10.0),
                    price: Expr::column("Close"),
                },
                Statement::SetTakeProfit { percent: num(5.0) },
            ],
            0,
        )
        .unwrap();
        assert_eq!(h.portfolio.ladder().orders().len(), 3);
        assert_eq!(h.portfolio.take_profit_pct(), Some(5.0));

        let err = h
            .run(
                vec![Statement::PlaceGrid {
                    count: Expr::GetGlobal { key: "missing".into() },
                    growth: num(0.0),
                    step: num(1.0),
                    price: num(100.0),
                }],
                0,
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeFault::InvalidGridCount { .. }));
    }

    #[test]
    fn fractional_grid_count_rounds_up() {
        let mut h = Harness::new(&[100.0]);
        h.run(
            vec![Statement::PlaceGrid {
                count: num(2.5),
                growth: num(0.0),
                step: num(10.0),
                price: num(200.0),
            }],
            0,
        )
        .unwrap();
        assert_eq!(h.portfolio.ladder().orders().len(), 3);
    }

    #[test]
    fn balance_is_initial_tracks_cash() {
        let mut h = Harness::new(&[100.0]);
        let check = log(Expr::BalanceIsInitial);
        h.run(vec![check.clone(), Statement::Buy { amount: num(10.0) }, check], 0)
            .unwrap();
        assert_eq!(h.lines()[0], "true");
        assert_eq!(h.lines()[2], "false");
    }
}
