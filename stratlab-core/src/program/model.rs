//! Authored strategy programs as produced by the editor.
//!
//! Statements are tagged by `"op"`, expressions by `"expr"`, and indicator
//! reads by `"kind"`:
//!
//! ```json
//! {
//!   "procedures": {
//!     "enter": [{ "op": "buy", "amount": { "expr": "number", "value": 50 } }]
//!   },
//!   "body": [
//!     {
//!       "op": "if",
//!       "condition": {
//!         "expr": "indicator",
//!         "indicator": { "kind": "trend_up", "period": 10, "factor": 3 }
//!       },
//!       "then": [{ "op": "call", "name": "enter" }],
//!       "else": [{ "op": "close" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Nothing here is validated; see [`super::compile`].

use super::compile::ProgramError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A strategy program: a body run once per bar plus named procedures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub procedures: BTreeMap<String, Vec<Statement>>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

impl Program {
    pub fn new(body: Vec<Statement>) -> Self {
        Self {
            procedures: BTreeMap::new(),
            body,
        }
    }

    pub fn with_procedure(mut self, name: impl Into<String>, body: Vec<Statement>) -> Self {
        self.procedures.insert(name.into(), body);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Canonical serialization used for content hashing. Procedures are
    /// ordered by name.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("Program must serialize")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Statement {
    /// Spend a percentage of cash at the bar's close.
    Buy { amount: Expr },
    /// Sell a percentage of the position at the bar's close.
    Sell { amount: Expr },
    /// Flatten the position and release the ladder and take-profit.
    Close,
    Log { value: Expr },
    DeclareGlobal { key: String },
    SetGlobal { key: String, value: Expr },
    PlaceGrid {
        count: Expr,
        growth: Expr,
        step: Expr,
        price: Expr,
    },
    SetTakeProfit { percent: Expr },
    If {
        condition: Expr,
        #[serde(default)]
        then: Vec<Statement>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Statement>,
    },
    Repeat { times: Expr, body: Vec<Statement> },
    /// Counts from `from` to `to` inclusive, stepping by `|by|` (default 1)
    /// in whichever direction reaches `to`.
    For {
        var: String,
        from: Expr,
        to: Expr,
        #[serde(default)]
        by: Option<Expr>,
        body: Vec<Statement>,
    },
    Call { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Number { value: f64 },
    Bool { value: bool },
    /// A numeric field of the current bar, by its column name.
    Column { column: String },
    GetGlobal { key: String },
    /// A `for` loop counter.
    Variable { name: String },
    /// Zero-based position of the current bar.
    BarIndex,
    /// Number of bars in the table.
    BarCount,
    BalanceIsInitial,
    Indicator { indicator: IndicatorSpec },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logic {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not { value: Box<Expr> },
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number { value }
    }

    pub fn column(column: &str) -> Self {
        Expr::Column {
            column: column.to_string(),
        }
    }

    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn arithmetic(op: ArithmeticOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The literal value, if this expression is a plain number.
    pub fn as_literal(&self) -> Option<f64> {
        match self {
            Expr::Number { value } => Some(*value),
            _ => None,
        }
    }
}

/// Indicator read as authored. Columns are names and periods are signed so
/// that bad values surface as compile errors rather than JSON errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorSpec {
    MovingAverage {
        column: String,
        period: i64,
    },
    MovingAverageDifference {
        column: String,
        fast: i64,
        slow: i64,
    },
    StandardDeviation {
        column: String,
        period: i64,
    },
    BollingerUpper {
        column: String,
        period: i64,
        multiplier: f64,
    },
    BollingerMiddle {
        column: String,
        period: i64,
        multiplier: f64,
    },
    BollingerLower {
        column: String,
        period: i64,
        multiplier: f64,
    },
    AverageTrueRange {
        period: i64,
    },
    TrendUp {
        period: i64,
        factor: f64,
    },
    TrendStop {
        period: i64,
        factor: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_json() {
        let json = r#"{
            "procedures": {
                "enter": [{ "op": "buy", "amount": { "expr": "number", "value": 50 } }]
            },
            "body": [
                {
                    "op": "if",
                    "condition": {
                        "expr": "compare",
                        "op": "lt",
                        "lhs": { "expr": "column", "column": "Close" },
                        "rhs": {
                            "expr": "indicator",
                            "indicator": { "kind": "moving_average", "column": "Close", "period": 20 }
                        }
                    },
                    "then": [{ "op": "call", "name": "enter" }],
                    "else": [{ "op": "close" }]
                }
            ]
        }"#;
        let program = Program::from_json(json).unwrap();
        assert_eq!(program.procedures.len(), 1);
        let Statement::If {
            condition,
            then,
            otherwise,
        } = &program.body[0]
        else {
            panic!("expected if, got {:?}", program.body[0]);
        };
        assert!(matches!(condition, Expr::Compare { op: CompareOp::Lt, .. }));
        assert_eq!(then, &vec![Statement::Call { name: "enter".into() }]);
        assert_eq!(otherwise, &vec![Statement::Close]);
    }

    #[test]
    fn else_branch_and_for_step_are_optional() {
        let json = r#"{ "body": [
            { "op": "if", "condition": { "expr": "bool", "value": true }, "then": [] },
            { "op": "for", "var": "i", "from": { "expr": "number", "value": 1 },
              "to": { "expr": "number", "value": 3 }, "body": [] }
        ] }"#;
        let program = Program::from_json(json).unwrap();
        assert!(matches!(&program.body[0], Statement::If { otherwise, .. } if otherwise.is_empty()));
        assert!(matches!(&program.body[1], Statement::For { by: None, .. }));
    }

    #[test]
    fn unknown_op_is_a_parse_error() {
        let err = Program::from_json(r#"{ "body": [{ "op": "launch_rocket" }] }"#).unwrap_err();
        assert!(matches!(err, ProgramError::Json(_)));
    }

    #[test]
    fn canonical_json_round_trips() {
        let program = Program::new(vec![Statement::Log {
            value: Expr::column("Close"),
        }])
        .with_procedure("noop", vec![]);
        let reparsed = Program::from_json(&program.canonical_json()).unwrap();
        assert_eq!(reparsed, program);
    }
}
