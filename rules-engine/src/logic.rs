//! Typed expression tree for CertLogic rules
//!
//! Rule logic arrives as JSON (`{"operator": [operands...]}`). Parsing it
//! up front turns unknown operators and wrong arities into errors before
//! any evaluation happens.

use serde_json::Value;

use crate::error::{Result, RuleEngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    StrictEq,
    LooseEq,
    StrictNe,
    LooseNe,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::StrictEq => "===",
            Comparison::LooseEq => "==",
            Comparison::StrictNe => "!==",
            Comparison::LooseNe => "!=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
        }
    }

    fn is_ordering(self) -> bool {
        matches!(
            self,
            Comparison::Less
                | Comparison::LessOrEqual
                | Comparison::Greater
                | Comparison::GreaterOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateComparison {
    Before,
    NotBefore,
    After,
    NotAfter,
}

impl DateComparison {
    pub fn symbol(self) -> &'static str {
        match self {
            DateComparison::Before => "before",
            DateComparison::NotBefore => "not-before",
            DateComparison::After => "after",
            DateComparison::NotAfter => "not-after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hour,
    Day,
    Month,
    Year,
}

impl TimeUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hour" => Some(TimeUnit::Hour),
            "day" => Some(TimeUnit::Day),
            "month" => Some(TimeUnit::Month),
            "year" => Some(TimeUnit::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Logic {
    Literal(Value),
    Array(Vec<Logic>),
    /// Dotted path into the evaluation data; `""` is the whole data
    Var {
        path: String,
        default: Option<Box<Logic>>,
    },
    /// `[cond, then, cond, then, ..., else]`
    If(Vec<Logic>),
    Compare {
        op: Comparison,
        operands: Vec<Logic>,
    },
    And(Vec<Logic>),
    Or(Vec<Logic>),
    Not(Box<Logic>),
    Truthy(Box<Logic>),
    In {
        needle: Box<Logic>,
        haystack: Box<Logic>,
    },
    Plus(Vec<Logic>),
    PlusTime {
        date: Box<Logic>,
        amount: Box<Logic>,
        unit: TimeUnit,
    },
    CompareDates {
        op: DateComparison,
        operands: Vec<Logic>,
    },
    Reduce {
        operand: Box<Logic>,
        lambda: Box<Logic>,
        initial: Box<Logic>,
    },
    ExtractFromUvci {
        operand: Box<Logic>,
        index: Box<Logic>,
    },
}

impl Logic {
    /// # Errors
    ///
    /// [`RuleEngineError::UnknownOperator`] for operators outside the
    /// dialect, [`RuleEngineError::InvalidLogic`] for malformed operands.
    pub fn parse(raw: &Value) -> Result<Logic> {
        match raw {
            Value::Array(items) => Ok(Logic::Array(parse_all(items)?)),
            Value::Object(map) => {
                let mut entries = map.iter();
                match (entries.next(), entries.next()) {
                    (Some((op, args)), None) => parse_operation(op, args),
                    _ => Err(RuleEngineError::InvalidLogic(format!(
                        "operation objects need exactly one key, found {}",
                        map.len()
                    ))),
                }
            }
            scalar => Ok(Logic::Literal(scalar.clone())),
        }
    }
}

fn parse_all(items: &[Value]) -> Result<Vec<Logic>> {
    items.iter().map(Logic::parse).collect()
}

/// Operands are normally an array; a lone value is shorthand for `[value]`
fn operands(args: &Value) -> Result<Vec<Logic>> {
    match args {
        Value::Array(items) => parse_all(items),
        single => Ok(vec![Logic::parse(single)?]),
    }
}

fn exactly<const N: usize>(op: &str, args: &Value) -> Result<[Logic; N]> {
    let parsed = operands(args)?;
    let found = parsed.len();
    parsed.try_into().map_err(|_| {
        RuleEngineError::InvalidLogic(format!("'{}' takes {} operands, found {}", op, N, found))
    })
}

fn boxed<const N: usize>(parsed: [Logic; N]) -> [Box<Logic>; N] {
    parsed.map(Box::new)
}

fn parse_operation(op: &str, args: &Value) -> Result<Logic> {
    let comparison = match op {
        "===" => Some(Comparison::StrictEq),
        "==" => Some(Comparison::LooseEq),
        "!==" => Some(Comparison::StrictNe),
        "!=" => Some(Comparison::LooseNe),
        "<" => Some(Comparison::Less),
        "<=" => Some(Comparison::LessOrEqual),
        ">" => Some(Comparison::Greater),
        ">=" => Some(Comparison::GreaterOrEqual),
        _ => None,
    };
    if let Some(op) = comparison {
        let operands = operands(args)?;
        let allowed = if op.is_ordering() { 2..=3 } else { 2..=2 };
        if !allowed.contains(&operands.len()) {
            return Err(RuleEngineError::InvalidLogic(format!(
                "'{}' cannot take {} operands",
                op.symbol(),
                operands.len()
            )));
        }
        return Ok(Logic::Compare { op, operands });
    }

    let date_comparison = match op {
        "before" => Some(DateComparison::Before),
        "not-before" => Some(DateComparison::NotBefore),
        "after" => Some(DateComparison::After),
        "not-after" => Some(DateComparison::NotAfter),
        _ => None,
    };
    if let Some(op) = date_comparison {
        let operands = operands(args)?;
        if !(2..=3).contains(&operands.len()) {
            return Err(RuleEngineError::InvalidLogic(format!(
                "'{}' takes 2 or 3 operands, found {}",
                op.symbol(),
                operands.len()
            )));
        }
        return Ok(Logic::CompareDates { op, operands });
    }

    match op {
        "var" => parse_var(args),
        "if" => Ok(Logic::If(operands(args)?)),
        "and" | "or" => {
            let operands = operands(args)?;
            if operands.is_empty() {
                return Err(RuleEngineError::InvalidLogic(format!(
                    "'{}' needs at least one operand",
                    op
                )));
            }
            Ok(if op == "and" {
                Logic::And(operands)
            } else {
                Logic::Or(operands)
            })
        }
        "!" => {
            let [operand] = boxed(exactly::<1>(op, args)?);
            Ok(Logic::Not(operand))
        }
        "!!" => {
            let [operand] = boxed(exactly::<1>(op, args)?);
            Ok(Logic::Truthy(operand))
        }
        "in" => {
            let [needle, haystack] = boxed(exactly::<2>(op, args)?);
            Ok(Logic::In { needle, haystack })
        }
        "+" => Ok(Logic::Plus(operands(args)?)),
        "plusTime" => {
            let [date, amount, unit] = exactly::<3>(op, args)?;
            let unit = match &unit {
                Logic::Literal(Value::String(raw)) => TimeUnit::parse(raw),
                _ => None,
            }
            .ok_or_else(|| {
                RuleEngineError::InvalidLogic(
                    "'plusTime' unit must be one of hour, day, month, year".to_string(),
                )
            })?;
            Ok(Logic::PlusTime {
                date: Box::new(date),
                amount: Box::new(amount),
                unit,
            })
        }
        "reduce" => {
            let [operand, lambda, initial] = boxed(exactly::<3>(op, args)?);
            Ok(Logic::Reduce {
                operand,
                lambda,
                initial,
            })
        }
        "extractFromUVCI" => {
            let [operand, index] = boxed(exactly::<2>(op, args)?);
            Ok(Logic::ExtractFromUvci { operand, index })
        }
        unknown => Err(RuleEngineError::UnknownOperator(unknown.to_string())),
    }
}

fn parse_var(args: &Value) -> Result<Logic> {
    let (path, default) = match args {
        Value::Array(items) => match items.as_slice() {
            [] => (Value::String(String::new()), None),
            [path] => (path.clone(), None),
            [path, default] => (path.clone(), Some(Box::new(Logic::parse(default)?))),
            _ => {
                return Err(RuleEngineError::InvalidLogic(
                    "'var' takes a path and an optional default".to_string(),
                ))
            }
        },
        other => (other.clone(), None),
    };

    let path = match path {
        Value::String(path) => path,
        Value::Number(index) => index.to_string(),
        Value::Null => String::new(),
        other => {
            return Err(RuleEngineError::InvalidLogic(format!(
                "'var' path must be a string, found {}",
                other
            )))
        }
    };
    Ok(Logic::Var { path, default })
}
