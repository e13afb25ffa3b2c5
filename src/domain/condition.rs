//! Condition AST.
//!
//! Buy and sell conditions are parsed once into this tree and evaluated per
//! bar by [`crate::domain::condition_eval`]. Operands are a raw price field,
//! a named indicator output, or a numeric constant.

pub use crate::domain::ohlcv::PriceField;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Price(PriceField),
    Indicator(String),
    Constant(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
}

/// Tolerance for `==` between two floats.
pub const EQ_EPSILON: f64 = 1e-9;

impl CompareOp {
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Gt => left > right,
            CompareOp::Le => left <= right,
            CompareOp::Ge => left >= right,
            CompareOp::Eq => (left - right).abs() < EQ_EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Indicator output names referenced anywhere in the tree, sorted.
    pub fn indicator_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Condition::Comparison { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Indicator(name) = operand {
                        names.insert(name.clone());
                    }
                }
            }
            Condition::And(children) | Condition::Or(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Price(field) => write!(f, "{}", field),
            Operand::Indicator(name) => f.write_str(name),
            Operand::Constant(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Condition::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    if matches!(child, Condition::Or(_)) {
                        write!(f, "({})", child)?;
                    } else {
                        write!(f, "{}", child)?;
                    }
                }
                Ok(())
            }
            Condition::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
        }
    }
}
