//! Condition evaluation.
//!
//! # Evaluation Semantics
//!
//! - Comparisons read the bar's price fields and the indicator frame at the
//!   same bar index. An undefined (or missing) indicator sample makes the
//!   comparison `Unknown`.
//! - `And` / `Or` evaluate every child; there is no short-circuit. Any
//!   `Unknown` child makes the whole node `Unknown`.
//! - Only `True` is a signal. `Unknown` during warm-up is normal, not an error.

use crate::domain::condition::{Condition, Operand};
use crate::domain::indicator::IndicatorFrame;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    True,
    False,
    Unknown,
}

impl Evaluation {
    pub fn is_true(self) -> bool {
        self == Evaluation::True
    }

    pub fn and(self, other: Evaluation) -> Evaluation {
        match (self, other) {
            (Evaluation::Unknown, _) | (_, Evaluation::Unknown) => Evaluation::Unknown,
            (Evaluation::True, Evaluation::True) => Evaluation::True,
            _ => Evaluation::False,
        }
    }

    pub fn or(self, other: Evaluation) -> Evaluation {
        match (self, other) {
            (Evaluation::Unknown, _) | (_, Evaluation::Unknown) => Evaluation::Unknown,
            (Evaluation::False, Evaluation::False) => Evaluation::False,
            _ => Evaluation::True,
        }
    }
}

impl From<bool> for Evaluation {
    fn from(value: bool) -> Self {
        if value {
            Evaluation::True
        } else {
            Evaluation::False
        }
    }
}

pub fn evaluate(
    condition: &Condition,
    bar: &Bar,
    frame: &IndicatorFrame,
    bar_index: usize,
) -> Evaluation {
    match condition {
        Condition::Comparison { left, op, right } => {
            let left_val = resolve_operand(left, bar, frame, bar_index);
            let right_val = resolve_operand(right, bar, frame, bar_index);
            match (left_val, right_val) {
                (Some(l), Some(r)) => op.apply(l, r).into(),
                _ => Evaluation::Unknown,
            }
        }
        Condition::And(children) => children
            .iter()
            .map(|c| evaluate(c, bar, frame, bar_index))
            .fold(Evaluation::True, Evaluation::and),
        Condition::Or(children) => children
            .iter()
            .map(|c| evaluate(c, bar, frame, bar_index))
            .fold(Evaluation::False, Evaluation::or),
    }
}

fn resolve_operand(
    operand: &Operand,
    bar: &Bar,
    frame: &IndicatorFrame,
    bar_index: usize,
) -> Option<f64> {
    match operand {
        Operand::Price(field) => Some(bar.field(*field)),
        Operand::Constant(v) => Some(*v),
        Operand::Indicator(name) => frame.value(name, bar_index).and_then(|v| v.value()),
    }
}
