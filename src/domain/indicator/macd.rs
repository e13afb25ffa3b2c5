//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: the line is defined from bar slow-1, signal and histogram from
//! bar slow-1 + signal-1.

use crate::domain::indicator::{calculate_ema, ema_of, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub line: Vec<IndicatorValue>,
    pub signal: Vec<IndicatorValue>,
    pub histogram: Vec<IndicatorValue>,
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdOutput {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let line: Vec<IndicatorValue> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| difference(*f, *s))
        .collect();
    let signal = ema_of(&line, signal_period);
    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| difference(*l, *s))
        .collect();

    MacdOutput {
        line,
        signal,
        histogram,
    }
}

fn difference(a: IndicatorValue, b: IndicatorValue) -> IndicatorValue {
    match (a.value(), b.value()) {
        (Some(a), Some(b)) => IndicatorValue::Defined(a - b),
        _ => IndicatorValue::Undefined,
    }
}
