//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (k × StdDev)
//! - Lower: Middle - (k × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: window=20, k=2.0
//! Warmup: first (window-1) bars are undefined.

use crate::domain::indicator::{calculate_sma, calculate_stddev, IndicatorValue};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    pub upper: Vec<IndicatorValue>,
    pub middle: Vec<IndicatorValue>,
    pub lower: Vec<IndicatorValue>,
}

pub fn calculate_bollinger(closes: &[f64], window: usize, k: f64) -> BollingerOutput {
    let middle = calculate_sma(closes, window);
    let stddev = calculate_stddev(closes, window);

    let mut upper = Vec::with_capacity(closes.len());
    let mut lower = Vec::with_capacity(closes.len());
    for (m, sd) in middle.iter().zip(&stddev) {
        match (m.value(), sd.value()) {
            (Some(m), Some(sd)) => {
                upper.push(IndicatorValue::Defined(m + k * sd));
                lower.push(IndicatorValue::Defined(m - k * sd));
            }
            _ => {
                upper.push(IndicatorValue::Undefined);
                lower.push(IndicatorValue::Undefined);
            }
        }
    }

    BollingerOutput {
        upper,
        middle,
        lower,
    }
}
