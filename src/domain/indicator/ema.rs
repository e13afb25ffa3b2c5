//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n defined values, then
//! EMA[i] = X[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::IndicatorValue;

pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<IndicatorValue> {
    let values: Vec<IndicatorValue> = closes.iter().map(|&c| IndicatorValue::Defined(c)).collect();
    ema_of(&values, period)
}

/// EMA over a series that may itself have a warm-up prefix.
///
/// Leading undefined samples are skipped and the seed window starts at the
/// first defined one. An undefined sample after that restarts the warm-up.
pub fn ema_of(values: &[IndicatorValue], period: usize) -> Vec<IndicatorValue> {
    if period == 0 {
        return vec![IndicatorValue::Undefined; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seen = 0usize;

    for value in values {
        match (value.value(), ema) {
            (None, _) => {
                ema = None;
                seed_sum = 0.0;
                seen = 0;
                out.push(IndicatorValue::Undefined);
            }
            (Some(x), Some(prev)) => {
                let next = x * k + prev * (1.0 - k);
                ema = Some(next);
                out.push(IndicatorValue::Defined(next));
            }
            (Some(x), None) => {
                seed_sum += x;
                seen += 1;
                if seen == period {
                    let seed = seed_sum / period as f64;
                    ema = Some(seed);
                    out.push(IndicatorValue::Defined(seed));
                } else {
                    out.push(IndicatorValue::Undefined);
                }
            }
        }
    }

    out
}
