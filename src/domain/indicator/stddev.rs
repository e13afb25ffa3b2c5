//! Rolling standard deviation.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::IndicatorValue;

pub fn calculate_stddev(closes: &[f64], window: usize) -> Vec<IndicatorValue> {
    if window == 0 {
        return vec![IndicatorValue::Undefined; closes.len()];
    }

    (0..closes.len())
        .map(|i| {
            if i + 1 < window {
                IndicatorValue::Undefined
            } else {
                IndicatorValue::Defined(population_stddev(&closes[i + 1 - window..=i]))
            }
        })
        .collect()
}

pub(crate) fn population_stddev(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}
