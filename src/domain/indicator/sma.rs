//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::IndicatorValue;

pub fn calculate_sma(closes: &[f64], window: usize) -> Vec<IndicatorValue> {
    if window == 0 {
        return vec![IndicatorValue::Undefined; closes.len()];
    }

    (0..closes.len())
        .map(|i| {
            if i + 1 < window {
                IndicatorValue::Undefined
            } else {
                let sum: f64 = closes[i + 1 - window..=i].iter().sum();
                IndicatorValue::Defined(sum / window as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined(v: IndicatorValue) -> f64 {
        v.value().expect("expected a defined value")
    }

    #[test]
    fn sma_warmup() {
        let values = calculate_sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert!(!values[0].is_defined());
        assert!(!values[1].is_defined());
        assert!(values[2].is_defined());
        assert!(values[3].is_defined());
        assert!(values[4].is_defined());
    }

    #[test]
    fn sma_values() {
        let values = calculate_sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);
        assert!((defined(values[2]) - 20.0).abs() < f64::EPSILON);
        assert!((defined(values[3]) - 30.0).abs() < f64::EPSILON);
        assert!((defined(values[4]) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_window_1_is_identity() {
        let closes = [3.0, 1.0, 4.0];
        let values = calculate_sma(&closes, 1);
        for (v, c) in values.iter().zip(closes) {
            assert_eq!(*v, IndicatorValue::Defined(c));
        }
    }

    #[test]
    fn sma_window_longer_than_series() {
        let values = calculate_sma(&[1.0, 2.0], 5);
        assert_eq!(values, vec![IndicatorValue::Undefined; 2]);
    }

    #[test]
    fn sma_window_0() {
        assert_eq!(
            calculate_sma(&[1.0, 2.0], 0),
            vec![IndicatorValue::Undefined; 2]
        );
    }

    #[test]
    fn sma_empty() {
        assert!(calculate_sma(&[], 3).is_empty());
    }
}
