//! OHLCV bars and validated per-ticker price series.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use super::error::DataError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A raw price column of a [`Bar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open" => Some(PriceField::Open),
            "high" => Some(PriceField::High),
            "low" => Some(PriceField::Low),
            "close" => Some(PriceField::Close),
            "volume" => Some(PriceField::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        };
        f.write_str(name)
    }
}

impl Bar {
    pub fn field(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Bars for one ticker, strictly ordered by timestamp.
///
/// Only constructible through [`PriceSeries::new`], so holding one is proof
/// that the ordering and price checks passed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, DataError> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(DataError::Empty { ticker });
        }

        let mut previous: Option<NaiveDateTime> = None;
        for bar in &bars {
            if let Some(prev) = previous {
                if bar.timestamp == prev {
                    return Err(DataError::Duplicate {
                        ticker,
                        timestamp: bar.timestamp,
                    });
                }
                if bar.timestamp < prev {
                    return Err(DataError::NonMonotonic {
                        ticker,
                        timestamp: bar.timestamp,
                        previous: prev,
                    });
                }
            }
            check_prices(&ticker, bar)?;
            previous = Some(bar.timestamp);
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

fn check_prices(ticker: &str, bar: &Bar) -> Result<(), DataError> {
    let invalid = |field: &'static str, value: f64| DataError::InvalidPrice {
        ticker: ticker.to_string(),
        timestamp: bar.timestamp,
        field,
        value,
    };

    for (field, value) in [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(field, value));
        }
    }
    if !bar.volume.is_finite() || bar.volume < 0.0 {
        return Err(invalid("volume", bar.volume));
    }
    if bar.high < bar.low {
        return Err(invalid("high", bar.high));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar(timestamp: NaiveDateTime, close: f64) -> Bar {
        Bar {
            timestamp,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn accepts_ordered_bars_with_gaps() {
        let series =
            PriceSeries::new("AAPL", vec![bar(ts(2, 0), 10.0), bar(ts(5, 0), 11.0)]).unwrap();
        assert_eq!(series.ticker(), "AAPL");
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn accepts_intraday_bars_on_same_day() {
        let series =
            PriceSeries::new("AAPL", vec![bar(ts(2, 9), 10.0), bar(ts(2, 10), 11.0)]).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(
            PriceSeries::new("AAPL", vec![]),
            Err(DataError::Empty {
                ticker: "AAPL".into()
            })
        );
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let err = PriceSeries::new("AAPL", vec![bar(ts(2, 0), 10.0), bar(ts(2, 0), 11.0)])
            .unwrap_err();
        assert!(matches!(err, DataError::Duplicate { .. }));
    }

    #[test]
    fn rejects_out_of_order() {
        let err = PriceSeries::new("AAPL", vec![bar(ts(3, 0), 10.0), bar(ts(2, 0), 11.0)])
            .unwrap_err();
        match err {
            DataError::NonMonotonic {
                ticker,
                timestamp,
                previous,
            } => {
                assert_eq!(ticker, "AAPL");
                assert_eq!(timestamp, ts(2, 0));
                assert_eq!(previous, ts(3, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_close() {
        let mut b = bar(ts(2, 0), 10.0);
        b.close = 0.0;
        let err = PriceSeries::new("AAPL", vec![b]).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidPrice { field: "close", .. }
        ));
    }

    #[test]
    fn rejects_nan_open() {
        let mut b = bar(ts(2, 0), 10.0);
        b.open = f64::NAN;
        assert!(PriceSeries::new("AAPL", vec![b]).is_err());
    }

    #[test]
    fn rejects_high_below_low() {
        let mut b = bar(ts(2, 0), 10.0);
        b.high = 8.0;
        b.low = 9.0;
        let err = PriceSeries::new("AAPL", vec![b]).unwrap_err();
        assert!(matches!(err, DataError::InvalidPrice { field: "high", .. }));
    }

    #[test]
    fn price_field_lookup() {
        let b = Bar {
            timestamp: ts(2, 0),
            open: 1.0,
            high: 4.0,
            low: 0.5,
            close: 3.0,
            volume: 7.0,
        };
        assert_eq!(b.field(PriceField::Open), 1.0);
        assert_eq!(b.field(PriceField::High), 4.0);
        assert_eq!(b.field(PriceField::Low), 0.5);
        assert_eq!(b.field(PriceField::Close), 3.0);
        assert_eq!(b.field(PriceField::Volume), 7.0);
        assert_eq!(PriceField::from_name("close"), Some(PriceField::Close));
        assert_eq!(PriceField::from_name("vwap"), None);
        assert_eq!(PriceField::High.to_string(), "high");
    }
}
