#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use stratbench::domain::condition::Condition;
use stratbench::domain::condition_parser;
use stratbench::domain::error::StratbenchError;
pub use stratbench::domain::ohlcv::Bar;
use stratbench::domain::strategy::{RiskManagement, StrategyConfig};
use stratbench::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, StratbenchError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(StratbenchError::DataSource {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() >= start_date && b.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, StratbenchError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(offset: i64) -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap() + Duration::days(offset)
}

/// Bar with a flat range around `close`.
pub fn make_bar(offset: i64, close: f64) -> Bar {
    Bar {
        timestamp: day(offset),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000.0,
    }
}

pub fn make_ohlc(offset: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: day(offset),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// One bar per consecutive day starting 2024-01-01.
pub fn generate_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect()
}

pub fn cond(text: &str) -> Condition {
    condition_parser::parse(text).unwrap()
}

/// Strategy over 2024 with risk exits disabled.
pub fn make_config(tickers: &[&str], buy: &str, sell: &str) -> StrategyConfig {
    let mut config = StrategyConfig::new(
        "test",
        tickers.iter().map(|t| t.to_string()).collect(),
        cond(buy),
        cond(sell),
        date(2024, 1, 1),
        date(2024, 12, 31),
    );
    config.risk = RiskManagement::none();
    config
}

pub fn data(entries: Vec<(&str, Vec<Bar>)>) -> HashMap<String, Vec<Bar>> {
    entries
        .into_iter()
        .map(|(t, bars)| (t.to_string(), bars))
        .collect()
}
