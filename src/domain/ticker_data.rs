//! Per-ticker simulation input and the unified timeline.

use crate::domain::indicator::IndicatorFrame;
use crate::domain::ohlcv::{Bar, PriceSeries};
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};

/// A validated price series with its indicator frame and a timestamp index.
#[derive(Debug, Clone)]
pub struct TickerData {
    pub series: PriceSeries,
    pub frame: IndicatorFrame,
    timestamp_index: HashMap<NaiveDateTime, usize>,
}

impl TickerData {
    pub fn new(series: PriceSeries, frame: IndicatorFrame) -> Self {
        let timestamp_index = series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.timestamp, i))
            .collect();
        Self {
            series,
            frame,
            timestamp_index,
        }
    }

    pub fn ticker(&self) -> &str {
        self.series.ticker()
    }

    pub fn bar_count(&self) -> usize {
        self.series.len()
    }

    pub fn get_bar_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    pub fn get_bar(&self, timestamp: NaiveDateTime) -> Option<&Bar> {
        self.get_bar_index(timestamp)
            .map(|i| &self.series.bars()[i])
    }

    pub fn is_final_bar(&self, index: usize) -> bool {
        index + 1 == self.series.len()
    }
}

/// Sorted union of every ticker's timestamps.
pub fn build_unified_timeline(tickers: &[TickerData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = tickers
        .iter()
        .flat_map(|td| td.series.bars().iter().map(|bar| bar.timestamp))
        .collect();
    unique.into_iter().collect()
}
