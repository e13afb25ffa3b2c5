//! Ticker universe: parsing ticker lists and loading their bars.

use crate::domain::error::StratbenchError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Split a comma-separated ticker list, trimming and uppercasing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Bars fetched for a universe, plus the tickers whose fetch failed.
#[derive(Debug)]
pub struct LoadedUniverse {
    pub data: HashMap<String, Vec<Bar>>,
    pub failed: Vec<(String, StratbenchError)>,
}

/// Fetch every ticker through `data_port`.
///
/// A failed fetch is recorded and skipped; tickers that are absent from
/// `data` are later rejected by the engine. Fails only if no ticker loads.
pub fn load_universe(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<LoadedUniverse, StratbenchError> {
    let mut data = HashMap::new();
    let mut failed = Vec::new();

    for ticker in tickers {
        match data_port.fetch_bars(ticker, start_date, end_date) {
            Ok(bars) => {
                info!(%ticker, bars = bars.len(), "Loaded price data");
                data.insert(ticker.clone(), bars);
            }
            Err(error) => {
                warn!(%ticker, %error, "Skipping ticker");
                failed.push((ticker.clone(), error));
            }
        }
    }

    if data.is_empty() && !failed.is_empty() {
        return Err(failed.swap_remove(0).1);
    }

    Ok(LoadedUniverse { data, failed })
}
