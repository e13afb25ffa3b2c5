//! Shared cash pool, per-ticker positions, trade ledger and equity curve.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::position::{OpenPosition, Position, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Keyed by ticker; sorted so iteration order is deterministic.
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn open_position(&mut self, ticker: &str, position: OpenPosition) {
        self.positions
            .insert(ticker.to_string(), Position::Open(position));
    }

    pub fn get_position(&self, ticker: &str) -> Option<&OpenPosition> {
        self.positions.get(ticker).and_then(Position::as_open)
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.get_position(ticker).is_some()
    }

    /// Transition `ticker` to `Flat`, returning what was open.
    pub fn close_position(&mut self, ticker: &str) -> Option<OpenPosition> {
        self.positions.get_mut(ticker).and_then(Position::close)
    }

    pub fn position_count(&self) -> usize {
        self.positions.values().filter(|p| p.is_open()).count()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Cash plus every open position marked at its ticker's price in `prices`.
    /// A position with no price contributes nothing.
    pub fn total_equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .filter_map(|(ticker, position)| {
                let open = position.as_open()?;
                prices.get(ticker).map(|&price| open.market_value(price))
            })
            .sum();
        self.cash + position_value
    }
}
