//! Per-ticker position state and closed trades.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfPeriod,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfPeriod => "end_of_period",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub entry_timestamp: NaiveDateTime,
    /// Index of the entry bar in the ticker's own series.
    pub entry_index: usize,
    pub quantity: f64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
    pub entry_commission: f64,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// Stop-loss or take-profit hit within `bar`'s range, with the threshold
    /// price to exit at. The stop wins when both are touched.
    pub fn risk_exit(&self, bar: &Bar) -> Option<(ExitReason, f64)> {
        if let Some(stop) = self.stop_price {
            if bar.low <= stop {
                return Some((ExitReason::StopLoss, stop));
            }
        }
        if let Some(target) = self.target_price {
            if bar.high >= target {
                return Some((ExitReason::TakeProfit, target));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Position {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl Position {
    pub fn is_open(&self) -> bool {
        matches!(self, Position::Open(_))
    }

    pub fn as_open(&self) -> Option<&OpenPosition> {
        match self {
            Position::Open(open) => Some(open),
            Position::Flat => None,
        }
    }

    /// Move to `Flat`, returning the position that was open.
    pub fn close(&mut self) -> Option<OpenPosition> {
        match std::mem::take(self) {
            Position::Open(open) => Some(open),
            Position::Flat => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub ticker: String,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub quantity: f64,
    pub exit_reason: ExitReason,
    /// Net of entry and exit commission.
    pub realized_pnl: f64,
    pub commission: f64,
    pub bars_held: usize,
}

impl Trade {
    pub fn return_pct(&self) -> f64 {
        (self.exit_price - self.entry_price) / self.entry_price
    }
}
