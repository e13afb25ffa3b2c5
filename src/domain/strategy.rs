//! Strategy configuration and composition.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::condition::Condition;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorKind, IndicatorSpec};

pub const DEFAULT_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.05;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.15;
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_BOLLINGER_WINDOW: usize = 20;
pub const DEFAULT_BOLLINGER_K: f64 = 2.0;

/// How often position sizing is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rebalance {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Rebalance {
    /// Annualization factor for periodic returns.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Rebalance::Daily => 252.0,
            Rebalance::Weekly => 52.0,
            Rebalance::Monthly => 12.0,
        }
    }

    /// Identifies the cadence period containing `timestamp`. Two timestamps
    /// share a period iff their keys are equal.
    pub fn period_key(self, timestamp: NaiveDateTime) -> (i32, u32) {
        let date = timestamp.date();
        match self {
            Rebalance::Daily => (date.year(), date.ordinal()),
            Rebalance::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Rebalance::Monthly => (date.year(), date.month()),
        }
    }
}

impl fmt::Display for Rebalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rebalance::Daily => "daily",
            Rebalance::Weekly => "weekly",
            Rebalance::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

impl FromStr for Rebalance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Rebalance::Daily),
            "weekly" => Ok(Rebalance::Weekly),
            "monthly" => Ok(Rebalance::Monthly),
            other => Err(format!(
                "unknown cadence '{}' (expected daily, weekly or monthly)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingMethod {
    /// Split sizing equity equally across every ticker entering on the same bar.
    EqualWeight,
    /// Commit a fixed fraction of sizing equity to each entry.
    FixedFraction(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizing {
    pub method: SizingMethod,
    /// Quantities are floored to a multiple of this.
    pub lot_size: f64,
}

impl Default for PositionSizing {
    fn default() -> Self {
        PositionSizing {
            method: SizingMethod::EqualWeight,
            lot_size: 1.0,
        }
    }
}

impl PositionSizing {
    /// Cash budget for one entry given the number of entries on this bar.
    pub fn budget(&self, sizing_equity: f64, candidates: usize) -> f64 {
        match self.method {
            SizingMethod::EqualWeight => sizing_equity / candidates.max(1) as f64,
            SizingMethod::FixedFraction(fraction) => sizing_equity * fraction,
        }
    }
}

/// Stop-loss / take-profit distances as fractions of the entry price.
/// Zero disables the corresponding exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskManagement {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl RiskManagement {
    pub fn none() -> Self {
        RiskManagement {
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
        }
    }

    pub fn stop_price(&self, entry_price: f64) -> Option<f64> {
        (self.stop_loss_pct > 0.0).then(|| entry_price * (1.0 - self.stop_loss_pct))
    }

    pub fn target_price(&self, entry_price: f64) -> Option<f64> {
        (self.take_profit_pct > 0.0).then(|| entry_price * (1.0 + self.take_profit_pct))
    }
}

impl Default for RiskManagement {
    fn default() -> Self {
        RiskManagement {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub description: String,
    pub tickers: Vec<String>,
    /// Explicit indicator specs. Built-in defaults fill in any name not listed here.
    pub indicators: Vec<IndicatorSpec>,
    pub buy_condition: Condition,
    pub sell_condition: Condition,
    pub capital: f64,
    pub rebalance: Rebalance,
    pub position_sizing: PositionSizing,
    pub risk: RiskManagement,
    pub execution: ExecutionConfig,
    /// Inclusive date range.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
    pub risk_free_rate: f64,
}

impl StrategyConfig {
    pub fn new(
        name: impl Into<String>,
        tickers: Vec<String>,
        buy_condition: Condition,
        sell_condition: Condition,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        StrategyConfig {
            name: name.into(),
            description: String::new(),
            tickers,
            indicators: Vec::new(),
            buy_condition,
            sell_condition,
            capital: DEFAULT_CAPITAL,
            rebalance: Rebalance::default(),
            position_sizing: PositionSizing::default(),
            risk: RiskManagement::default(),
            execution: ExecutionConfig::default(),
            start_date,
            end_date,
            short_window: None,
            long_window: None,
            risk_free_rate: 0.0,
        }
    }

    /// Explicit specs followed by every built-in default whose name and
    /// outputs do not clash with an explicit spec.
    ///
    /// Built-ins: `short_ma`/`long_ma` (when the windows are set), `rsi`,
    /// `macd` and `bb`.
    pub fn resolved_indicators(&self) -> Vec<IndicatorSpec> {
        let mut specs = self.indicators.clone();
        let mut defaults = Vec::new();
        if let Some(window) = self.short_window {
            defaults.push(IndicatorSpec::new("short_ma", IndicatorKind::Sma { window }));
        }
        if let Some(window) = self.long_window {
            defaults.push(IndicatorSpec::new("long_ma", IndicatorKind::Sma { window }));
        }
        defaults.push(IndicatorSpec::new(
            "rsi",
            IndicatorKind::Rsi {
                period: DEFAULT_RSI_PERIOD,
            },
        ));
        defaults.push(IndicatorSpec::new(
            "macd",
            IndicatorKind::Macd {
                fast: DEFAULT_FAST,
                slow: DEFAULT_SLOW,
                signal: DEFAULT_SIGNAL,
            },
        ));
        defaults.push(IndicatorSpec::new(
            "bb",
            IndicatorKind::Bollinger {
                window: DEFAULT_BOLLINGER_WINDOW,
                k: DEFAULT_BOLLINGER_K,
            },
        ));

        let taken: HashSet<String> = self
            .indicators
            .iter()
            .flat_map(|s| std::iter::once(s.name.clone()).chain(s.output_names()))
            .collect();
        for default in defaults {
            let clashes = taken.contains(&default.name)
                || default.output_names().iter().any(|n| taken.contains(n));
            if !clashes {
                specs.push(default);
            }
        }
        specs
    }
}
