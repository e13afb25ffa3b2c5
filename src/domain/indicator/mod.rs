//! Technical indicator implementations.
//!
//! This module provides the types shared by every indicator:
//! - `IndicatorValue`: a tri-state sample, either `Defined(x)` or `Undefined`
//!   during warm-up
//! - `IndicatorKind`: indicator identity + parameters, parsed from `SMA(20)` style text
//! - `IndicatorSpec`: a named kind; names the output columns it produces
//! - `IndicatorFrame`: output columns for one ticker, aligned 1:1 with its bars
//!
//! All calculations are causal: the value at bar `i` reads closes `0..=i` only.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{calculate_bollinger, BollingerOutput};
pub use ema::{calculate_ema, ema_of};
pub use macd::{calculate_macd, MacdOutput};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;

use crate::domain::error::ConfigError;
use crate::domain::ohlcv::PriceSeries;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Defined(f64),
    Undefined,
}

impl IndicatorValue {
    pub fn value(self) -> Option<f64> {
        match self {
            IndicatorValue::Defined(v) => Some(v),
            IndicatorValue::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, IndicatorValue::Defined(_))
    }
}

impl From<Option<f64>> for IndicatorValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => IndicatorValue::Defined(v),
            None => IndicatorValue::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorKind {
    Sma { window: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { window: usize, k: f64 },
}

impl IndicatorKind {
    /// Every window-like parameter, by name.
    pub fn windows(&self) -> Vec<(&'static str, usize)> {
        match *self {
            IndicatorKind::Sma { window } => vec![("window", window)],
            IndicatorKind::Ema { period } | IndicatorKind::Rsi { period } => {
                vec![("period", period)]
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                vec![("fast", fast), ("slow", slow), ("signal", signal)]
            }
            IndicatorKind::Bollinger { window, .. } => vec![("window", window)],
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma { window } => write!(f, "SMA({})", window),
            IndicatorKind::Ema { period } => write!(f, "EMA({})", period),
            IndicatorKind::Rsi { period } => write!(f, "RSI({})", period),
            IndicatorKind::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorKind::Bollinger { window, k } => write!(f, "BOLLINGER({},{})", window, k),
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let open = s
            .find('(')
            .ok_or_else(|| "expected KIND(args)".to_string())?;
        if !s.ends_with(')') {
            return Err("missing closing ')'".to_string());
        }
        let kind = s[..open].trim().to_ascii_uppercase();
        let args: Vec<&str> = s[open + 1..s.len() - 1].split(',').map(str::trim).collect();

        let int = |i: usize| -> Result<usize, String> {
            args[i]
                .parse::<usize>()
                .map_err(|_| format!("argument {} ('{}') is not a whole number", i + 1, args[i]))
        };

        match (kind.as_str(), args.len()) {
            ("SMA", 1) => Ok(IndicatorKind::Sma { window: int(0)? }),
            ("EMA", 1) => Ok(IndicatorKind::Ema { period: int(0)? }),
            ("RSI", 1) => Ok(IndicatorKind::Rsi { period: int(0)? }),
            ("MACD", 3) => Ok(IndicatorKind::Macd {
                fast: int(0)?,
                slow: int(1)?,
                signal: int(2)?,
            }),
            ("BOLLINGER" | "BB", 2) => {
                let k = args[1]
                    .parse::<f64>()
                    .map_err(|_| format!("argument 2 ('{}') is not a number", args[1]))?;
                Ok(IndicatorKind::Bollinger {
                    window: int(0)?,
                    k,
                })
            }
            (kind, n) => Err(format!("unknown indicator {} with {} argument(s)", kind, n)),
        }
    }
}

/// A named indicator. Multi-output kinds derive their column names from `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub kind: IndicatorKind,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>, kind: IndicatorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn output_names(&self) -> Vec<String> {
        let name = &self.name;
        match self.kind {
            IndicatorKind::Macd { .. } => vec![
                name.clone(),
                format!("{name}_signal"),
                format!("{name}_histogram"),
            ],
            IndicatorKind::Bollinger { .. } => vec![
                format!("{name}_upper"),
                format!("{name}_middle"),
                format!("{name}_lower"),
            ],
            _ => vec![name.clone()],
        }
    }

    /// Parameter checks that do not depend on the price data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, value) in self.kind.windows() {
            if value == 0 {
                return Err(ConfigError::NonPositiveWindow {
                    indicator: self.name.clone(),
                    parameter,
                });
            }
        }
        match self.kind {
            IndicatorKind::Macd { fast, slow, .. } if fast >= slow => {
                Err(ConfigError::WindowOrder {
                    context: format!("indicator '{}'", self.name),
                    short: fast,
                    long: slow,
                })
            }
            IndicatorKind::Bollinger { k, .. } if !k.is_finite() || k <= 0.0 => {
                Err(ConfigError::OutOfRange {
                    field: format!("indicator '{}' k", self.name),
                    expected: "a positive number",
                    value: k,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Indicator output columns for a single ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    columns: HashMap<String, Vec<IndicatorValue>>,
}

impl IndicatorFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<IndicatorValue>) {
        self.columns.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[IndicatorValue]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// `None` when the column does not exist or `index` is past its end.
    pub fn value(&self, name: &str, index: usize) -> Option<IndicatorValue> {
        self.columns.get(name).and_then(|c| c.get(index)).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Compute every spec over `series`, one column per output name.
pub fn compute_frame(
    series: &PriceSeries,
    specs: &[IndicatorSpec],
) -> Result<IndicatorFrame, ConfigError> {
    let closes = series.closes();
    let mut frame = IndicatorFrame::new();

    for spec in specs {
        spec.validate()?;
        for (_, window) in spec.kind.windows() {
            if window > closes.len() {
                return Err(ConfigError::WindowExceedsSeries {
                    ticker: series.ticker().to_string(),
                    indicator: spec.name.clone(),
                    window,
                    bars: closes.len(),
                });
            }
        }

        match spec.kind {
            IndicatorKind::Sma { window } => {
                frame.insert(spec.name.clone(), calculate_sma(&closes, window));
            }
            IndicatorKind::Ema { period } => {
                frame.insert(spec.name.clone(), calculate_ema(&closes, period));
            }
            IndicatorKind::Rsi { period } => {
                frame.insert(spec.name.clone(), calculate_rsi(&closes, period));
            }
            IndicatorKind::Macd { fast, slow, signal } => {
                let out = calculate_macd(&closes, fast, slow, signal);
                let [line, sig, hist] = output_triple(spec);
                frame.insert(line, out.line);
                frame.insert(sig, out.signal);
                frame.insert(hist, out.histogram);
            }
            IndicatorKind::Bollinger { window, k } => {
                let out = calculate_bollinger(&closes, window, k);
                let [upper, middle, lower] = output_triple(spec);
                frame.insert(upper, out.upper);
                frame.insert(middle, out.middle);
                frame.insert(lower, out.lower);
            }
        }
    }

    Ok(frame)
}

fn output_triple(spec: &IndicatorSpec) -> [String; 3] {
    let mut names = spec.output_names().into_iter();
    [
        names.next().unwrap_or_default(),
        names.next().unwrap_or_default(),
        names.next().unwrap_or_default(),
    ]
}
