//! Domain error types.
//!
//! Three classes of failure reach the engine's callers:
//! - [`ConfigError`]: the strategy itself is malformed. Fatal, reported before
//!   any bar is simulated.
//! - [`DataError`]: a ticker's price series is unusable. Fatal for that ticker
//!   only; the remaining tickers are still simulated.
//! - [`InsufficientCapitalError`]: an entry could not be funded. Never fatal;
//!   the engine records it as a skipped signal.

use chrono::{NaiveDate, NaiveDateTime};

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    ///
    /// `position` is a byte offset; the caret is placed by character column.
    pub fn display_with_context(&self, input: &str) -> String {
        let column = input
            .get(..self.position)
            .map_or(self.position, |prefix| prefix.chars().count());
        let caret = " ".repeat(column) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("indicator '{indicator}': {parameter} must be greater than zero")]
    NonPositiveWindow {
        indicator: String,
        parameter: &'static str,
    },

    #[error("indicator '{indicator}' on {ticker}: window {window} exceeds series length {bars}")]
    WindowExceedsSeries {
        ticker: String,
        indicator: String,
        window: usize,
        bars: usize,
    },

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: String,
        expected: &'static str,
        value: f64,
    },

    #[error("{condition} references unknown indicator '{name}'")]
    UnknownIndicator { condition: String, name: String },

    #[error("{context}: short window {short} must be less than long window {long}")]
    WindowOrder {
        context: String,
        short: usize,
        long: usize,
    },

    #[error("failed to parse {condition}: {source}")]
    Condition {
        condition: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid indicator spec '{spec}': {reason}")]
    InvalidIndicator { spec: String, reason: String },

    #[error("indicator output '{0}' is defined more than once")]
    DuplicateOutput(String),

    #[error("no tickers configured")]
    NoTickers,

    #[error("ticker '{0}' is listed more than once")]
    DuplicateTicker(String),

    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("{ticker}: no bars in range")]
    Empty { ticker: String },

    #[error("{ticker}: duplicate bar at {timestamp}")]
    Duplicate {
        ticker: String,
        timestamp: NaiveDateTime,
    },

    #[error("{ticker}: bar at {timestamp} follows later bar at {previous}")]
    NonMonotonic {
        ticker: String,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("{ticker}: invalid {field} {value} at {timestamp}")]
    InvalidPrice {
        ticker: String,
        timestamp: NaiveDateTime,
        field: &'static str,
        value: f64,
    },
}

impl DataError {
    pub fn ticker(&self) -> &str {
        match self {
            DataError::Empty { ticker }
            | DataError::Duplicate { ticker, .. }
            | DataError::NonMonotonic { ticker, .. }
            | DataError::InvalidPrice { ticker, .. } => ticker,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{ticker} at {timestamp}: entry needs {required:.2}, cash is {available:.2}")]
pub struct InsufficientCapitalError {
    pub ticker: String,
    pub timestamp: NaiveDateTime,
    pub required: f64,
    pub available: f64,
}

/// Top-level error type for stratbench.
#[derive(Debug, thiserror::Error)]
pub enum StratbenchError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("failed to load {ticker}: {reason}")]
    DataSource { ticker: String, reason: String },

    #[error("no usable price data: all {rejected} tickers were rejected")]
    NoUsableData { rejected: usize },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratbenchError> for std::process::ExitCode {
    fn from(err: &StratbenchError) -> Self {
        let code: u8 = match err {
            StratbenchError::Io(_) | StratbenchError::Csv(_) => 1,
            StratbenchError::ConfigParse { .. }
            | StratbenchError::ConfigMissing { .. }
            | StratbenchError::ConfigInvalid { .. } => 2,
            StratbenchError::DataSource { .. } => 3,
            StratbenchError::Config(_) => 4,
            StratbenchError::Data(_) | StratbenchError::NoUsableData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
