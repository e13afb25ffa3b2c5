//! Price data access port trait.

use crate::domain::error::StratbenchError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `ticker` dated within `[start_date, end_date]`, in source
    /// order. Ordering is validated by the engine, not here.
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, StratbenchError>;

    fn list_tickers(&self) -> Result<Vec<String>, StratbenchError>;
}
