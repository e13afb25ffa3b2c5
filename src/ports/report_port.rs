//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::StratbenchError;
use crate::domain::strategy::StrategyConfig;
use std::path::Path;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        config: &StrategyConfig,
        output_path: &Path,
    ) -> Result<(), StratbenchError>;
}
