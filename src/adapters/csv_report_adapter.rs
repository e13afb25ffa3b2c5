//! CSV report adapter implementing ReportPort.
//!
//! Writes the trade ledger to the output path and the equity curve next to
//! it as `<stem>_equity.csv`.

use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestResult;
use crate::domain::error::StratbenchError;
use crate::domain::strategy::StrategyConfig;
use crate::ports::report_port::ReportPort;
use tracing::info;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn equity_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{}_equity.csv", stem))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        config: &StrategyConfig,
        output_path: &Path,
    ) -> Result<(), StratbenchError> {
        let mut trades = csv::Writer::from_path(output_path)?;
        if result.trades.is_empty() {
            trades.write_record([
                "ticker",
                "entry_timestamp",
                "entry_price",
                "exit_timestamp",
                "exit_price",
                "quantity",
                "exit_reason",
                "realized_pnl",
                "commission",
                "bars_held",
            ])?;
        }
        for trade in &result.trades {
            trades.serialize(trade)?;
        }
        trades.flush()?;

        let equity_path = Self::equity_path(output_path);
        let mut equity = csv::Writer::from_path(&equity_path)?;
        if result.equity_curve.is_empty() {
            equity.write_record(["timestamp", "equity"])?;
        }
        for point in &result.equity_curve {
            equity.serialize(point)?;
        }
        equity.flush()?;

        info!(
            strategy = %config.name,
            trades = %output_path.display(),
            equity = %equity_path.display(),
            "Report written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{CompareOp, Condition, Operand, PriceField};
    use crate::domain::metrics::PerformanceReport;
    use crate::domain::portfolio::EquityPoint;
    use crate::domain::position::{ExitReason, Trade};
    use crate::domain::strategy::Rebalance;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn dt(day: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn config() -> StrategyConfig {
        let cond = Condition::Comparison {
            left: Operand::Price(PriceField::Close),
            op: CompareOp::Gt,
            right: Operand::Constant(0.0),
        };
        StrategyConfig::new(
            "Report Test",
            vec!["AAPL".into()],
            cond.clone(),
            cond,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn result(trades: Vec<Trade>, equity_curve: Vec<EquityPoint>) -> BacktestResult {
        let metrics =
            PerformanceReport::compute(&trades, &equity_curve, 1000.0, Rebalance::Daily, 0.0);
        BacktestResult {
            trades,
            equity_curve,
            metrics,
            ticker_results: Vec::new(),
            skipped: Vec::new(),
            rejected: Vec::new(),
            final_cash: 1000.0,
        }
    }

    #[test]
    fn equity_path_uses_stem() {
        assert_eq!(
            CsvReportAdapter::equity_path(Path::new("/tmp/out/run.csv")),
            PathBuf::from("/tmp/out/run_equity.csv")
        );
    }

    #[test]
    fn writes_trades_and_equity() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("trades.csv");
        let trade = Trade {
            ticker: "AAPL".into(),
            entry_timestamp: dt(2),
            entry_price: 100.0,
            exit_timestamp: dt(5),
            exit_price: 110.0,
            quantity: 5.0,
            exit_reason: ExitReason::TakeProfit,
            realized_pnl: 50.0,
            commission: 0.0,
            bars_held: 3,
        };
        let curve = vec![
            EquityPoint {
                timestamp: dt(2),
                equity: 1000.0,
            },
            EquityPoint {
                timestamp: dt(5),
                equity: 1050.0,
            },
        ];

        CsvReportAdapter::new()
            .write(&result(vec![trade], curve), &config(), &out)
            .unwrap();

        let trades = fs::read_to_string(&out).unwrap();
        let mut lines = trades.lines();
        assert!(lines.next().unwrap().starts_with("ticker,entry_timestamp"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("AAPL,"));
        assert!(row.contains("take_profit"));

        let equity = fs::read_to_string(dir.path().join("trades_equity.csv")).unwrap();
        assert_eq!(equity.lines().count(), 3);
        assert_eq!(equity.lines().next().unwrap(), "timestamp,equity");
    }

    #[test]
    fn empty_ledger_still_has_headers() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("empty.csv");

        CsvReportAdapter::new()
            .write(&result(Vec::new(), Vec::new()), &config(), &out)
            .unwrap();

        let trades = fs::read_to_string(&out).unwrap();
        assert_eq!(trades.lines().count(), 1);
        let equity = fs::read_to_string(dir.path().join("empty_equity.csv")).unwrap();
        assert_eq!(equity.trim(), "timestamp,equity");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let out = Path::new("/nonexistent/stratbench/out.csv");
        assert!(
            CsvReportAdapter::new()
                .write(&result(Vec::new(), Vec::new()), &config(), out)
                .is_err()
        );
    }
}
