//! Backtest engine and event loop.
//!
//! [`run_backtest`] validates the strategy, prepares every ticker's series and
//! indicator frame, then steps a [`SimulationContext`] through the unified
//! timeline. At each timestamp, tickers are visited in ascending order:
//!
//! 1. exits: stop-loss / take-profit on the bar's range, then the sell
//!    condition, then the forced close on the ticker's final bar;
//! 2. sizing equity is re-snapshotted at the first timestamp of each
//!    rebalance period;
//! 3. entries for flat tickers whose buy condition is `True`, skipping any
//!    ticker that closed a position at `t`;
//! 4. the equity curve is marked at the latest closes.
//!
//! A position opened at `t` is not risk-checked before `t + 1`.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::condition_eval::{evaluate, Evaluation};
use super::config_validation::validate_strategy;
use super::error::{DataError, InsufficientCapitalError, StratbenchError};
use super::execution::{enter_long, exit_position, EntryRequest};
use super::indicator::{compute_frame, IndicatorSpec};
use super::metrics::{ticker_breakdown, PerformanceReport, TickerResult};
use super::ohlcv::{Bar, PriceSeries};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Trade};
use super::strategy::StrategyConfig;
use super::ticker_data::{build_unified_timeline, TickerData};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Buy and sell were both `True` on a flat ticker.
    ConflictingSignals,
    /// Buy fired on the ticker's last bar, which leaves no bar to exit on.
    FinalBar,
    InsufficientCapital(InsufficientCapitalError),
}

/// A buy signal that did not open a position.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSignal {
    pub ticker: String,
    pub timestamp: NaiveDateTime,
    pub reason: SkipReason,
}

/// A ticker excluded from the run because its data was unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTicker {
    pub ticker: String,
    pub error: DataError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceReport,
    pub ticker_results: Vec<TickerResult>,
    pub skipped: Vec<SkippedSignal>,
    pub rejected: Vec<RejectedTicker>,
    pub final_cash: f64,
}

/// Run one strategy over `data` (bars keyed by ticker).
///
/// Bars outside the configured date range are ignored. A ticker whose bars
/// are missing or invalid is listed in `rejected` and the rest still run;
/// the run fails only when every ticker is rejected or the strategy itself
/// is malformed.
pub fn run_backtest(
    data: &HashMap<String, Vec<Bar>>,
    config: &StrategyConfig,
) -> Result<BacktestResult, StratbenchError> {
    let specs = validate_strategy(config)?;
    let (tickers, rejected) = prepare_tickers(data, config, &specs)?;

    if tickers.is_empty() {
        return Err(StratbenchError::NoUsableData {
            rejected: rejected.len(),
        });
    }

    let timeline = build_unified_timeline(&tickers);
    info!(
        strategy = %config.name,
        tickers = tickers.len(),
        rejected = rejected.len(),
        bars = timeline.len(),
        "Starting backtest"
    );

    let mut ctx = SimulationContext::new(config, &tickers);
    for timestamp in timeline {
        ctx.step(timestamp);
    }
    let result = ctx.finish(rejected);

    info!(
        strategy = %config.name,
        trades = result.trades.len(),
        skipped = result.skipped.len(),
        final_equity = result.metrics.final_equity,
        "Backtest finished"
    );
    Ok(result)
}

/// Run several strategies over the same data, one scoped thread each.
/// Results are returned in `configs` order.
pub fn run_sweep(
    data: &HashMap<String, Vec<Bar>>,
    configs: &[StrategyConfig],
) -> Vec<Result<BacktestResult, StratbenchError>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = configs
            .iter()
            .map(|config| scope.spawn(move || run_backtest(data, config)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

/// Build [`TickerData`] for every configured ticker, sorted by ticker.
///
/// Data problems reject the ticker; an indicator window longer than the
/// series is a configuration error and aborts the run.
fn prepare_tickers(
    data: &HashMap<String, Vec<Bar>>,
    config: &StrategyConfig,
    specs: &[IndicatorSpec],
) -> Result<(Vec<TickerData>, Vec<RejectedTicker>), StratbenchError> {
    let mut names: Vec<&String> = config.tickers.iter().collect();
    names.sort();

    let mut tickers = Vec::with_capacity(names.len());
    let mut rejected = Vec::new();

    for name in names {
        let bars: Vec<Bar> = data
            .get(name)
            .map(|bars| {
                bars.iter()
                    .filter(|b| {
                        let date = b.date();
                        date >= config.start_date && date <= config.end_date
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let series = match PriceSeries::new(name.as_str(), bars) {
            Ok(series) => series,
            Err(error) => {
                warn!(ticker = %name, %error, "Rejecting ticker");
                rejected.push(RejectedTicker {
                    ticker: name.clone(),
                    error,
                });
                continue;
            }
        };

        let frame = compute_frame(&series, specs)?;
        tickers.push(TickerData::new(series, frame));
    }

    Ok((tickers, rejected))
}

/// Mutable state of a single run. Owns the portfolio; borrows the inputs.
pub struct SimulationContext<'a> {
    config: &'a StrategyConfig,
    tickers: &'a [TickerData],
    portfolio: Portfolio,
    last_close: BTreeMap<String, f64>,
    sizing_equity: f64,
    current_period: Option<(i32, u32)>,
    skipped: Vec<SkippedSignal>,
}

impl<'a> SimulationContext<'a> {
    /// `tickers` must be sorted by ticker.
    pub fn new(config: &'a StrategyConfig, tickers: &'a [TickerData]) -> Self {
        SimulationContext {
            config,
            tickers,
            portfolio: Portfolio::new(config.capital),
            last_close: BTreeMap::new(),
            sizing_equity: config.capital,
            current_period: None,
            skipped: Vec::new(),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Process every ticker that has a bar at `timestamp`.
    pub fn step(&mut self, timestamp: NaiveDateTime) {
        let tickers = self.tickers;
        let active: Vec<(&TickerData, usize, &Bar)> = tickers
            .iter()
            .filter_map(|td| {
                let index = td.get_bar_index(timestamp)?;
                Some((td, index, &td.series.bars()[index]))
            })
            .collect();

        let mut exited = Vec::new();
        for &(td, index, bar) in &active {
            if self.process_exits(td, index, bar) {
                exited.push(td.ticker());
            }
        }
        let eligible: Vec<_> = active
            .iter()
            .copied()
            .filter(|(td, _, _)| !exited.contains(&td.ticker()))
            .collect();

        for &(td, _, bar) in &active {
            self.last_close.insert(td.ticker().to_string(), bar.close);
        }

        let period = self.config.rebalance.period_key(timestamp);
        if self.current_period != Some(period) {
            self.current_period = Some(period);
            self.sizing_equity = self.portfolio.total_equity(&self.last_close);
        }

        self.process_entries(&eligible, timestamp);

        let equity = self.portfolio.total_equity(&self.last_close);
        self.portfolio.record_equity(timestamp, equity);
    }

    /// Returns true when a position was closed.
    fn process_exits(&mut self, td: &TickerData, index: usize, bar: &Bar) -> bool {
        let Some(open) = self.portfolio.get_position(td.ticker()) else {
            return false;
        };

        let exit = if let Some((reason, price)) = open.risk_exit(bar) {
            Some((reason, price))
        } else if self.evaluate_sell(td, index, bar).is_true() {
            Some((ExitReason::Signal, bar.close))
        } else if td.is_final_bar(index) {
            Some((ExitReason::EndOfPeriod, bar.close))
        } else {
            None
        };

        let Some((reason, price)) = exit else {
            return false;
        };
        let Some(trade) = exit_position(
            &mut self.portfolio,
            td.ticker(),
            price,
            bar.timestamp,
            index,
            reason,
            &self.config.execution,
        ) else {
            return false;
        };
        debug!(
            ticker = %trade.ticker,
            timestamp = %trade.exit_timestamp,
            price = trade.exit_price,
            quantity = trade.quantity,
            reason = %trade.exit_reason,
            pnl = trade.realized_pnl,
            "Closed position"
        );
        true
    }

    fn process_entries(&mut self, active: &[(&TickerData, usize, &Bar)], timestamp: NaiveDateTime) {
        let mut candidates = Vec::new();
        for &(td, index, bar) in active {
            if self.portfolio.has_position(td.ticker()) {
                continue;
            }
            let buy = evaluate(&self.config.buy_condition, bar, &td.frame, index);
            if !buy.is_true() {
                continue;
            }
            if self.evaluate_sell(td, index, bar).is_true() {
                self.skip(td.ticker(), timestamp, SkipReason::ConflictingSignals);
            } else if td.is_final_bar(index) {
                self.skip(td.ticker(), timestamp, SkipReason::FinalBar);
            } else {
                candidates.push((td, index, bar));
            }
        }

        let sizing = self.config.position_sizing;
        let budget = sizing.budget(self.sizing_equity, candidates.len());
        for (td, index, bar) in candidates {
            let request = EntryRequest {
                ticker: td.ticker(),
                market_price: bar.close,
                timestamp,
                bar_index: index,
                budget,
            };
            match enter_long(
                &mut self.portfolio,
                &request,
                sizing.lot_size,
                &self.config.risk,
                &self.config.execution,
            ) {
                Ok(fill) => debug!(
                    ticker = %td.ticker(),
                    timestamp = %timestamp,
                    price = fill.execution_price,
                    quantity = fill.quantity,
                    "Opened position"
                ),
                Err(error) => {
                    self.skip(td.ticker(), timestamp, SkipReason::InsufficientCapital(error))
                }
            }
        }
    }

    fn evaluate_sell(&self, td: &TickerData, index: usize, bar: &Bar) -> Evaluation {
        evaluate(&self.config.sell_condition, bar, &td.frame, index)
    }

    fn skip(&mut self, ticker: &str, timestamp: NaiveDateTime, reason: SkipReason) {
        match &reason {
            SkipReason::InsufficientCapital(error) => {
                warn!(%ticker, %timestamp, %error, "Skipped entry: insufficient capital")
            }
            other => warn!(%ticker, %timestamp, reason = ?other, "Skipped entry"),
        }
        self.skipped.push(SkippedSignal {
            ticker: ticker.to_string(),
            timestamp,
            reason,
        });
    }

    pub fn finish(self, rejected: Vec<RejectedTicker>) -> BacktestResult {
        let Portfolio {
            cash,
            trades,
            equity_curve,
            ..
        } = self.portfolio;
        let metrics = PerformanceReport::compute(
            &trades,
            &equity_curve,
            self.config.capital,
            self.config.rebalance,
            self.config.risk_free_rate,
        );
        let ticker_results = ticker_breakdown(&trades);
        BacktestResult {
            trades,
            equity_curve,
            metrics,
            ticker_results,
            skipped: self.skipped,
            rejected,
            final_cash: cash,
        }
    }
}
