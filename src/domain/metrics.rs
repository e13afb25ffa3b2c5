//! Performance metrics over a finished run.
//!
//! Ratios that cannot be computed (no trades, fewer than two periodic
//! returns, zero variance, zero elapsed time) are `None` rather than a
//! sentinel number.

use std::collections::BTreeMap;

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::Trade;
use super::strategy::Rebalance;

const DAYS_PER_YEAR: f64 = 365.25;
const SECONDS_PER_DAY: f64 = 86_400.0;
const VARIANCE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub max_drawdown: f64,
    /// Longest run of equity points spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub avg_win: Option<f64>,
    /// Magnitude of the average losing trade.
    pub avg_loss: Option<f64>,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_pnl: f64,
    pub total_commission: f64,
    pub avg_bars_held: Option<f64>,
}

impl PerformanceReport {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        rebalance: Rebalance,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let annualized_return = annualize(total_return, equity_curve);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let (sharpe_ratio, sortino_ratio) = if trades.is_empty() {
            (None, None)
        } else {
            let returns = periodic_returns(equity_curve, rebalance);
            compute_risk_adjusted(&returns, risk_free_rate, rebalance.periods_per_year())
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_bars = 0usize;
        let mut total_commission = 0.0_f64;

        for trade in trades {
            let pnl = trade.realized_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_bars += trade.bars_held;
            total_commission += trade.commission;
        }

        let total_trades = trades.len();
        let per_trade = |sum: f64, count: usize| (count > 0).then(|| sum / count as f64);

        PerformanceReport {
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: per_trade(trades_won as f64, total_trades),
            profit_factor: (total_losses > 0.0).then(|| total_wins / total_losses),
            avg_win: per_trade(total_wins, trades_won),
            avg_loss: per_trade(total_losses, trades_lost),
            largest_win,
            largest_loss,
            total_pnl: total_wins - total_losses,
            total_commission,
            avg_bars_held: per_trade(total_bars as f64, total_trades),
        }
    }
}

/// Per-ticker slice of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerResult {
    pub ticker: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

/// Group `trades` by ticker, sorted by ticker.
pub fn ticker_breakdown(trades: &[Trade]) -> Vec<TickerResult> {
    let mut by_ticker: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        by_ticker.entry(&trade.ticker).or_default().push(trade);
    }

    by_ticker
        .into_iter()
        .map(|(ticker, trades)| {
            let total_trades = trades.len();
            let winning_trades = trades.iter().filter(|t| t.realized_pnl > 0.0).count();
            let losing_trades = trades.iter().filter(|t| t.realized_pnl < 0.0).count();
            TickerResult {
                ticker: ticker.to_string(),
                total_trades,
                winning_trades,
                losing_trades,
                win_rate: winning_trades as f64 / total_trades as f64,
                total_pnl: trades.iter().map(|t| t.realized_pnl).sum(),
            }
        })
        .collect()
}

fn annualize(total_return: f64, equity_curve: &[EquityPoint]) -> Option<f64> {
    let (first, last) = (equity_curve.first()?, equity_curve.last()?);
    let elapsed = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
    let years = elapsed / DAYS_PER_YEAR;
    if years <= 0.0 || !total_return.is_finite() {
        return None;
    }
    Some((1.0 + total_return).max(0.0).powf(1.0 / years) - 1.0)
}

/// Returns between the last equity point of consecutive rebalance periods.
pub fn periodic_returns(equity_curve: &[EquityPoint], rebalance: Rebalance) -> Vec<f64> {
    let mut closes: Vec<f64> = Vec::new();
    let mut current_key = None;
    for point in equity_curve {
        let key = rebalance.period_key(point.timestamp);
        if current_key == Some(key) {
            if let Some(last) = closes.last_mut() {
                *last = point.equity;
            }
        } else {
            closes.push(point.equity);
            current_key = Some(key);
        }
    }

    closes
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(
    returns: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> (Option<f64>, Option<f64>) {
    if returns.len() < 2 {
        return (None, None);
    }

    let n = returns.len() as f64;
    let period_rf = risk_free_rate / periods_per_year;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let excess = mean - period_rf;
    let scale = periods_per_year.sqrt();

    // Rounding leaves residual variance on constant returns; treat it as zero.
    let noise_floor = (mean.abs().max(period_rf.abs()).max(1.0) * VARIANCE_TOLERANCE).powi(2);

    let sharpe = (variance > noise_floor).then(|| excess / variance.sqrt() * scale);

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum::<f64>()
        / n;
    let sortino =
        (downside_variance > noise_floor).then(|| excess / downside_variance.sqrt() * scale);

    (sharpe, sortino)
}
