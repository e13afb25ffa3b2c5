//! Fill simulation: slippage, commission, quantity sizing, entries and exits.
//!
//! All rates are fractions (`0.001` = 0.1%). Slippage always works against
//! the trader: entries fill above the market price, exits below it.

use chrono::NaiveDateTime;

use super::error::InsufficientCapitalError;
use super::portfolio::Portfolio;
use super::position::{ExitReason, OpenPosition, Trade};
use super::strategy::RiskManagement;

/// Trading cost parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Commission: flat fee + trade_value × pct.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + trade_value * config.commission_pct
}

pub fn apply_slippage_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct)
}

pub fn apply_slippage_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct)
}

/// Largest multiple of `lot_size` whose cost plus commission fits in `budget`.
pub fn size_quantity(
    budget: f64,
    execution_price: f64,
    lot_size: f64,
    config: &ExecutionConfig,
) -> f64 {
    let spendable = budget - config.commission_per_trade;
    if spendable <= 0.0 || execution_price <= 0.0 {
        return 0.0;
    }
    let unit_cost = execution_price * (1.0 + config.commission_pct);
    let lots = (spendable / unit_cost / lot_size).floor();
    lots.max(0.0) * lot_size
}

/// One ticker's entry on one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRequest<'a> {
    pub ticker: &'a str,
    pub market_price: f64,
    pub timestamp: NaiveDateTime,
    pub bar_index: usize,
    pub budget: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub quantity: f64,
    pub execution_price: f64,
    pub cost: f64,
    pub commission: f64,
}

/// Open a long position sized from `request.budget`.
///
/// Fails without touching the portfolio when the budget buys less than one
/// lot or the cost plus commission exceeds cash.
pub fn enter_long(
    portfolio: &mut Portfolio,
    request: &EntryRequest<'_>,
    lot_size: f64,
    risk: &RiskManagement,
    config: &ExecutionConfig,
) -> Result<EntryFill, InsufficientCapitalError> {
    let execution_price = apply_slippage_entry(request.market_price, config.slippage_pct);
    let quantity = size_quantity(request.budget, execution_price, lot_size, config);

    let cost = quantity * execution_price;
    let commission = calculate_commission(cost, config);
    let total_cost = cost + commission;

    if quantity <= 0.0 || total_cost > portfolio.cash {
        return Err(InsufficientCapitalError {
            ticker: request.ticker.to_string(),
            timestamp: request.timestamp,
            required: if quantity > 0.0 {
                total_cost
            } else {
                lot_size * execution_price + calculate_commission(lot_size * execution_price, config)
            },
            available: portfolio.cash.min(request.budget),
        });
    }

    portfolio.cash -= total_cost;
    portfolio.open_position(
        request.ticker,
        OpenPosition {
            entry_price: execution_price,
            entry_timestamp: request.timestamp,
            entry_index: request.bar_index,
            quantity,
            stop_price: risk.stop_price(execution_price),
            target_price: risk.target_price(execution_price),
            entry_commission: commission,
        },
    );

    Ok(EntryFill {
        quantity,
        execution_price,
        cost,
        commission,
    })
}

/// Close `ticker`'s open position at `market_price` (before slippage),
/// credit the proceeds and append the trade to the ledger.
///
/// Returns `None` if the ticker is flat. The exit commission never exceeds
/// the sale proceeds, so cash cannot go negative on an exit.
pub fn exit_position(
    portfolio: &mut Portfolio,
    ticker: &str,
    market_price: f64,
    timestamp: NaiveDateTime,
    bar_index: usize,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let position = portfolio.close_position(ticker)?;

    let exit_price = apply_slippage_exit(market_price, config.slippage_pct);
    let exit_value = position.quantity * exit_price;
    let exit_commission = calculate_commission(exit_value, config).min(exit_value);

    let price_pnl = position.quantity * (exit_price - position.entry_price);
    let realized_pnl = price_pnl - position.entry_commission - exit_commission;

    portfolio.cash += exit_value - exit_commission;

    let trade = Trade {
        ticker: ticker.to_string(),
        entry_timestamp: position.entry_timestamp,
        entry_price: position.entry_price,
        exit_timestamp: timestamp,
        exit_price,
        quantity: position.quantity,
        exit_reason: reason,
        realized_pnl,
        commission: position.entry_commission + exit_commission,
        bars_held: bar_index.saturating_sub(position.entry_index),
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_portfolio(cash: f64) -> Portfolio {
        Portfolio::new(cash)
    }

    fn make_config() -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: 10.0,
            commission_pct: 0.001,
            slippage_pct: 0.0005,
        }
    }

    fn make_risk() -> RiskManagement {
        RiskManagement {
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
        }
    }

    fn date(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn request(ticker: &str, price: f64, budget: f64) -> EntryRequest<'_> {
        EntryRequest {
            ticker,
            market_price: price,
            timestamp: date(15),
            bar_index: 3,
            budget,
        }
    }

    #[test]
    fn commission_flat_plus_pct() {
        let commission = calculate_commission(10000.0, &make_config());
        assert!((commission - 20.0).abs() < 1e-9);
    }

    #[test]
    fn commission_zero_config() {
        assert_eq!(calculate_commission(10000.0, &ExecutionConfig::default()), 0.0);
    }

    #[test]
    fn slippage_works_against_trader() {
        assert!((apply_slippage_entry(100.0, 0.0005) - 100.05).abs() < 1e-9);
        assert!((apply_slippage_exit(100.0, 0.0005) - 99.95).abs() < 1e-9);
    }

    #[test]
    fn size_quantity_whole_units() {
        let q = size_quantity(50000.0, 150.0, 1.0, &ExecutionConfig::default());
        assert_eq!(q, 333.0);
    }

    #[test]
    fn size_quantity_lot_size() {
        let q = size_quantity(50000.0, 150.0, 100.0, &ExecutionConfig::default());
        assert_eq!(q, 300.0);
        let q = size_quantity(1000.0, 3.0, 0.5, &ExecutionConfig::default());
        assert_eq!(q, 333.0);
    }

    #[test]
    fn size_quantity_leaves_room_for_commission() {
        let config = make_config();
        let q = size_quantity(10000.0, 100.0, 1.0, &config);
        let cost = q * 100.0;
        assert!(cost + calculate_commission(cost, &config) <= 10000.0);
        assert_eq!(q, 99.0);
    }

    #[test]
    fn size_quantity_budget_below_fee() {
        assert_eq!(size_quantity(5.0, 1.0, 1.0, &make_config()), 0.0);
    }

    #[test]
    fn enter_long_basic() {
        let mut portfolio = make_portfolio(100000.0);
        let config = make_config();
        let fill = enter_long(
            &mut portfolio,
            &request("AAPL", 100.0, 25000.0),
            1.0,
            &make_risk(),
            &config,
        )
        .unwrap();

        let exec = 100.0 * 1.0005;
        assert!((fill.execution_price - exec).abs() < 1e-9);
        assert!(fill.quantity > 0.0);
        assert!(fill.cost + fill.commission <= 25000.0);
        assert!((portfolio.cash - (100000.0 - fill.cost - fill.commission)).abs() < 1e-6);

        let pos = portfolio.get_position("AAPL").unwrap();
        assert_eq!(pos.entry_index, 3);
        assert!((pos.stop_price.unwrap() - exec * 0.95).abs() < 1e-9);
        assert!((pos.target_price.unwrap() - exec * 1.10).abs() < 1e-9);
        assert!((pos.entry_commission - fill.commission).abs() < 1e-12);
    }

    #[test]
    fn enter_long_no_risk_thresholds() {
        let mut portfolio = make_portfolio(100000.0);
        enter_long(
            &mut portfolio,
            &request("AAPL", 100.0, 10000.0),
            1.0,
            &RiskManagement::none(),
            &ExecutionConfig::default(),
        )
        .unwrap();
        let pos = portfolio.get_position("AAPL").unwrap();
        assert_eq!(pos.stop_price, None);
        assert_eq!(pos.target_price, None);
    }

    #[test]
    fn enter_long_budget_too_small() {
        let mut portfolio = make_portfolio(100000.0);
        let err = enter_long(
            &mut portfolio,
            &request("AAPL", 500.0, 100.0),
            1.0,
            &make_risk(),
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.ticker, "AAPL");
        assert!(!portfolio.has_position("AAPL"));
        assert_eq!(portfolio.cash, 100000.0);
    }

    #[test]
    fn enter_long_budget_exceeds_cash() {
        let mut portfolio = make_portfolio(1000.0);
        let err = enter_long(
            &mut portfolio,
            &request("AAPL", 100.0, 50000.0),
            1.0,
            &make_risk(),
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.available, 1000.0);
        assert!(err.required > 1000.0);
        assert_eq!(portfolio.cash, 1000.0);
    }

    #[test]
    fn exit_long_profit() {
        let mut portfolio = make_portfolio(100000.0);
        let config = make_config();
        let fill = enter_long(
            &mut portfolio,
            &request("AAPL", 100.0, 25000.0),
            1.0,
            &make_risk(),
            &config,
        )
        .unwrap();
        let cash_after_entry = portfolio.cash;

        let trade = exit_position(
            &mut portfolio,
            "AAPL",
            110.0,
            date(20),
            8,
            ExitReason::Signal,
            &config,
        )
        .unwrap();

        let exit_price = 110.0 * 0.9995;
        let exit_value = fill.quantity * exit_price;
        let exit_commission = calculate_commission(exit_value, &config);
        let expected_pnl =
            fill.quantity * (exit_price - fill.execution_price) - fill.commission - exit_commission;

        assert!((trade.exit_price - exit_price).abs() < 1e-9);
        assert!((trade.realized_pnl - expected_pnl).abs() < 1e-6);
        assert!((trade.commission - (fill.commission + exit_commission)).abs() < 1e-9);
        assert_eq!(trade.bars_held, 5);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((portfolio.cash - (cash_after_entry + exit_value - exit_commission)).abs() < 1e-6);
        assert!(!portfolio.has_position("AAPL"));
        assert_eq!(portfolio.trades.len(), 1);
    }

    #[test]
    fn exit_long_loss() {
        let mut portfolio = make_portfolio(100000.0);
        let config = ExecutionConfig::default();
        enter_long(
            &mut portfolio,
            &request("AAPL", 100.0, 10000.0),
            1.0,
            &make_risk(),
            &config,
        )
        .unwrap();
        let trade = exit_position(
            &mut portfolio,
            "AAPL",
            95.0,
            date(16),
            4,
            ExitReason::StopLoss,
            &config,
        )
        .unwrap();
        assert!((trade.realized_pnl + 500.0).abs() < 1e-9);
        assert!((portfolio.cash - 99500.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_cash_conservation_without_costs() {
        let mut portfolio = make_portfolio(50000.0);
        let config = ExecutionConfig::default();
        enter_long(
            &mut portfolio,
            &request("AAPL", 40.0, 50000.0),
            1.0,
            &make_risk(),
            &config,
        )
        .unwrap();
        assert!(portfolio.cash >= 0.0);
        let trade = exit_position(
            &mut portfolio,
            "AAPL",
            40.0,
            date(16),
            4,
            ExitReason::EndOfPeriod,
            &config,
        )
        .unwrap();
        assert_eq!(trade.realized_pnl, 0.0);
        assert!((portfolio.cash - 50000.0).abs() < 1e-9);
    }

    #[test]
    fn exit_commission_capped_at_proceeds() {
        let mut portfolio = make_portfolio(1000.0);
        let config = ExecutionConfig {
            commission_per_trade: 5.0,
            ..Default::default()
        };
        enter_long(
            &mut portfolio,
            &request("PENNY", 1.0, 100.0),
            1.0,
            &RiskManagement::none(),
            &config,
        )
        .unwrap();
        let trade = exit_position(
            &mut portfolio,
            "PENNY",
            0.01,
            date(16),
            4,
            ExitReason::Signal,
            &config,
        )
        .unwrap();
        let proceeds = trade.quantity * 0.01;
        assert!((trade.commission - (5.0 + proceeds)).abs() < 1e-9);
        assert!(portfolio.cash >= 0.0);
    }

    #[test]
    fn exit_flat_ticker_is_none() {
        let mut portfolio = make_portfolio(1000.0);
        assert!(
            exit_position(
                &mut portfolio,
                "XYZ",
                10.0,
                date(16),
                0,
                ExitReason::Signal,
                &ExecutionConfig::default()
            )
            .is_none()
        );
    }
}
