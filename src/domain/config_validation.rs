//! Strategy validation.
//!
//! Runs before any bar is simulated. Every check here is independent of the
//! price data; window-versus-series-length checks happen in
//! [`crate::domain::indicator::compute_frame`] once the bars are known.

use std::collections::{BTreeSet, HashSet};

use crate::domain::condition::Condition;
use crate::domain::error::ConfigError;
use crate::domain::indicator::IndicatorSpec;
use crate::domain::strategy::{SizingMethod, StrategyConfig};

/// Validate `config` and return the indicator specs the conditions actually
/// reference, in resolution order.
pub fn validate_strategy(config: &StrategyConfig) -> Result<Vec<IndicatorSpec>, ConfigError> {
    validate_tickers(&config.tickers)?;
    validate_dates(config)?;
    validate_capital(config.capital)?;
    validate_risk(config)?;
    validate_costs(config)?;
    validate_sizing(config)?;
    validate_windows(config)?;

    let specs = config.resolved_indicators();
    let mut outputs: HashSet<String> = HashSet::new();
    for spec in &specs {
        spec.validate()?;
        for name in spec.output_names() {
            if !outputs.insert(name.clone()) {
                return Err(ConfigError::DuplicateOutput(name));
            }
        }
    }

    let buy = config.buy_condition.indicator_names();
    let sell = config.sell_condition.indicator_names();
    check_references("buy_condition", &buy, &outputs)?;
    check_references("sell_condition", &sell, &outputs)?;

    Ok(specs
        .into_iter()
        .filter(|spec| {
            spec.output_names()
                .iter()
                .any(|n| buy.contains(n) || sell.contains(n))
        })
        .collect())
}

/// Indicator names referenced by either condition.
pub fn referenced_indicators(buy: &Condition, sell: &Condition) -> BTreeSet<String> {
    let mut names = buy.indicator_names();
    names.extend(sell.indicator_names());
    names
}

fn validate_tickers(tickers: &[String]) -> Result<(), ConfigError> {
    if tickers.is_empty() {
        return Err(ConfigError::NoTickers);
    }
    let mut seen = HashSet::new();
    for ticker in tickers {
        if !seen.insert(ticker.as_str()) {
            return Err(ConfigError::DuplicateTicker(ticker.clone()));
        }
    }
    Ok(())
}

fn validate_dates(config: &StrategyConfig) -> Result<(), ConfigError> {
    if config.start_date > config.end_date {
        return Err(ConfigError::InvertedDateRange {
            start: config.start_date,
            end: config.end_date,
        });
    }
    Ok(())
}

fn validate_capital(capital: f64) -> Result<(), ConfigError> {
    if !capital.is_finite() || capital <= 0.0 {
        return Err(out_of_range("capital", "a positive number", capital));
    }
    Ok(())
}

fn validate_risk(config: &StrategyConfig) -> Result<(), ConfigError> {
    let stop = config.risk.stop_loss_pct;
    if !(0.0..1.0).contains(&stop) {
        return Err(out_of_range("stop_loss_pct", "in [0, 1)", stop));
    }
    let take = config.risk.take_profit_pct;
    if !take.is_finite() || take < 0.0 {
        return Err(out_of_range("take_profit_pct", "non-negative", take));
    }
    let rf = config.risk_free_rate;
    if !(0.0..1.0).contains(&rf) {
        return Err(out_of_range("risk_free_rate", "in [0, 1)", rf));
    }
    Ok(())
}

fn validate_costs(config: &StrategyConfig) -> Result<(), ConfigError> {
    let exec = &config.execution;
    if !exec.commission_per_trade.is_finite() || exec.commission_per_trade < 0.0 {
        return Err(out_of_range(
            "commission_per_trade",
            "non-negative",
            exec.commission_per_trade,
        ));
    }
    if !exec.commission_pct.is_finite() || exec.commission_pct < 0.0 {
        return Err(out_of_range(
            "commission_pct",
            "non-negative",
            exec.commission_pct,
        ));
    }
    if !(0.0..1.0).contains(&exec.slippage_pct) {
        return Err(out_of_range("slippage_pct", "in [0, 1)", exec.slippage_pct));
    }
    Ok(())
}

fn validate_sizing(config: &StrategyConfig) -> Result<(), ConfigError> {
    let sizing = &config.position_sizing;
    if let SizingMethod::FixedFraction(fraction) = sizing.method {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(out_of_range("fixed_fraction", "in (0, 1]", fraction));
        }
    }
    if !sizing.lot_size.is_finite() || sizing.lot_size <= 0.0 {
        return Err(out_of_range("lot_size", "a positive number", sizing.lot_size));
    }
    Ok(())
}

fn validate_windows(config: &StrategyConfig) -> Result<(), ConfigError> {
    for (name, window) in [
        ("short_ma", config.short_window),
        ("long_ma", config.long_window),
    ] {
        if window == Some(0) {
            return Err(ConfigError::NonPositiveWindow {
                indicator: name.to_string(),
                parameter: "window",
            });
        }
    }
    if let (Some(short), Some(long)) = (config.short_window, config.long_window) {
        if short >= long {
            return Err(ConfigError::WindowOrder {
                context: "moving average windows".to_string(),
                short,
                long,
            });
        }
    }
    Ok(())
}

fn check_references(
    condition: &str,
    names: &BTreeSet<String>,
    outputs: &HashSet<String>,
) -> Result<(), ConfigError> {
    match names.iter().find(|n| !outputs.contains(*n)) {
        Some(name) => Err(ConfigError::UnknownIndicator {
            condition: condition.to_string(),
            name: name.clone(),
        }),
        None => Ok(()),
    }
}

fn out_of_range(field: &str, expected: &'static str, value: f64) -> ConfigError {
    ConfigError::OutOfRange {
        field: field.to_string(),
        expected,
        value,
    }
}
