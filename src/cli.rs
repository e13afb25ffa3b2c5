//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestResult, SkipReason};
use crate::domain::condition::Condition;
use crate::domain::condition_parser;
use crate::domain::config_validation::validate_strategy;
use crate::domain::error::{ConfigError, StratbenchError};
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::{IndicatorKind, IndicatorSpec};
use crate::domain::strategy::{
    PositionSizing, Rebalance, RiskManagement, SizingMethod, StrategyConfig, DEFAULT_CAPITAL,
    DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT,
};
use crate::domain::universe::{load_universe, parse_tickers};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stratbench", about = "Multi-ticker strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <TICKER>.csv price files
        #[arg(short, long)]
        data: PathBuf,
        /// Trade ledger CSV; the equity curve goes to <stem>_equity.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated tickers overriding [strategy] tickers
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Run several strategy files over the same data
    Sweep {
        #[arg(short, long, num_args = 1.., required = true)]
        config: Vec<PathBuf>,
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers available in a data directory
    ListTickers {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            ticker,
        } => run_backtest(&config, &data, output.as_deref(), ticker.as_deref()),
        Command::Sweep { config, data } => run_sweep(&config, &data),
        Command::Validate { config } => run_validate(&config),
        Command::ListTickers { data } => run_list_tickers(&data),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = StratbenchError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: StratbenchError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn load_strategy(path: &Path) -> Result<StrategyConfig, ExitCode> {
    let adapter = load_config(path)?;
    build_strategy_config(&adapter).map_err(fail)
}

fn run_backtest(
    config_path: &Path,
    data_dir: &Path,
    output_path: Option<&Path>,
    ticker_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Load and build strategy
    eprintln!("Loading config from {}", config_path.display());
    let mut config = match load_strategy(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Some(list) = ticker_override {
        config.tickers = match parse_tickers(list) {
            Ok(t) => t,
            Err(e) => {
                return fail(StratbenchError::ConfigInvalid {
                    section: "cli".into(),
                    key: "ticker".into(),
                    reason: e.to_string(),
                });
            }
        };
    }
    eprintln!("Loading strategy: {}", config.name);

    // Stage 2: Load price data
    let data_port = CsvAdapter::new(data_dir.to_path_buf());
    let universe = match load_universe(&data_port, &config.tickers, config.start_date, config.end_date)
    {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    for (ticker, e) in &universe.failed {
        eprintln!("warning: skipping {} ({})", ticker, e);
    }

    // Stage 3: Simulate
    eprintln!(
        "Running backtest: {} tickers, {} to {}",
        universe.data.len(),
        config.start_date,
        config.end_date,
    );
    let result = match backtest_engine::run_backtest(&universe.data, &config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 4: Console summary
    print_summary(&result);

    // Stage 5: Report
    if let Some(output) = output_path {
        if let Err(e) = CsvReportAdapter::new().write(&result, &config, output) {
            return fail(e);
        }
        eprintln!(
            "\nReport written to: {} and {}",
            output.display(),
            CsvReportAdapter::equity_path(output).display()
        );
    }

    ExitCode::SUCCESS
}

fn run_sweep(config_paths: &[PathBuf], data_dir: &Path) -> ExitCode {
    let mut configs = Vec::with_capacity(config_paths.len());
    for path in config_paths {
        match load_strategy(path) {
            Ok(c) => configs.push(c),
            Err(code) => return code,
        }
    }

    let mut tickers: Vec<String> = configs.iter().flat_map(|c| c.tickers.clone()).collect();
    tickers.sort();
    tickers.dedup();
    let start = configs.iter().map(|c| c.start_date).min();
    let end = configs.iter().map(|c| c.end_date).max();
    let (Some(start), Some(end)) = (start, end) else {
        eprintln!("error: no strategies given");
        return ExitCode::from(2);
    };

    let data_port = CsvAdapter::new(data_dir.to_path_buf());
    let universe = match load_universe(&data_port, &tickers, start, end) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    eprintln!("Running {} strategies over {} tickers", configs.len(), universe.data.len());
    let results = backtest_engine::run_sweep(&universe.data, &configs);

    println!("\n=== Sweep Results ===");
    let mut exit = ExitCode::SUCCESS;
    for (config, result) in configs.iter().zip(results) {
        match result {
            Ok(r) => println!(
                "  {:<24} return {:>8}  sharpe {:>6}  max dd {:>7}  trades {}",
                config.name,
                pct(Some(r.metrics.total_return)),
                ratio(r.metrics.sharpe_ratio),
                pct(Some(-r.metrics.max_drawdown)),
                r.metrics.total_trades,
            ),
            Err(e) => {
                eprintln!("error: {}: {e}", config.name);
                exit = (&e).into();
            }
        }
    }
    exit
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating strategy: {}", config_path.display());
    let config = match load_strategy(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let specs = match validate_strategy(&config) {
        Ok(s) => s,
        Err(e) => return fail(e.into()),
    };

    eprintln!("\nBuy Condition:\n  Parsed: {}", config.buy_condition);
    eprintln!("\nSell Condition:\n  Parsed: {}", config.sell_condition);
    eprintln!("\nIndicators to compute:");
    for spec in &specs {
        eprintln!("  {} = {}", spec.name, spec.kind);
    }
    eprintln!("\nTickers: {}", config.tickers.join(", "));
    eprintln!("\nStrategy configuration is valid.");
    ExitCode::SUCCESS
}

fn run_list_tickers(data_dir: &Path) -> ExitCode {
    let tickers = match CsvAdapter::new(data_dir.to_path_buf()).list_tickers() {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    if tickers.is_empty() {
        eprintln!("No tickers found in {}", data_dir.display());
    } else {
        for ticker in &tickers {
            println!("{}", ticker);
        }
        eprintln!("{} tickers found", tickers.len());
    }
    ExitCode::SUCCESS
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn ratio(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

pub fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!("\n=== Aggregate Results ===");
    println!("Final Equity:     {:.2}", m.final_equity);
    println!("Total Return:     {}", pct(Some(m.total_return)));
    println!("Annualized:       {}", pct(m.annualized_return));
    println!("Sharpe Ratio:     {}", ratio(m.sharpe_ratio));
    println!("Sortino Ratio:    {}", ratio(m.sortino_ratio));
    println!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    println!("Total Trades:     {}", m.total_trades);
    println!("Win Rate:         {}", pct(m.win_rate));
    println!("Profit Factor:    {}", ratio(m.profit_factor));
    println!("Commission Paid:  {:.2}", m.total_commission);

    if !result.ticker_results.is_empty() {
        println!("\n=== Per-Ticker Summary ===");
        for tr in &result.ticker_results {
            let pnl_sign = if tr.total_pnl >= 0.0 { "+" } else { "" };
            println!(
                "  {}:  {} trades, {:.1}% win rate, {}${:.0}",
                tr.ticker,
                tr.total_trades,
                tr.win_rate * 100.0,
                pnl_sign,
                tr.total_pnl,
            );
        }
    }

    for rejected in &result.rejected {
        eprintln!("warning: rejected {} ({})", rejected.ticker, rejected.error);
    }
    let capital_skips = result
        .skipped
        .iter()
        .filter(|s| matches!(s.reason, SkipReason::InsufficientCapital(_)))
        .count();
    if !result.skipped.is_empty() {
        eprintln!(
            "note: {} buy signals skipped ({} for insufficient capital)",
            result.skipped.len(),
            capital_skips
        );
    }
}

fn required(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<String, StratbenchError> {
    adapter
        .get_string(section, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StratbenchError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn parse_date(adapter: &dyn ConfigPort, key: &str) -> Result<NaiveDate, StratbenchError> {
    let raw = required(adapter, "parameters", key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| StratbenchError::ConfigInvalid {
        section: "parameters".into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

fn optional_window(adapter: &dyn ConfigPort, key: &str) -> Result<Option<usize>, StratbenchError> {
    if adapter
        .get_string("parameters", key)
        .is_none_or(|v| v.trim().is_empty())
    {
        return Ok(None);
    }
    let value = adapter.get_int("parameters", key, 0)?;
    usize::try_from(value)
        .map(Some)
        .map_err(|_| StratbenchError::ConfigInvalid {
            section: "parameters".into(),
            key: key.into(),
            reason: format!("window must not be negative, got {}", value),
        })
}

fn parse_condition(adapter: &dyn ConfigPort, key: &str) -> Result<Condition, StratbenchError> {
    let text = required(adapter, "logic", key)?;
    condition_parser::parse(&text).map_err(|e| {
        eprintln!(
            "error: failed to parse {}:\n{}",
            key,
            e.display_with_context(&text)
        );
        ConfigError::Condition {
            condition: key.into(),
            source: e,
        }
        .into()
    })
}

fn parse_indicators(adapter: &dyn ConfigPort) -> Result<Vec<IndicatorSpec>, StratbenchError> {
    let mut names = adapter.keys("indicators");
    names.sort();

    let mut specs = Vec::with_capacity(names.len());
    for name in names {
        let raw = adapter.get_string("indicators", &name).unwrap_or_default();
        let kind = raw.parse::<IndicatorKind>().map_err(|reason| ConfigError::InvalidIndicator {
            spec: format!("{} = {}", name, raw),
            reason,
        })?;
        specs.push(IndicatorSpec::new(name, kind));
    }
    Ok(specs)
}

fn parse_sizing(adapter: &dyn ConfigPort) -> Result<PositionSizing, StratbenchError> {
    let method = adapter
        .get_string("position_sizing", "method")
        .unwrap_or_else(|| "equal_weight".to_string());

    let method = match method.trim().to_ascii_lowercase().as_str() {
        "" | "equal_weight" => SizingMethod::EqualWeight,
        "fixed_fraction" => {
            let fraction = required(adapter, "position_sizing", "fraction")
                .and_then(|_| adapter.get_double("position_sizing", "fraction", 0.0))?;
            SizingMethod::FixedFraction(fraction)
        }
        other => {
            return Err(StratbenchError::ConfigInvalid {
                section: "position_sizing".into(),
                key: "method".into(),
                reason: format!(
                    "unknown method '{}' (expected equal_weight or fixed_fraction)",
                    other
                ),
            });
        }
    };

    Ok(PositionSizing {
        method,
        lot_size: adapter.get_double("position_sizing", "lot_size", 1.0)?,
    })
}

/// Assemble a [`StrategyConfig`] from an INI-style configuration.
///
/// Values are checked for syntax here; range and cross-field checks are left
/// to [`validate_strategy`].
pub fn build_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, StratbenchError> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();

    let tickers = parse_tickers(&required(adapter, "strategy", "tickers")?).map_err(|e| {
        StratbenchError::ConfigInvalid {
            section: "strategy".into(),
            key: "tickers".into(),
            reason: e.to_string(),
        }
    })?;

    let rebalance = match adapter.get_string("strategy", "rebalance") {
        Some(raw) if !raw.trim().is_empty() => {
            raw.parse::<Rebalance>()
                .map_err(|reason| StratbenchError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "rebalance".into(),
                    reason,
                })?
        }
        _ => Rebalance::default(),
    };

    let buy_condition = parse_condition(adapter, "buy_condition")?;
    let sell_condition = parse_condition(adapter, "sell_condition")?;

    let mut config = StrategyConfig::new(
        name,
        tickers,
        buy_condition,
        sell_condition,
        parse_date(adapter, "start_date")?,
        parse_date(adapter, "end_date")?,
    );
    config.description = description;
    config.capital = adapter.get_double("strategy", "capital", DEFAULT_CAPITAL)?;
    config.rebalance = rebalance;
    config.short_window = optional_window(adapter, "short_window")?;
    config.long_window = optional_window(adapter, "long_window")?;
    config.indicators = parse_indicators(adapter)?;
    config.position_sizing = parse_sizing(adapter)?;
    config.risk = RiskManagement {
        stop_loss_pct: adapter.get_double(
            "risk_management",
            "stop_loss_pct",
            DEFAULT_STOP_LOSS_PCT,
        )?,
        take_profit_pct: adapter.get_double(
            "risk_management",
            "take_profit_pct",
            DEFAULT_TAKE_PROFIT_PCT,
        )?,
    };
    config.execution = ExecutionConfig {
        commission_per_trade: adapter.get_double("execution", "commission_per_trade", 0.0)?,
        commission_pct: adapter.get_double("execution", "commission_pct", 0.0)?,
        slippage_pct: adapter.get_double("execution", "slippage_pct", 0.0)?,
    };
    config.risk_free_rate = adapter.get_double("execution", "risk_free_rate", 0.0)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[strategy]
name = Crossover
description = SMA crossover with RSI filter
tickers = aapl, msft
capital = 50000
rebalance = weekly

[parameters]
short_window = 5
long_window = 20
start_date = 2024-01-01
end_date = 2024-06-30

[indicators]
fast = EMA(12)
band = BOLLINGER(20, 2.5)

[logic]
buy_condition = short_ma > long_ma AND rsi < 70
sell_condition = short_ma < long_ma

[position_sizing]
method = fixed_fraction
fraction = 0.25
lot_size = 10

[risk_management]
stop_loss_pct = 0.1
take_profit_pct = 0

[execution]
commission_per_trade = 1.5
commission_pct = 0.001
slippage_pct = 0.0005
risk_free_rate = 0.02
"#;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn builds_full_config() {
        let config = build_strategy_config(&adapter(FULL)).unwrap();
        assert_eq!(config.name, "Crossover");
        assert_eq!(config.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.capital, 50000.0);
        assert_eq!(config.rebalance, Rebalance::Weekly);
        assert_eq!(config.short_window, Some(5));
        assert_eq!(config.long_window, Some(20));
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            config.indicators,
            vec![
                IndicatorSpec::new(
                    "band",
                    IndicatorKind::Bollinger {
                        window: 20,
                        k: 2.5
                    }
                ),
                IndicatorSpec::new("fast", IndicatorKind::Ema { period: 12 }),
            ]
        );
        assert_eq!(
            config.position_sizing,
            PositionSizing {
                method: SizingMethod::FixedFraction(0.25),
                lot_size: 10.0
            }
        );
        assert_eq!(config.risk.stop_loss_pct, 0.1);
        assert_eq!(config.risk.take_profit_pct, 0.0);
        assert_eq!(config.execution.commission_per_trade, 1.5);
        assert_eq!(config.risk_free_rate, 0.02);
        assert!(validate_strategy(&config).is_ok());
    }

    #[test]
    fn defaults_apply() {
        let config = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nbuy_condition = rsi < 30\nsell_condition = rsi > 70\n",
        ))
        .unwrap();
        assert_eq!(config.name, "Unnamed");
        assert_eq!(config.capital, DEFAULT_CAPITAL);
        assert_eq!(config.rebalance, Rebalance::Daily);
        assert_eq!(config.position_sizing, PositionSizing::default());
        assert_eq!(config.risk, RiskManagement::default());
        assert_eq!(config.short_window, None);
        assert!(config.indicators.is_empty());
    }

    #[test]
    fn missing_buy_condition() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nsell_condition = rsi > 70\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            StratbenchError::ConfigMissing { ref key, .. } if key == "buy_condition"
        ));
    }

    #[test]
    fn unparsable_condition() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nbuy_condition = rsi <\nsell_condition = rsi > 70\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            StratbenchError::Config(ConfigError::Condition { ref condition, .. })
                if condition == "buy_condition"
        ));
    }

    #[test]
    fn bad_indicator_spec() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [indicators]\nx = WMA(5)\n\
             [logic]\nbuy_condition = x > 1\nsell_condition = x < 1\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            StratbenchError::Config(ConfigError::InvalidIndicator { .. })
        ));
    }

    #[test]
    fn bad_date_and_rebalance() {
        let base = "[logic]\nbuy_condition = rsi < 30\nsell_condition = rsi > 70\n";
        let err = build_strategy_config(&adapter(&format!(
            "[strategy]\ntickers = SPY\n[parameters]\nstart_date = 01/01/2024\nend_date = 2024-12-31\n{base}"
        )))
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { ref key, .. } if key == "start_date"));

        let err = build_strategy_config(&adapter(&format!(
            "[strategy]\ntickers = SPY\nrebalance = hourly\n[parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n{base}"
        )))
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { ref key, .. } if key == "rebalance"));
    }

    #[test]
    fn negative_window_rejected() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nshort_window = -5\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nbuy_condition = rsi < 30\nsell_condition = rsi > 70\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { ref key, .. } if key == "short_window"));
    }

    #[test]
    fn fixed_fraction_requires_fraction() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nbuy_condition = rsi < 30\nsell_condition = rsi > 70\n\
             [position_sizing]\nmethod = fixed_fraction\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigMissing { ref key, .. } if key == "fraction"));
    }

    #[test]
    fn duplicate_tickers_rejected() {
        let err = build_strategy_config(&adapter(
            "[strategy]\ntickers = SPY, spy\n\
             [parameters]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n\
             [logic]\nbuy_condition = rsi < 30\nsell_condition = rsi > 70\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratbenchError::ConfigInvalid { ref key, .. } if key == "tickers"));
    }

    #[test]
    fn cli_parses_backtest_args() {
        let cli = Cli::try_parse_from([
            "stratbench",
            "backtest",
            "--config",
            "s.ini",
            "--data",
            "prices",
            "--ticker",
            "AAPL,MSFT",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                data,
                output,
                ticker,
            } => {
                assert_eq!(config, PathBuf::from("s.ini"));
                assert_eq!(data, PathBuf::from("prices"));
                assert_eq!(output, None);
                assert_eq!(ticker.as_deref(), Some("AAPL,MSFT"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_requires_data_dir() {
        assert!(Cli::try_parse_from(["stratbench", "backtest", "--config", "s.ini"]).is_err());
    }

    #[test]
    fn pct_and_ratio_show_not_applicable() {
        assert_eq!(pct(None), "n/a");
        assert_eq!(pct(Some(0.1234)), "12.34%");
        assert_eq!(ratio(None), "n/a");
        assert_eq!(ratio(Some(1.5)), "1.50");
    }
}
