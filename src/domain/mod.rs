//! Core domain types and the simulation engine.

pub mod ohlcv;
pub mod indicator;
pub mod condition;
pub mod condition_parser;
pub mod condition_eval;
pub mod strategy;
pub mod config_validation;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod ticker_data;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod error;
