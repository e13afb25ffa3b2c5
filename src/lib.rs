//! stratbench: rule-based strategy backtester.
//!
//! Hexagonal architecture: the simulation engine lives in [`domain`], port
//! traits in [`ports`], concrete file-backed implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
