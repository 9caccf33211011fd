//! Core domain types and logic.

pub mod quote;
pub mod market_data;
pub mod cursor;
pub mod indicator;
pub mod strategy;
pub mod holding;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod tournament;
pub mod universe;
pub mod config_validation;
pub mod error;
