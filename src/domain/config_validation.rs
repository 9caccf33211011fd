//! Configuration validation.
//!
//! Every section is checked before anything is loaded or run, so a bad value
//! fails fast with the section and key that caused it.

use crate::domain::error::ArenaError;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), ArenaError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_tournament_config(config)?;
    validate_model_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ArenaError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(ArenaError::ConfigMissing {
                section: "data".to_string(),
                key: "dir".to_string(),
            });
        }
    }
    if let Some(list) = config.get_string("data", "symbols") {
        parse_symbols(&list).map_err(|e| invalid("data", "symbols", e.to_string()))?;
    }
    if let Some(b) = config.get_string("data", "benchmark") {
        if b.trim().is_empty() {
            return Err(invalid("data", "benchmark", "benchmark must not be empty"));
        }
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ArenaError> {
    let cash = config.get_double("backtest", "initial_cash", 100_000.0);
    if cash <= 0.0 {
        return Err(invalid("backtest", "initial_cash", "initial_cash must be positive"));
    }
    for key in ["slippage_pct", "commission_pct"] {
        if config.get_double("backtest", key, 0.0) < 0.0 {
            return Err(invalid("backtest", key, format!("{key} must be non-negative")));
        }
    }
    if config.get_int("backtest", "rebalance_interval", 5) < 1 {
        return Err(invalid(
            "backtest",
            "rebalance_interval",
            "rebalance_interval must be at least 1",
        ));
    }
    let fraction = config.get_double("backtest", "signal_position_fraction", 0.1);
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid(
            "backtest",
            "signal_position_fraction",
            "signal_position_fraction must be in (0, 1]",
        ));
    }
    if config.get_string("backtest", "trailing_stop_pct").is_some() {
        let pct = config.get_double("backtest", "trailing_stop_pct", -1.0);
        if pct <= 0.0 || pct >= 100.0 {
            return Err(invalid(
                "backtest",
                "trailing_stop_pct",
                "trailing_stop_pct must be between 0 and 100",
            ));
        }
    }
    let min_trade = config.get_double("backtest", "min_trade_fraction", 0.01);
    if !(0.0..1.0).contains(&min_trade) {
        return Err(invalid(
            "backtest",
            "min_trade_fraction",
            "min_trade_fraction must be in [0, 1)",
        ));
    }
    let rf = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&rf) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    let start = parse_optional_date(config, "backtest", "start_date")?;
    let end = parse_optional_date(config, "backtest", "end_date")?;
    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

pub fn validate_tournament_config(config: &dyn ConfigPort) -> Result<(), ArenaError> {
    for (key, default) in [
        ("max_workers", 4),
        ("finalists", 10),
        ("min_test_dates", 20),
    ] {
        if config.get_int("tournament", key, default) < 1 {
            return Err(invalid("tournament", key, format!("{key} must be at least 1")));
        }
    }
    if config.get_int("tournament", "min_history_dates", 50) < 2 {
        return Err(invalid(
            "tournament",
            "min_history_dates",
            "min_history_dates must be at least 2",
        ));
    }
    let ratio = config.get_double("tournament", "split_ratio", 0.8);
    if ratio <= 0.0 || ratio >= 1.0 {
        return Err(invalid("tournament", "split_ratio", "split_ratio must be in (0, 1)"));
    }
    if config.get_double("tournament", "per_trade_cost_pct", 0.4) < 0.0 {
        return Err(invalid(
            "tournament",
            "per_trade_cost_pct",
            "per_trade_cost_pct must be non-negative",
        ));
    }
    if config.get_double("tournament", "sharpe_cap", 3.0) <= 0.0 {
        return Err(invalid("tournament", "sharpe_cap", "sharpe_cap must be positive"));
    }
    Ok(())
}

pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), ArenaError> {
    if config.get_int("model", "refresh_secs", 300) < 1 {
        return Err(invalid("model", "refresh_secs", "refresh_secs must be at least 1"));
    }
    Ok(())
}

/// An optional `YYYY-MM-DD` value.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, ArenaError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ArenaError {
    ArenaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
