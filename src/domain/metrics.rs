//! Performance metrics and the per-run result record.

use chrono::NaiveDate;
use serde::Serialize;

use super::portfolio::{EquityPoint, Portfolio};
use super::quote::Quote;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Outcome of one engine run. Percentages are in percentage points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy_id: String,
    pub return_pct: f64,
    pub benchmark_return_pct: f64,
    pub alpha: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub final_equity: f64,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub return_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub final_equity: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let equity_curve = &portfolio.equity_curve;
        let initial = portfolio.initial_cash;

        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(initial);

        let return_pct = if initial > 0.0 {
            (final_equity / initial - 1.0) * 100.0
        } else {
            0.0
        };

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;

        Metrics {
            return_pct,
            sharpe: compute_sharpe(equity_curve, daily_rf),
            max_drawdown_pct: compute_drawdown(equity_curve) * 100.0,
            total_trades: portfolio.trades.len(),
            final_equity,
        }
    }
}

/// Benchmark return in percent from the first close on or after `start` to
/// the last close on or before `end`. Zero when the benchmark does not cover
/// the window.
pub fn benchmark_return_pct(benchmark: &[Quote], start: NaiveDate, end: NaiveDate) -> f64 {
    let first = benchmark
        .iter()
        .find(|q| q.date >= start && q.date <= end && q.is_priced());
    let last = benchmark
        .iter()
        .rev()
        .find(|q| q.date <= end && q.date >= start && q.is_priced());
    match (first, last) {
        (Some(a), Some(b)) => (b.close / a.close - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio of daily equity returns, population stddev.
/// Zero when returns have no dispersion.
pub fn compute_sharpe(equity_curve: &[EquityPoint], daily_rf: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 && stddev.is_finite() {
        ((mean - daily_rf) / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
