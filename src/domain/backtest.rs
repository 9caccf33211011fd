//! Backtest engine: walks one strategy across the unified timeline.
//!
//! Each step advances every cursor to the last quote on or before the date,
//! applies the trailing stop, asks the strategy for a decision, fills the
//! resulting orders and marks the portfolio to the close. Dates before the
//! window start only advance cursors; the walk stops after the window end.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;

use super::cursor::Cursors;
use super::error::BacktestError;
use super::execution::{self, CostModel, FillResult, Order};
use super::market_data::MarketData;
use super::metrics::{BacktestResult, Metrics, benchmark_return_pct};
use super::portfolio::{Portfolio, TradeReason};
use super::strategy::{DecisionStyle, Signal, Strategy};

/// Inclusive date bounds. `None` means the start or end of the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacktestWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl BacktestWindow {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        BacktestWindow {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_before_start(&self, date: NaiveDate) -> bool {
        self.start.is_some_and(|s| date < s)
    }

    pub fn is_after_end(&self, date: NaiveDate) -> bool {
        self.end.is_some_and(|e| date > e)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        !self.is_before_start(date) && !self.is_after_end(date)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub costs: CostModel,
    pub window: BacktestWindow,
    /// Trading days between rebalances.
    pub rebalance_interval: usize,
    /// Share of equity committed per signal-style entry.
    pub signal_position_fraction: f64,
    /// Percent below the peak close that liquidates a holding.
    pub trailing_stop_pct: Option<f64>,
    /// Rebalance deltas smaller than this share of equity are skipped.
    pub min_trade_fraction: f64,
    /// Annual rate, as a fraction.
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: 100_000.0,
            costs: CostModel::default(),
            window: BacktestWindow::full(),
            rebalance_interval: 5,
            signal_position_fraction: 0.1,
            trailing_stop_pct: None,
            min_trade_fraction: 0.01,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn with_window(&self, window: BacktestWindow) -> Self {
        BacktestConfig {
            window,
            ..self.clone()
        }
    }
}

/// Runs `strategy` over `market` inside `config.window`.
///
/// Returns [`BacktestError::NoData`] when no symbol has a priced quote in
/// the window and [`BacktestError::Cancelled`] as soon as `cancel` fires.
pub fn run_backtest(
    strategy: &dyn Strategy,
    market: &MarketData,
    config: &BacktestConfig,
    cancel: &CancellationToken,
) -> Result<BacktestResult, BacktestError> {
    let window = config.window;
    let interval = config.rebalance_interval.max(1);
    let lookback = strategy.lookback();

    let mut portfolio = Portfolio::new(config.initial_cash);
    let mut cursors = Cursors::new();
    let mut last_close: BTreeMap<String, f64> = BTreeMap::new();
    let mut first_date: Option<NaiveDate> = None;
    let mut steps = 0usize;

    for date in market.timeline() {
        if cancel.is_cancelled() {
            return Err(BacktestError::Cancelled);
        }
        if window.is_after_end(date) {
            break;
        }

        let mut active: BTreeSet<String> = BTreeSet::new();
        for (symbol, series) in &market.series {
            let Some(index) = series.index_at_or_before(date) else {
                continue;
            };
            cursors.advance(symbol, index);
            let quote = &series.quotes[index];
            if quote.is_priced() {
                last_close.insert(symbol.clone(), quote.close);
                if quote.date == date {
                    active.insert(symbol.clone());
                }
            }
        }

        if window.is_before_start(date) || (first_date.is_none() && active.is_empty()) {
            continue;
        }
        first_date.get_or_insert(date);

        let mut step = Step {
            date,
            market,
            cursors: &cursors,
            last_close: &last_close,
            active: &active,
            config,
            portfolio: &mut portfolio,
        };

        if let Some(pct) = config.trailing_stop_pct {
            step.apply_trailing_stop(pct);
        }

        match strategy.style() {
            DecisionStyle::Rebalance => {
                if steps % interval == 0 {
                    let candidates: Vec<String> = active
                        .iter()
                        .filter(|s| cursors.get(s).is_some_and(|c| c >= lookback))
                        .cloned()
                        .collect();
                    if !candidates.is_empty() {
                        let targets = strategy.allocate(&candidates, market, &cursors);
                        step.rebalance(&targets);
                    }
                }
            }
            DecisionStyle::Signal => step.follow_signals(strategy, lookback),
        }

        let equity = portfolio.total_equity(&last_close);
        portfolio.record_equity(date, equity);
        steps += 1;
    }

    let (Some(start), Some(end)) = (first_date, portfolio.equity_curve.last().map(|p| p.date))
    else {
        return Err(BacktestError::NoData);
    };

    let metrics = Metrics::compute(&portfolio, config.risk_free_rate);
    let benchmark_return_pct = benchmark_return_pct(&market.benchmark, start, end);

    tracing::debug!(
        strategy = strategy.id(),
        %start,
        %end,
        return_pct = metrics.return_pct,
        trades = metrics.total_trades,
        "backtest finished"
    );

    Ok(BacktestResult {
        strategy_id: strategy.id().to_string(),
        return_pct: metrics.return_pct,
        benchmark_return_pct,
        alpha: metrics.return_pct - benchmark_return_pct,
        sharpe: metrics.sharpe,
        max_drawdown_pct: metrics.max_drawdown_pct,
        total_trades: metrics.total_trades,
        final_equity: metrics.final_equity,
        window_start: start,
        window_end: end,
    })
}

/// Per-date trading context.
struct Step<'a> {
    date: NaiveDate,
    market: &'a MarketData,
    cursors: &'a Cursors,
    last_close: &'a BTreeMap<String, f64>,
    active: &'a BTreeSet<String>,
    config: &'a BacktestConfig,
    portfolio: &'a mut Portfolio,
}

impl Step<'_> {
    fn order<'s>(&self, symbol: &'s str, reason: TradeReason) -> Option<Order<'s>> {
        let price = *self.last_close.get(symbol)?;
        Some(Order {
            symbol,
            market_price: price,
            date: self.date,
            reason,
        })
    }

    fn costs(&self) -> &CostModel {
        &self.config.costs
    }

    fn equity(&self) -> f64 {
        self.portfolio.total_equity(self.last_close)
    }

    fn note_fill(&self, order: &Order<'_>, fill: &FillResult) {
        match fill {
            FillResult::Filled {
                quantity,
                clipped: true,
                ..
            } => tracing::debug!(
                date = %self.date,
                symbol = order.symbol,
                quantity,
                "order clipped to what the portfolio allows"
            ),
            FillResult::Filled { .. } => {}
            FillResult::Rejected => tracing::debug!(
                date = %self.date,
                symbol = order.symbol,
                "order rejected"
            ),
        }
    }

    fn apply_trailing_stop(&mut self, pct: f64) {
        let held: Vec<String> = self
            .portfolio
            .holdings
            .keys()
            .filter(|s| self.active.contains(*s))
            .cloned()
            .collect();

        for symbol in held {
            let Some(&close) = self.last_close.get(&symbol) else {
                continue;
            };
            let hit = match self.portfolio.holding_mut(&symbol) {
                Some(h) => {
                    h.observe_close(close);
                    h.trailing_stop_hit(close, pct)
                }
                None => false,
            };
            if !hit {
                continue;
            }
            if let Some(order) = self.order(&symbol, TradeReason::TrailingStop) {
                let costs = *self.costs();
                let fill = execution::liquidate(self.portfolio, order, &costs);
                self.note_fill(&order, &fill);
            }
        }
    }

    /// Moves holdings toward `targets`: exits first, then trims, then buys.
    /// Empty targets leave the portfolio untouched.
    fn rebalance(&mut self, targets: &BTreeMap<String, f64>) {
        let weights = normalize_targets(targets, self.active);
        if weights.is_empty() {
            return;
        }

        let costs = *self.costs();
        let equity = self.equity();
        let min_trade = self.config.min_trade_fraction * equity;

        let exits: Vec<String> = self
            .portfolio
            .holdings
            .keys()
            .filter(|s| !weights.contains_key(*s) && self.active.contains(*s))
            .cloned()
            .collect();
        for symbol in &exits {
            if let Some(order) = self.order(symbol, TradeReason::Rebalance) {
                let fill = execution::liquidate(self.portfolio, order, &costs);
                self.note_fill(&order, &fill);
            }
        }

        for (symbol, weight) in &weights {
            let Some(order) = self.order(symbol, TradeReason::Rebalance) else {
                continue;
            };
            let current = self.portfolio.quantity(symbol) * order.market_price;
            let excess = current - weight * equity;
            if excess > min_trade {
                let fill =
                    execution::sell(self.portfolio, order, excess / order.market_price, &costs);
                self.note_fill(&order, &fill);
            }
        }

        for (symbol, weight) in &weights {
            let Some(order) = self.order(symbol, TradeReason::Rebalance) else {
                continue;
            };
            let current = self.portfolio.quantity(symbol) * order.market_price;
            let shortfall = weight * equity - current;
            if shortfall > min_trade {
                let fill = execution::buy(self.portfolio, order, shortfall, &costs);
                self.note_fill(&order, &fill);
            }
        }
    }

    fn follow_signals(&mut self, strategy: &dyn Strategy, lookback: usize) {
        let costs = *self.costs();
        let entry_notional = self.config.signal_position_fraction * self.equity();
        let active = self.active;

        for symbol in active {
            let (Some(series), Some(cursor)) = (self.market.get(symbol), self.cursors.get(symbol))
            else {
                continue;
            };
            if cursor < lookback {
                continue;
            }
            let Some(order) = self.order(symbol, TradeReason::Signal) else {
                continue;
            };
            let fill = match strategy.signal(symbol, &series.quotes, cursor) {
                Signal::Buy if !self.portfolio.has_holding(symbol) => {
                    execution::buy(self.portfolio, order, entry_notional, &costs)
                }
                Signal::Sell if self.portfolio.has_holding(symbol) => {
                    execution::liquidate(self.portfolio, order, &costs)
                }
                _ => continue,
            };
            self.note_fill(&order, &fill);
        }
    }
}

/// Keeps positive finite weights for tradable symbols and scales them to
/// sum to 1.
fn normalize_targets(
    targets: &BTreeMap<String, f64>,
    active: &BTreeSet<String>,
) -> BTreeMap<String, f64> {
    let kept: BTreeMap<String, f64> = targets
        .iter()
        .filter(|(s, w)| w.is_finite() && **w > 0.0 && active.contains(*s))
        .map(|(s, w)| (s.clone(), *w))
        .collect();
    let total: f64 = kept.values().sum();
    if !(total.is_finite() && total > 0.0) {
        return BTreeMap::new();
    }
    kept.into_iter().map(|(s, w)| (s, w / total)).collect()
}
