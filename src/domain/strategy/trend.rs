//! Trend following: close versus a simple or exponential moving average.
//!
//! Score is the normalized distance of the close above the average. In
//! signal style the strategy buys above the average and sells below it.

use std::collections::BTreeMap;

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::indicator::{ema, sma};
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub const SMA_FAMILY: &str = "trend-sma";
pub const EMA_FAMILY: &str = "trend-ema";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    Simple,
    Exponential,
}

impl Average {
    fn value(self, quotes: &[Quote], period: usize) -> Option<f64> {
        match self {
            Average::Simple => sma(quotes, period),
            Average::Exponential => ema(quotes, period),
        }
    }

    fn family(self) -> &'static str {
        match self {
            Average::Simple => SMA_FAMILY,
            Average::Exponential => EMA_FAMILY,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Average::Simple => "SMA",
            Average::Exponential => "EMA",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendFollowing {
    variant: StrategyVariant,
    average: Average,
    period: usize,
    style: DecisionStyle,
}

impl TrendFollowing {
    pub fn new(average: Average, period: usize, style: DecisionStyle) -> Self {
        let period = period.max(1);
        let suffix = match style {
            DecisionStyle::Rebalance => "",
            DecisionStyle::Signal => "-signal",
        };
        let variant = variant(
            average.family(),
            format!("{}-{period}{suffix}", average.family()),
            format!("{} Trend {period}{suffix}", average.label()),
            format!(
                "Favors symbols closing above their {period}-day {}",
                average.label()
            ),
            &[("lookback", period as f64)],
        );
        TrendFollowing {
            variant,
            average,
            period,
            style,
        }
    }

    pub fn sma_from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(Average::Simple, param(params, "lookback", 50.0) as usize, style)
    }

    pub fn ema_from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(Average::Exponential, param(params, "lookback", 20.0) as usize, style)
    }

    fn distance(&self, window: &[Quote]) -> Option<f64> {
        let avg = self.average.value(window, self.period)?;
        let close = window.last()?.close;
        if avg <= 0.0 {
            return None;
        }
        Some((close - avg) / avg)
    }
}

impl Strategy for TrendFollowing {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, self.period, |w| {
            self.distance(w).filter(|d| *d > 0.0)
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.period, |w| match self.distance(w) {
            Some(d) if d > 0.0 => Signal::Buy,
            Some(d) if d < 0.0 => Signal::Sell,
            _ => Signal::Hold,
        })
    }
}
