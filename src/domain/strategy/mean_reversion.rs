//! RSI mean reversion. Buys oversold symbols, exits once the oscillator
//! reaches the mirrored overbought level (100 - oversold).

use std::collections::BTreeMap;

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::indicator::rsi;
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub const FAMILY: &str = "mean-reversion-rsi";

#[derive(Debug, Clone)]
pub struct RsiReversion {
    variant: StrategyVariant,
    period: usize,
    oversold: f64,
    style: DecisionStyle,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, style: DecisionStyle) -> Self {
        let period = period.max(1);
        let suffix = if style == DecisionStyle::Signal { "-signal" } else { "" };
        let variant = variant(
            FAMILY,
            format!("{FAMILY}-{period}-{oversold}{suffix}"),
            format!("RSI({period}) < {oversold}{suffix}"),
            format!("Buys symbols whose {period}-day RSI is below {oversold}"),
            &[("period", period as f64), ("oversold", oversold)],
        );
        RsiReversion {
            variant,
            period,
            oversold,
            style,
        }
    }

    pub fn from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(
            param(params, "period", 14.0) as usize,
            param(params, "oversold", 30.0),
            style,
        )
    }

    fn overbought(&self) -> f64 {
        100.0 - self.oversold
    }
}

impl Strategy for RsiReversion {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, self.lookback(), |w| {
            let value = rsi(w, self.period)?;
            (value < self.oversold).then(|| self.oversold - value)
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.lookback(), |w| match rsi(w, self.period) {
            Some(v) if v < self.oversold => Signal::Buy,
            Some(v) if v > self.overbought() => Signal::Sell,
            _ => Signal::Hold,
        })
    }
}
