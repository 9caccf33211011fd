//! Trend filter plus overbought guard: buy only when the close is above its
//! trend average and RSI(14) is below the overbought level.

use std::collections::BTreeMap;

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::indicator::{rsi, sma};
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub const FAMILY: &str = "hybrid-trend-rsi";
pub const RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct TrendRsiGuard {
    variant: StrategyVariant,
    trend: usize,
    overbought: f64,
    style: DecisionStyle,
}

impl TrendRsiGuard {
    pub fn new(trend: usize, overbought: f64, style: DecisionStyle) -> Self {
        let trend = trend.max(1);
        let suffix = if style == DecisionStyle::Signal { "-signal" } else { "" };
        let variant = variant(
            FAMILY,
            format!("{FAMILY}-{trend}-{overbought}{suffix}"),
            format!("Trend {trend} / RSI < {overbought}{suffix}"),
            format!(
                "Buys symbols above their {trend}-day SMA unless RSI({RSI_PERIOD}) exceeds {overbought}"
            ),
            &[("trend", trend as f64), ("overbought", overbought)],
        );
        TrendRsiGuard {
            variant,
            trend,
            overbought,
            style,
        }
    }

    pub fn from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(
            param(params, "trend", 50.0) as usize,
            param(params, "overbought", 70.0),
            style,
        )
    }

    /// Trend distance when trending and not overbought.
    fn score(&self, window: &[Quote]) -> Option<f64> {
        let avg = sma(window, self.trend)?;
        let close = window.last()?.close;
        let momentum = rsi(window, RSI_PERIOD)?;
        if avg <= 0.0 || close <= avg || momentum >= self.overbought {
            return None;
        }
        Some((close - avg) / avg)
    }
}

impl Strategy for TrendRsiGuard {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        self.trend.max(RSI_PERIOD + 1)
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, self.lookback(), |w| self.score(w))
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.lookback(), |w| {
            if self.score(w).is_some() {
                return Signal::Buy;
            }
            match (sma(w, self.trend), w.last()) {
                (Some(avg), Some(last)) if last.close < avg => Signal::Sell,
                _ => Signal::Hold,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::quotes_from_closes;
    use crate::domain::strategy::test_support::{falling, market_at_end, rising};

    /// Uptrend with pullbacks: +4, -2 alternating keeps RSI well below 80.
    fn choppy_uptrend(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + i as f64 - if i % 2 == 1 { 3.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn id_and_lookback() {
        let s = TrendRsiGuard::new(50, 70.0, DecisionStyle::Rebalance);
        assert_eq!(s.id(), "hybrid-trend-rsi-50-70");
        assert_eq!(s.lookback(), 50);
    }

    #[test]
    fn trending_and_not_overbought_is_bought() {
        let s = TrendRsiGuard::new(50, 80.0, DecisionStyle::Rebalance);
        let (market, cursors) = market_at_end("AAA", &choppy_uptrend(80));
        let weights = s.allocate(&["AAA".to_string()], &market, &cursors);
        assert!((weights["AAA"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn overbought_guard_blocks_entry() {
        let s = TrendRsiGuard::new(50, 80.0, DecisionStyle::Rebalance);
        let (market, cursors) = market_at_end("AAA", &rising(80));
        assert!(s.allocate(&["AAA".to_string()], &market, &cursors).is_empty());
    }

    #[test]
    fn signals() {
        let s = TrendRsiGuard::new(50, 80.0, DecisionStyle::Signal);
        assert_eq!(s.signal("T", &quotes_from_closes(&choppy_uptrend(80)), 79), Signal::Buy);
        assert_eq!(s.signal("T", &quotes_from_closes(&falling(80)), 79), Signal::Sell);
        assert_eq!(s.signal("T", &quotes_from_closes(&rising(80)), 79), Signal::Hold);
        assert_eq!(s.signal("T", &quotes_from_closes(&rising(80)), 40), Signal::Hold);
    }
}
