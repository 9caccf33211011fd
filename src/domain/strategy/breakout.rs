//! Breakout families: close above the prior rolling high, or above the
//! upper Bollinger band.

use std::collections::BTreeMap;

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::indicator::{bollinger, highest_high, lowest_low};
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub const HIGH_FAMILY: &str = "breakout-high";
pub const BAND_FAMILY: &str = "breakout-band";

fn suffix(style: DecisionStyle) -> &'static str {
    match style {
        DecisionStyle::Rebalance => "",
        DecisionStyle::Signal => "-signal",
    }
}

/// Channel breakout. The channel excludes today's quote so a new high can
/// break it; exits use a channel of half the lookback.
#[derive(Debug, Clone)]
pub struct RollingHighBreakout {
    variant: StrategyVariant,
    lookback: usize,
    style: DecisionStyle,
}

impl RollingHighBreakout {
    pub fn new(lookback: usize, style: DecisionStyle) -> Self {
        let lookback = lookback.max(2);
        let variant = variant(
            HIGH_FAMILY,
            format!("{HIGH_FAMILY}-{lookback}{}", suffix(style)),
            format!("{lookback}-Day High Breakout{}", suffix(style)),
            format!("Buys closes above the prior {lookback}-day high"),
            &[("lookback", lookback as f64)],
        );
        RollingHighBreakout {
            variant,
            lookback,
            style,
        }
    }

    pub fn from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(param(params, "lookback", 20.0) as usize, style)
    }

    fn exit_period(&self) -> usize {
        (self.lookback / 2).max(1)
    }

    fn breakout(&self, window: &[Quote]) -> Option<f64> {
        let (today, prior) = window.split_last()?;
        let high = highest_high(prior, self.lookback)?;
        if high <= 0.0 {
            return None;
        }
        Some((today.close - high) / high)
    }
}

impl Strategy for RollingHighBreakout {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        self.lookback + 1
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, self.lookback(), |w| {
            self.breakout(w).filter(|b| *b > 0.0)
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.lookback(), |w| {
            if self.breakout(w).is_some_and(|b| b > 0.0) {
                return Signal::Buy;
            }
            let Some((today, prior)) = w.split_last() else {
                return Signal::Hold;
            };
            match lowest_low(prior, self.exit_period()) {
                Some(low) if today.close < low => Signal::Sell,
                _ => Signal::Hold,
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct BandBreakout {
    variant: StrategyVariant,
    period: usize,
    multiplier: f64,
    style: DecisionStyle,
}

impl BandBreakout {
    pub fn new(period: usize, multiplier: f64, style: DecisionStyle) -> Self {
        let period = period.max(2);
        let variant = variant(
            BAND_FAMILY,
            format!("{BAND_FAMILY}-{period}-{multiplier}{}", suffix(style)),
            format!("Bollinger({period}, {multiplier}) Breakout{}", suffix(style)),
            format!("Buys closes above the upper {period}-day band at {multiplier} sigma"),
            &[("period", period as f64), ("multiplier", multiplier)],
        );
        BandBreakout {
            variant,
            period,
            multiplier,
            style,
        }
    }

    pub fn from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(
            param(params, "period", 20.0) as usize,
            param(params, "multiplier", 2.0),
            style,
        )
    }
}

impl Strategy for BandBreakout {
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
            let bands = bollinger(w, self.period, self.multiplier)?;
            let close = w.last()?.close;
            (bands.upper > 0.0 && close > bands.upper).then(|| (close - bands.upper) / bands.upper)
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.period, |w| {
            let (Some(bands), Some(last)) = (bollinger(w, self.period, self.multiplier), w.last())
            else {
                return Signal::Hold;
            };
            if last.close > bands.upper {
                Signal::Buy
            } else if last.close < bands.middle {
                Signal::Sell
            } else {
                Signal::Hold
            }
        })
    }
}
