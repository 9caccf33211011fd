//! Relative-volume spikes on up days.

use std::collections::BTreeMap;

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::indicator::relative_volume;
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub const FAMILY: &str = "volume-relative";

#[derive(Debug, Clone)]
pub struct VolumeSpike {
    variant: StrategyVariant,
    period: usize,
    threshold: f64,
    style: DecisionStyle,
}

impl VolumeSpike {
    pub fn new(period: usize, threshold: f64, style: DecisionStyle) -> Self {
        let period = period.max(1);
        let suffix = if style == DecisionStyle::Signal { "-signal" } else { "" };
        let variant = variant(
            FAMILY,
            format!("{FAMILY}-{period}-{threshold}{suffix}"),
            format!("Volume {threshold}x / {period}d{suffix}"),
            format!("Buys up days on volume above {threshold}x the {period}-day average"),
            &[("period", period as f64), ("threshold", threshold)],
        );
        VolumeSpike {
            variant,
            period,
            threshold,
            style,
        }
    }

    pub fn from_params(params: &Params, style: DecisionStyle) -> Self {
        Self::new(
            param(params, "period", 20.0) as usize,
            param(params, "threshold", 1.5),
            style,
        )
    }

    /// (excess relative volume, day change) when volume spiked today.
    fn spike(&self, window: &[Quote]) -> Option<(f64, f64)> {
        let ratio = relative_volume(window, self.period)?;
        let [.., prev, today] = window else {
            return None;
        };
        (ratio > self.threshold).then(|| (ratio - self.threshold, today.close - prev.close))
    }
}

impl Strategy for VolumeSpike {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        self.period.max(2)
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, self.lookback(), |w| {
            self.spike(w)
                .and_then(|(excess, change)| (change > 0.0).then_some(excess))
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, self.lookback(), |w| match self.spike(w) {
            Some((_, change)) if change > 0.0 => Signal::Buy,
            Some((_, change)) if change < 0.0 => Signal::Sell,
            _ => Signal::Hold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::quotes_from_closes;
    use crate::domain::strategy::test_support::market_at_end;

    fn with_spike(last_close: f64, last_volume: f64) -> Vec<Quote> {
        let mut closes = vec![100.0; 24];
        closes.push(last_close);
        let mut quotes = quotes_from_closes(&closes);
        if let Some(last) = quotes.last_mut() {
            last.volume = last_volume;
        }
        quotes
    }

    #[test]
    fn id() {
        let s = VolumeSpike::new(20, 1.5, DecisionStyle::Rebalance);
        assert_eq!(s.id(), "volume-relative-20-1.5");
    }

    #[test]
    fn spike_on_up_day_is_scored() {
        let s = VolumeSpike::new(20, 1.5, DecisionStyle::Rebalance);
        let mut map = BTreeMap::new();
        map.insert("AAA".to_string(), with_spike(105.0, 5_000.0));
        let market = MarketData::new(map, Vec::new());
        let mut cursors = Cursors::new();
        cursors.advance("AAA", 24);
        let weights = s.allocate(&["AAA".to_string()], &market, &cursors);
        assert!((weights["AAA"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quiet_volume_is_ignored() {
        let s = VolumeSpike::new(20, 1.5, DecisionStyle::Rebalance);
        let (market, cursors) = market_at_end("AAA", &[100.0; 25]);
        assert!(s.allocate(&["AAA".to_string()], &market, &cursors).is_empty());
    }

    #[test]
    fn signals_follow_day_direction() {
        let s = VolumeSpike::new(20, 2.0, DecisionStyle::Signal);
        assert_eq!(s.signal("T", &with_spike(105.0, 5_000.0), 24), Signal::Buy);
        assert_eq!(s.signal("T", &with_spike(95.0, 5_000.0), 24), Signal::Sell);
        assert_eq!(s.signal("T", &with_spike(105.0, 1_000.0), 24), Signal::Hold);
        assert_eq!(s.signal("T", &with_spike(105.0, 5_000.0), 10), Signal::Hold);
    }
}
