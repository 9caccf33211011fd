//! Strategy abstraction and the built-in strategy families.
//!
//! A strategy decides in one of two styles:
//!
//! - **Rebalance**: [`Strategy::allocate`] returns target weights across a
//!   basket, applied by the engine every few trading days.
//! - **Signal**: [`Strategy::signal`] returns Buy/Sell/Hold for one symbol
//!   at one bar.
//!
//! Both are pure functions of their inputs. A strategy may only read
//! `history[..=cursor]`; [`visible_window`] is the one place that slice is
//! cut, and every family goes through it.

pub mod breakout;
pub mod hybrid;
pub mod mean_reversion;
pub mod model;
pub mod registry;
pub mod trend;
pub mod volume;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::cursor::Cursors;
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;

pub use registry::StrategyRegistry;

/// Maximum number of symbols kept by [`select_top`].
pub const MAX_SELECTED: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStyle {
    #[default]
    Rebalance,
    Signal,
}

/// Immutable description of one parameterized strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyVariant {
    pub id: String,
    pub family: String,
    pub name: String,
    pub description: String,
    pub params: BTreeMap<String, f64>,
}

impl StrategyVariant {
    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }
}

pub trait Strategy: Send + Sync {
    fn variant(&self) -> &StrategyVariant;

    fn style(&self) -> DecisionStyle {
        DecisionStyle::Rebalance
    }

    /// Quotes that must precede the cursor before the strategy will act.
    /// Any cursor below this yields `Hold` and an empty allocation.
    fn lookback(&self) -> usize;

    /// Target weights for the candidates. Empty means hold.
    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64>;

    fn signal(&self, symbol: &str, history: &[Quote], cursor: usize) -> Signal;

    /// Called once per tournament before any run starts.
    fn prepare(&self, _market: &MarketData) {}

    fn id(&self) -> &str {
        &self.variant().id
    }
}

/// `history[..=cursor]`, or `None` if the cursor is past the end.
pub fn visible_window(history: &[Quote], cursor: usize) -> Option<&[Quote]> {
    if cursor >= history.len() {
        return None;
    }
    Some(&history[..=cursor])
}

/// Keeps the best [`MAX_SELECTED`] positive finite scores and normalizes
/// them to weights summing to 1. Ties keep their input order.
pub fn select_top(scores: Vec<(String, f64)>) -> BTreeMap<String, f64> {
    let mut eligible: Vec<(String, f64)> = scores
        .into_iter()
        .filter(|(_, s)| s.is_finite() && *s > 0.0)
        .collect();
    eligible.sort_by(|a, b| b.1.total_cmp(&a.1));
    eligible.truncate(MAX_SELECTED);

    let total: f64 = eligible.iter().map(|(_, s)| s).sum();
    if !(total.is_finite() && total > 0.0) {
        return BTreeMap::new();
    }
    eligible.into_iter().map(|(sym, s)| (sym, s / total)).collect()
}

/// Scores every candidate whose cursor has reached `lookback` and runs the
/// result through [`select_top`].
pub fn allocate_by_score<F>(
    candidates: &[String],
    market: &MarketData,
    cursors: &Cursors,
    lookback: usize,
    score: F,
) -> BTreeMap<String, f64>
where
    F: Fn(&[Quote]) -> Option<f64>,
{
    let scores = candidates
        .iter()
        .filter_map(|symbol| {
            let series = market.get(symbol)?;
            let cursor = cursors.get(symbol)?;
            if cursor < lookback {
                return None;
            }
            let window = visible_window(&series.quotes, cursor)?;
            score(window).map(|s| (symbol.clone(), s))
        })
        .collect();
    select_top(scores)
}

/// Cuts the visible window and hands it to `decide` once the cursor has
/// reached `lookback`.
pub fn signal_after_lookback<F>(history: &[Quote], cursor: usize, lookback: usize, decide: F) -> Signal
where
    F: FnOnce(&[Quote]) -> Signal,
{
    if cursor < lookback {
        return Signal::Hold;
    }
    match visible_window(history, cursor) {
        Some(window) => decide(window),
        None => Signal::Hold,
    }
}

pub(crate) fn variant(
    family: &str,
    id: String,
    name: String,
    description: String,
    params: &[(&str, f64)],
) -> StrategyVariant {
    StrategyVariant {
        id,
        family: family.to_string(),
        name,
        description,
        params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::quotes_from_closes;

    fn scores(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn select_top_normalizes() {
        let weights = select_top(scores(&[("A", 1.0), ("B", 3.0)]));
        assert!((weights["A"] - 0.25).abs() < 1e-12);
        assert!((weights["B"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn select_top_drops_non_positive_and_nan() {
        let weights = select_top(scores(&[("A", 0.0), ("B", -1.0), ("C", f64::NAN), ("D", 2.0)]));
        assert_eq!(weights.len(), 1);
        assert!((weights["D"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn select_top_empty_when_nothing_positive() {
        assert!(select_top(scores(&[("A", -1.0), ("B", 0.0)])).is_empty());
        assert!(select_top(Vec::new()).is_empty());
    }

    #[test]
    fn select_top_caps_at_twenty() {
        let many: Vec<(String, f64)> = (0..30).map(|i| (format!("S{i:02}"), (i + 1) as f64)).collect();
        let weights = select_top(many);
        assert_eq!(weights.len(), MAX_SELECTED);
        // lowest ten scores are dropped
        assert!(!weights.contains_key("S00"));
        assert!(!weights.contains_key("S09"));
        assert!(weights.contains_key("S10"));
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn select_top_ties_keep_input_order() {
        let many: Vec<(String, f64)> = (0..25).map(|i| (format!("S{i:02}"), 1.0)).collect();
        let weights = select_top(many);
        assert!(weights.contains_key("S00"));
        assert!(weights.contains_key("S19"));
        assert!(!weights.contains_key("S20"));
    }

    #[test]
    fn visible_window_bounds() {
        let quotes = quotes_from_closes(&[1.0, 2.0, 3.0]);
        assert_eq!(visible_window(&quotes, 0).unwrap().len(), 1);
        assert_eq!(visible_window(&quotes, 2).unwrap().len(), 3);
        assert!(visible_window(&quotes, 3).is_none());
    }

    #[test]
    fn signal_holds_before_lookback() {
        let quotes = quotes_from_closes(&[1.0, 2.0, 3.0]);
        let s = signal_after_lookback(&quotes, 1, 3, |_| Signal::Buy);
        assert_eq!(s, Signal::Hold);
        let s = signal_after_lookback(&quotes, 2, 3, |_| Signal::Buy);
        assert_eq!(s, Signal::Hold);
        let s = signal_after_lookback(&quotes, 2, 2, |_| Signal::Buy);
        assert_eq!(s, Signal::Buy);
    }

    #[test]
    fn allocation_waits_for_cursor_to_reach_lookback() {
        // cursor sits on index 3
        let (market, cursors) = test_support::market_at_end("AAA", &[1.0, 2.0, 3.0, 4.0]);
        let candidates = vec!["AAA".to_string()];
        let score = |_: &[Quote]| Some(1.0);
        assert!(allocate_by_score(&candidates, &market, &cursors, 4, score).is_empty());

        let weights = allocate_by_score(&candidates, &market, &cursors, 3, score);
        assert!((weights["AAA"] - 1.0).abs() < 1e-12);
    }
}
