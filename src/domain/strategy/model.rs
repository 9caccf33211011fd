//! Model-driven strategy family.
//!
//! Four factor features are computed from the visible window and handed to
//! a [`ForecastPort`], which returns the probability that the close 5 days
//! ahead is more than 0.5% above today's. Forecasts are memoized in a
//! [`ForecastCache`] keyed by (symbol, date, model version) so the
//! simulation loop never waits on the forecaster twice for the same bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::registry::{Params, param};
use super::{
    DecisionStyle, Signal, Strategy, StrategyVariant, allocate_by_score, signal_after_lookback,
    variant,
};
use crate::domain::cursor::Cursors;
use crate::domain::error::ArenaError;
use crate::domain::indicator::{atr, cutler_rsi, relative_volume, sma};
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;
use crate::ports::forecast_port::ForecastPort;

pub const FAMILY: &str = "multi-factor-model";

/// The 200-day SMA in the trend factor sets the warmup.
pub const FEATURE_LOOKBACK: usize = 200;

/// Forecast horizon and hurdle the model is trained against.
pub const FORWARD_DAYS: usize = 5;
pub const FORWARD_RETURN_HURDLE: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorFeatures {
    /// RSI(14) over plain 14-day means of gains and losses, 0..100.
    pub rsi_14: f64,
    /// SMA(50) / SMA(200).
    pub sma_ratio: f64,
    /// Mean true range over 14 days / close.
    pub atr_pct: f64,
    /// Volume / SMA(volume, 20).
    pub relative_volume: f64,
}

impl FactorFeatures {
    /// Features at the last quote of `window`, or `None` during warmup.
    /// Every factor is a plain rolling mean, matching how model weights are
    /// trained offline.
    pub fn compute(window: &[Quote]) -> Option<Self> {
        if window.len() < FEATURE_LOOKBACK {
            return None;
        }
        let close = window.last()?.close;
        let long = sma(window, 200)?;
        if close <= 0.0 || long <= 0.0 {
            return None;
        }
        let features = FactorFeatures {
            rsi_14: cutler_rsi(window, 14)?,
            sma_ratio: sma(window, 50)? / long,
            atr_pct: atr(window, 14)? / close,
            relative_volume: relative_volume(window, 20)?,
        };
        features.is_finite().then_some(features)
    }

    fn is_finite(&self) -> bool {
        self.rsi_14.is_finite()
            && self.sma_ratio.is_finite()
            && self.atr_pct.is_finite()
            && self.relative_volume.is_finite()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticWeights {
    pub version: String,
    pub intercept: f64,
    pub rsi: f64,
    pub sma_ratio: f64,
    pub atr_pct: f64,
    pub relative_volume: f64,
}

impl Default for LogisticWeights {
    fn default() -> Self {
        LogisticWeights {
            version: "logit-v1".to_string(),
            intercept: 0.2,
            rsi: -1.5,
            sma_ratio: 4.0,
            atr_pct: -8.0,
            relative_volume: 0.3,
        }
    }
}

impl LogisticWeights {
    /// sigmoid(b + w · x) over centered features.
    pub fn probability(&self, f: &FactorFeatures) -> f64 {
        let z = self.intercept
            + self.rsi * (f.rsi_14 - 50.0) / 50.0
            + self.sma_ratio * (f.sma_ratio - 1.0)
            + self.atr_pct * f.atr_pct
            + self.relative_volume * (f.relative_volume - 1.0);
        1.0 / (1.0 + (-z).exp())
    }
}

/// Built-in forecaster with fixed coefficients, so the catalog always has a
/// model entry even without an external model.
#[derive(Debug, Clone, Default)]
pub struct LogisticFactorModel {
    weights: LogisticWeights,
}

impl LogisticFactorModel {
    pub fn new(weights: LogisticWeights) -> Self {
        LogisticFactorModel { weights }
    }
}

impl ForecastPort for LogisticFactorModel {
    fn model_version(&self) -> String {
        self.weights.version.clone()
    }

    fn predict(&self, features: &FactorFeatures) -> Result<f64, ArenaError> {
        Ok(self.weights.probability(features))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastKey {
    pub symbol: String,
    pub date: NaiveDate,
    pub model_version: String,
}

#[derive(Debug, Default)]
pub struct ForecastCache {
    entries: RwLock<HashMap<ForecastKey, f64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ForecastKey) -> Option<f64> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let found = entries.get(key).copied();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: ForecastKey, probability: f64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, probability);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

pub struct ModelDriven {
    variant: StrategyVariant,
    threshold: f64,
    style: DecisionStyle,
    forecaster: Arc<dyn ForecastPort>,
    cache: Arc<ForecastCache>,
}

impl std::fmt::Debug for ModelDriven {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDriven")
            .field("variant", &self.variant)
            .field("threshold", &self.threshold)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl ModelDriven {
    pub fn new(
        threshold: f64,
        style: DecisionStyle,
        forecaster: Arc<dyn ForecastPort>,
        cache: Arc<ForecastCache>,
    ) -> Self {
        let suffix = if style == DecisionStyle::Signal { "-signal" } else { "" };
        let variant = variant(
            FAMILY,
            format!("{FAMILY}-{threshold}{suffix}"),
            format!("Multi-Factor Model p > {threshold}{suffix}"),
            format!(
                "Buys when the forecast probability of a {FORWARD_DAYS}-day gain above 0.5% exceeds {threshold}"
            ),
            &[("threshold", threshold)],
        );
        ModelDriven {
            variant,
            threshold,
            style,
            forecaster,
            cache,
        }
    }

    pub fn from_params(
        params: &Params,
        style: DecisionStyle,
        forecaster: Arc<dyn ForecastPort>,
        cache: Arc<ForecastCache>,
    ) -> Self {
        Self::new(param(params, "threshold", 0.55), style, forecaster, cache)
    }

    /// Cached forecast for the last quote of `window`.
    fn forecast(&self, window: &[Quote]) -> Option<f64> {
        let last = window.last()?;
        let key = ForecastKey {
            symbol: last.symbol.clone(),
            date: last.date,
            model_version: self.forecaster.model_version(),
        };
        if let Some(p) = self.cache.get(&key) {
            return Some(p);
        }
        let features = FactorFeatures::compute(window)?;
        match self.forecaster.predict(&features) {
            Ok(p) if p.is_finite() => {
                self.cache.insert(key, p);
                Some(p)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(symbol = %last.symbol, date = %last.date, error = %e, "forecast failed");
                None
            }
        }
    }
}

impl Strategy for ModelDriven {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn style(&self) -> DecisionStyle {
        self.style
    }

    fn lookback(&self) -> usize {
        FEATURE_LOOKBACK
    }

    fn allocate(
        &self,
        candidates: &[String],
        market: &MarketData,
        cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        allocate_by_score(candidates, market, cursors, FEATURE_LOOKBACK, |w| {
            self.forecast(w)
                .map(|p| p - self.threshold)
                .filter(|s| *s > 0.0)
        })
    }

    fn signal(&self, _symbol: &str, history: &[Quote], cursor: usize) -> Signal {
        signal_after_lookback(history, cursor, FEATURE_LOOKBACK, |w| match self.forecast(w) {
            Some(p) if p > self.threshold => Signal::Buy,
            Some(p) if p < 1.0 - self.threshold => Signal::Sell,
            _ => Signal::Hold,
        })
    }

    /// Fills the cache for every symbol and date with a full feature window.
    fn prepare(&self, market: &MarketData) {
        let before = self.cache.len();
        for series in market.series.values() {
            // windows ending at cursor FEATURE_LOOKBACK and later
            for end in FEATURE_LOOKBACK + 1..=series.quotes.len() {
                self.forecast(&series.quotes[..end]);
            }
        }
        tracing::debug!(
            strategy = %self.variant.id,
            added = self.cache.len().saturating_sub(before),
            "forecast cache warmed"
        );
    }
}
