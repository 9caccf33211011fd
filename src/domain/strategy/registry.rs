//! Registry of strategy families keyed by a stable identifier.
//!
//! Each family carries its constructor and an explicit parameter sweep.
//! [`StrategyRegistry::catalog`] expands every sweep (plus one signal-style
//! variant per family) into concrete strategies in registration order, so
//! the catalog and its ids are the same on every call.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::breakout::{self, BandBreakout, RollingHighBreakout};
use super::hybrid::{self, TrendRsiGuard};
use super::mean_reversion::{self, RsiReversion};
use super::model::{self, ForecastCache, LogisticFactorModel, ModelDriven};
use super::trend::{self, TrendFollowing};
use super::volume::{self, VolumeSpike};
use super::{DecisionStyle, Strategy};
use crate::domain::error::ArenaError;
use crate::ports::forecast_port::ForecastPort;

pub type Params = BTreeMap<String, f64>;

pub fn param(params: &Params, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

pub fn params(pairs: &[(&str, f64)]) -> Params {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Shared collaborators handed to every constructor.
#[derive(Clone)]
pub struct BuildContext {
    pub forecaster: Arc<dyn ForecastPort>,
    pub cache: Arc<ForecastCache>,
}

type Constructor = Arc<dyn Fn(&Params, DecisionStyle, &BuildContext) -> Arc<dyn Strategy> + Send + Sync>;

#[derive(Clone)]
pub struct FamilyEntry {
    pub id: String,
    pub sweep: Vec<Params>,
    /// Parameters of the family's signal-style variant, if it has one.
    pub signal_params: Option<Params>,
    constructor: Constructor,
}

#[derive(Clone)]
pub struct StrategyRegistry {
    families: Vec<FamilyEntry>,
    context: BuildContext,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("families", &self.families.iter().map(|e| &e.id).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StrategyRegistry {
    /// A registry with no families, using the built-in forecaster.
    pub fn empty() -> Self {
        StrategyRegistry {
            families: Vec::new(),
            context: BuildContext {
                forecaster: Arc::new(LogisticFactorModel::default()),
                cache: Arc::new(ForecastCache::new()),
            },
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.register(
            trend::SMA_FAMILY,
            [20.0, 50.0, 100.0, 200.0]
                .iter()
                .map(|&n| params(&[("lookback", n)]))
                .collect(),
            Some(params(&[("lookback", 50.0)])),
            |p, style, _| Arc::new(TrendFollowing::sma_from_params(p, style)),
        );
        registry.register(
            trend::EMA_FAMILY,
            [10.0, 20.0, 50.0]
                .iter()
                .map(|&n| params(&[("lookback", n)]))
                .collect(),
            Some(params(&[("lookback", 20.0)])),
            |p, style, _| Arc::new(TrendFollowing::ema_from_params(p, style)),
        );
        registry.register(
            mean_reversion::FAMILY,
            grid("period", &[7.0, 14.0, 21.0], "oversold", &[25.0, 30.0]),
            Some(params(&[("period", 14.0), ("oversold", 30.0)])),
            |p, style, _| Arc::new(RsiReversion::from_params(p, style)),
        );
        registry.register(
            breakout::HIGH_FAMILY,
            [20.0, 55.0]
                .iter()
                .map(|&n| params(&[("lookback", n)]))
                .collect(),
            Some(params(&[("lookback", 20.0)])),
            |p, style, _| Arc::new(RollingHighBreakout::from_params(p, style)),
        );
        registry.register(
            breakout::BAND_FAMILY,
            grid("period", &[20.0], "multiplier", &[2.0, 2.5]),
            Some(params(&[("period", 20.0), ("multiplier", 2.0)])),
            |p, style, _| Arc::new(BandBreakout::from_params(p, style)),
        );
        registry.register(
            hybrid::FAMILY,
            grid("trend", &[50.0, 100.0], "overbought", &[70.0, 80.0]),
            Some(params(&[("trend", 50.0), ("overbought", 70.0)])),
            |p, style, _| Arc::new(TrendRsiGuard::from_params(p, style)),
        );
        registry.register(
            volume::FAMILY,
            grid("period", &[20.0], "threshold", &[1.5, 2.0]),
            Some(params(&[("period", 20.0), ("threshold", 1.5)])),
            |p, style, _| Arc::new(VolumeSpike::from_params(p, style)),
        );
        registry.register(
            model::FAMILY,
            [0.55, 0.6]
                .iter()
                .map(|&t| params(&[("threshold", t)]))
                .collect(),
            Some(params(&[("threshold", 0.55)])),
            |p, style, ctx| {
                Arc::new(ModelDriven::from_params(
                    p,
                    style,
                    Arc::clone(&ctx.forecaster),
                    Arc::clone(&ctx.cache),
                ))
            },
        );

        registry
    }

    /// Adds a family, replacing any family already registered under `id`.
    pub fn register<F>(
        &mut self,
        id: &str,
        sweep: Vec<Params>,
        signal_params: Option<Params>,
        constructor: F,
    ) -> &mut Self
    where
        F: Fn(&Params, DecisionStyle, &BuildContext) -> Arc<dyn Strategy> + Send + Sync + 'static,
    {
        let entry = FamilyEntry {
            id: id.to_string(),
            sweep,
            signal_params,
            constructor: Arc::new(constructor),
        };
        match self.families.iter_mut().find(|f| f.id == id) {
            Some(existing) => *existing = entry,
            None => self.families.push(entry),
        }
        self
    }

    /// Injects an external forecaster for the model-driven family.
    pub fn with_forecaster(mut self, forecaster: Arc<dyn ForecastPort>) -> Self {
        self.context.forecaster = forecaster;
        self
    }

    pub fn forecast_cache(&self) -> Arc<ForecastCache> {
        Arc::clone(&self.context.cache)
    }

    pub fn families(&self) -> impl Iterator<Item = &FamilyEntry> {
        self.families.iter()
    }

    /// Every variant of every family, in registration order.
    pub fn catalog(&self) -> Vec<Arc<dyn Strategy>> {
        let mut catalog = Vec::new();
        for family in &self.families {
            for p in &family.sweep {
                catalog.push((family.constructor)(p, DecisionStyle::Rebalance, &self.context));
            }
            if let Some(p) = &family.signal_params {
                catalog.push((family.constructor)(p, DecisionStyle::Signal, &self.context));
            }
        }
        catalog
    }

    pub fn build(&self, id: &str) -> Result<Arc<dyn Strategy>, ArenaError> {
        self.catalog()
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| ArenaError::UnknownStrategy { id: id.to_string() })
    }
}

fn grid(a: &str, a_values: &[f64], b: &str, b_values: &[f64]) -> Vec<Params> {
    a_values
        .iter()
        .flat_map(|&x| b_values.iter().map(move |&y| params(&[(a, x), (b, y)])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn default_catalog_shape() {
        let catalog = StrategyRegistry::with_defaults().catalog();
        // 25 swept variants + one signal variant for each of 8 families
        assert_eq!(catalog.len(), 33);
        let signal = catalog
            .iter()
            .filter(|s| s.style() == DecisionStyle::Signal)
            .count();
        assert_eq!(signal, 8);
    }

    #[test]
    fn ids_are_unique_and_stable() {
        let registry = StrategyRegistry::with_defaults();
        let first: Vec<String> = registry.catalog().iter().map(|s| s.id().to_string()).collect();
        let second: Vec<String> = registry.catalog().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(first, second);
        let unique: BTreeSet<&String> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
        assert_eq!(first[0], "trend-sma-20");
        assert!(first.contains(&"mean-reversion-rsi-21-25".to_string()));
        assert!(first.contains(&"multi-factor-model-0.6".to_string()));
    }

    #[test]
    fn build_by_id() {
        let registry = StrategyRegistry::with_defaults();
        let s = registry.build("breakout-band-20-2.5").unwrap();
        assert_eq!(s.variant().family, "breakout-band");
        assert!((s.variant().param("multiplier").unwrap() - 2.5).abs() < f64::EPSILON);
        assert!(matches!(
            registry.build("nope"),
            Err(ArenaError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn register_replaces_family() {
        let mut registry = StrategyRegistry::empty();
        registry.register(
            trend::SMA_FAMILY,
            vec![params(&[("lookback", 10.0)])],
            None,
            |p, style, _| Arc::new(TrendFollowing::sma_from_params(p, style)),
        );
        registry.register(
            trend::SMA_FAMILY,
            vec![params(&[("lookback", 30.0)])],
            None,
            |p, style, _| Arc::new(TrendFollowing::sma_from_params(p, style)),
        );
        let ids: Vec<String> = registry.catalog().iter().map(|s| s.id().to_string()).collect();
        assert_eq!(ids, vec!["trend-sma-30".to_string()]);
    }

    #[test]
    fn injected_forecaster_is_used() {
        let weights = model::LogisticWeights {
            version: "custom-7".into(),
            ..Default::default()
        };
        let registry = StrategyRegistry::with_defaults()
            .with_forecaster(Arc::new(LogisticFactorModel::new(weights)));
        let ctx = &registry.context;
        assert_eq!(ctx.forecaster.model_version(), "custom-7");
        assert!(registry.build("multi-factor-model-0.55").is_ok());
    }
}
