//! External forecaster plug-in for the model-driven strategy family.

use crate::domain::error::ArenaError;
use crate::domain::strategy::model::FactorFeatures;

/// A model that estimates the probability of a positive forward return.
///
/// Calls may be slow; the strategy wrapper memoizes results per
/// (symbol, date, model version) so a forecaster is asked at most once per
/// key.
pub trait ForecastPort: Send + Sync {
    /// Identifies the current model; cached forecasts are keyed by it.
    fn model_version(&self) -> String;

    /// Probability in [0, 1].
    fn predict(&self, features: &FactorFeatures) -> Result<f64, ArenaError>;
}
