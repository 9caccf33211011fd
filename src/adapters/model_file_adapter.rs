//! ForecastPort over logistic weights stored as JSON.
//!
//! The weights are loaded on first use and re-read once they are older than
//! the refresh interval, so a retrained model can be dropped in place while
//! a long tournament runs. Readers share an `RwLock`; a separate mutex makes
//! sure only one thread re-reads the file when the cached copy goes stale.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::domain::error::ArenaError;
use crate::domain::strategy::model::{FactorFeatures, LogisticWeights};
use crate::ports::forecast_port::ForecastPort;

#[derive(Debug, Clone)]
struct Loaded {
    weights: LogisticWeights,
    loaded_at: Instant,
}

impl Loaded {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

#[derive(Debug)]
pub struct ModelFileAdapter {
    path: PathBuf,
    refresh: Duration,
    current: RwLock<Option<Loaded>>,
    reload: Mutex<()>,
}

impl ModelFileAdapter {
    pub fn new<P: AsRef<Path>>(path: P, refresh: Duration) -> Self {
        ModelFileAdapter {
            path: path.as_ref().to_path_buf(),
            refresh,
            current: RwLock::new(None),
            reload: Mutex::new(()),
        }
    }

    fn cached(&self) -> Option<Loaded> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn read_file(&self) -> Result<LogisticWeights, ArenaError> {
        let content = fs::read_to_string(&self.path).map_err(|e| ArenaError::Model {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let weights: LogisticWeights =
            serde_json::from_str(&content).map_err(|e| ArenaError::Model {
                reason: format!("invalid weights in {}: {}", self.path.display(), e),
            })?;
        let coefficients = [
            weights.intercept,
            weights.rsi,
            weights.sma_ratio,
            weights.atr_pct,
            weights.relative_volume,
        ];
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArenaError::Model {
                reason: format!("non-finite coefficient in {}", self.path.display()),
            });
        }
        Ok(weights)
    }

    /// Current weights, re-reading the file when the cached copy is stale.
    ///
    /// A failed re-read keeps serving the previous weights; only a failure
    /// with nothing cached is an error.
    pub fn load(&self) -> Result<LogisticWeights, ArenaError> {
        if let Some(loaded) = self.cached() {
            if loaded.is_fresh(self.refresh) {
                return Ok(loaded.weights);
            }
        }

        let _guard = self.reload.lock().unwrap_or_else(|e| e.into_inner());

        // another thread may have refreshed while we waited
        let stale = self.cached();
        if let Some(loaded) = &stale {
            if loaded.is_fresh(self.refresh) {
                return Ok(loaded.weights.clone());
            }
        }

        match self.read_file() {
            Ok(weights) => {
                tracing::debug!(path = %self.path.display(), version = %weights.version, "model weights loaded");
                let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
                *current = Some(Loaded {
                    weights: weights.clone(),
                    loaded_at: Instant::now(),
                });
                Ok(weights)
            }
            Err(e) => match stale {
                Some(loaded) => {
                    tracing::warn!(error = %e, version = %loaded.weights.version, "model refresh failed, keeping previous weights");
                    Ok(loaded.weights)
                }
                None => Err(e),
            },
        }
    }
}

impl ForecastPort for ModelFileAdapter {
    fn model_version(&self) -> String {
        match self.load() {
            Ok(weights) => weights.version,
            Err(_) => "unavailable".to_string(),
        }
    }

    fn predict(&self, features: &FactorFeatures) -> Result<f64, ArenaError> {
        Ok(self.load()?.probability(features))
    }
}
