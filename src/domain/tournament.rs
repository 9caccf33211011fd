//! Walk-forward strategy tournament.
//!
//! The catalog is backtested on the train window, the best by alpha are
//! re-run on the held-out test window, and the test results are ranked by a
//! composite score. Runs execute on blocking threads under a semaphore cap;
//! they share only the `Arc<MarketData>` snapshot.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::backtest::{BacktestConfig, BacktestWindow, run_backtest};
use super::error::{BacktestError, TournamentError};
use super::market_data::MarketData;
use super::metrics::BacktestResult;
use super::strategy::{Strategy, StrategyRegistry};

/// Weight applied to the capped Sharpe ratio in the ranking score.
pub const SHARPE_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitPolicy {
    /// Share of the timeline used for training.
    pub ratio: f64,
    /// Minimum number of test dates once the split is forced.
    pub min_test_dates: usize,
    /// The split is only forced when there are more dates than this.
    pub forced_split_threshold: usize,
    /// Fewer dates than this aborts the tournament.
    pub min_history_dates: usize,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy {
            ratio: 0.8,
            min_test_dates: 20,
            forced_split_threshold: 40,
            min_history_dates: 50,
        }
    }
}

/// Index of the split date in a timeline of `n` dates.
///
/// ⌊n × ratio⌋, moved earlier so the test tail has `min_test_dates` when
/// it would be shorter and `n` exceeds the forced-split threshold.
pub fn split_index(n: usize, policy: &SplitPolicy) -> usize {
    let mut idx = (n as f64 * policy.ratio).floor() as usize;
    idx = idx.min(n.saturating_sub(1));
    if n - idx < policy.min_test_dates && n > policy.forced_split_threshold {
        idx = n.saturating_sub(policy.min_test_dates);
    }
    idx
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentConfig {
    /// Upper bound on concurrent runs, further capped by the hardware.
    pub max_workers: usize,
    pub finalists: usize,
    pub target_return_pct: f64,
    /// Alpha penalty per executed trade, in percentage points.
    pub per_trade_cost_pct: f64,
    pub sharpe_cap: f64,
    pub target_bonus: f64,
    pub split: SplitPolicy,
    pub backtest: BacktestConfig,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        TournamentConfig {
            max_workers: 4,
            finalists: 10,
            target_return_pct: 10.0,
            per_trade_cost_pct: 0.4,
            sharpe_cap: 3.0,
            target_bonus: 20.0,
            split: SplitPolicy::default(),
            backtest: BacktestConfig::default(),
        }
    }
}

impl TournamentConfig {
    /// `max_workers` clamped to [1, available parallelism].
    pub fn effective_workers(&self) -> usize {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_workers.clamp(1, hardware.max(1))
    }

    /// Fee-adjusted alpha plus the capped Sharpe term plus the target bonus.
    pub fn score(&self, result: &BacktestResult) -> f64 {
        let fee_adjusted_alpha = result.alpha - result.total_trades as f64 * self.per_trade_cost_pct;
        let bonus = if result.return_pct >= self.target_return_pct {
            self.target_bonus
        } else {
            0.0
        };
        fee_adjusted_alpha + result.sharpe.min(self.sharpe_cap) * SHARPE_WEIGHT + bonus
    }

    /// Scores and sorts descending. Equal scores keep their input order.
    pub fn rank(&self, results: Vec<BacktestResult>) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = results
            .into_iter()
            .map(|result| RankedResult {
                score: self.score(&result),
                result,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train => write!(f, "train"),
            Phase::Test => write!(f, "test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub result: BacktestResult,
    pub score: f64,
}

/// A run that produced no result. Excluded from ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub strategy_id: String,
    pub phase: Phase,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TournamentResult {
    pub ranked: Vec<RankedResult>,
    /// `None` when the tournament aborted for lack of history.
    pub split_date: Option<NaiveDate>,
    pub failures: Vec<RunFailure>,
    /// Strategies that completed the train phase.
    pub train_evaluated: usize,
}

impl TournamentResult {
    pub fn aborted() -> Self {
        TournamentResult {
            ranked: Vec::new(),
            split_date: None,
            failures: Vec::new(),
            train_evaluated: 0,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.split_date.is_none()
    }

    pub fn winner(&self) -> Option<&RankedResult> {
        self.ranked.first()
    }
}

pub struct Tournament {
    config: TournamentConfig,
    registry: StrategyRegistry,
}

impl Tournament {
    pub fn new(config: TournamentConfig, registry: StrategyRegistry) -> Self {
        Tournament { config, registry }
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// Runs the registry's full catalog.
    pub async fn run(
        &self,
        market: Arc<MarketData>,
        cancel: CancellationToken,
    ) -> Result<TournamentResult, TournamentError> {
        self.run_catalog(self.registry.catalog(), market, cancel).await
    }

    pub async fn run_catalog(
        &self,
        catalog: Vec<Arc<dyn Strategy>>,
        market: Arc<MarketData>,
        cancel: CancellationToken,
    ) -> Result<TournamentResult, TournamentError> {
        let timeline = market.timeline();
        let n = timeline.len();
        if n < self.config.split.min_history_dates {
            tracing::warn!(
                dates = n,
                minimum = self.config.split.min_history_dates,
                "not enough history for a train/test split, aborting tournament"
            );
            return Ok(TournamentResult::aborted());
        }

        let split_date = timeline[split_index(n, &self.config.split)];
        let (first, last) = (timeline[0], timeline[n - 1]);
        let workers = self.config.effective_workers();

        tracing::info!(
            strategies = catalog.len(),
            workers,
            %first,
            %split_date,
            %last,
            "train phase starting"
        );
        let mut failures = Vec::new();
        let train = self
            .run_phase(
                Phase::Train,
                &catalog,
                &market,
                BacktestWindow::between(first, split_date),
                &cancel,
            )
            .await?;

        let mut survivors: Vec<(Arc<dyn Strategy>, BacktestResult)> = Vec::new();
        for (strategy, outcome) in catalog.iter().zip(train) {
            match outcome {
                Ok(result) => survivors.push((Arc::clone(strategy), result)),
                Err(failure) => failures.push(failure),
            }
        }
        let train_evaluated = survivors.len();

        survivors.sort_by(|a, b| b.1.alpha.total_cmp(&a.1.alpha));
        survivors.truncate(self.config.finalists);
        let finalists: Vec<Arc<dyn Strategy>> = survivors.into_iter().map(|(s, _)| s).collect();

        tracing::info!(
            evaluated = train_evaluated,
            finalists = finalists.len(),
            "test phase starting"
        );
        let test = self
            .run_phase(
                Phase::Test,
                &finalists,
                &market,
                BacktestWindow::between(split_date, last),
                &cancel,
            )
            .await?;

        let mut results = Vec::new();
        for outcome in test {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }

        let ranked = self.config.rank(results);
        if let Some(top) = ranked.first() {
            tracing::info!(winner = %top.result.strategy_id, score = top.score, "tournament complete");
        }

        Ok(TournamentResult {
            ranked,
            split_date: Some(split_date),
            failures,
            train_evaluated,
        })
    }

    /// Runs every strategy over `window`, at most `effective_workers` at a
    /// time. Outcomes come back in input order. The train phase also calls
    /// [`Strategy::prepare`] before each run.
    async fn run_phase(
        &self,
        phase: Phase,
        strategies: &[Arc<dyn Strategy>],
        market: &Arc<MarketData>,
        window: BacktestWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<BacktestResult, RunFailure>>, TournamentError> {
        let semaphore = Arc::new(Semaphore::new(self.config.effective_workers()));
        let config = self.config.backtest.with_window(window);
        let mut tasks = JoinSet::new();

        for (index, strategy) in strategies.iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let strategy = Arc::clone(strategy);
            let market = Arc::clone(market);
            let config = config.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let id = strategy.id().to_string();
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = sem.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, id, Err(BacktestError::Cancelled.to_string()));
                };

                let outcome = tokio::task::spawn_blocking(move || {
                    if phase == Phase::Train {
                        strategy.prepare(&market);
                    }
                    run_backtest(strategy.as_ref(), &market, &config, &cancel)
                })
                .await;

                let outcome = match outcome {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(join_err) if join_err.is_panic() => Err("strategy panicked".to_string()),
                    Err(join_err) => Err(join_err.to_string()),
                };
                (index, id, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<BacktestResult, RunFailure>>> =
            (0..strategies.len()).map(|_| None).collect();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drain(&mut tasks).await;
                    tracing::info!(%phase, "tournament cancelled");
                    return Err(TournamentError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((index, strategy_id, outcome))) => {
                        let outcome = outcome.map_err(|reason| {
                            tracing::warn!(%phase, strategy = %strategy_id, %reason, "run failed");
                            RunFailure { strategy_id, phase, reason }
                        });
                        outcomes[index] = Some(outcome);
                    }
                    Some(Err(e)) => {
                        drain(&mut tasks).await;
                        return Err(TournamentError::Runtime { reason: e.to_string() });
                    }
                },
            }
        }

        if cancel.is_cancelled() {
            return Err(TournamentError::Cancelled);
        }

        Ok(outcomes
            .into_iter()
            .zip(strategies)
            .map(|(outcome, strategy)| {
                outcome.unwrap_or_else(|| {
                    Err(RunFailure {
                        strategy_id: strategy.id().to_string(),
                        phase,
                        reason: "run did not report".to_string(),
                    })
                })
            })
            .collect())
    }
}

/// Waits for every task; workers observe the cancellation token and stop at
/// their next step.
async fn drain<T: 'static>(tasks: &mut JoinSet<T>) {
    while tasks.join_next().await.is_some() {}
}
