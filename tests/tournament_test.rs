//! Tournament coordinator tests.
//!
//! Tests cover:
//! - Split policy as applied to a real timeline, and the short-history abort
//! - Ranking regression on the composite score
//! - The concurrency cap, observed from inside running strategies
//! - Cancellation mid-phase
//! - Isolation of panicking runs
//! - Forecast cache reuse across the train and test phases

mod common;

use common::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strategy_arena::domain::cursor::Cursors;
use strategy_arena::domain::error::{ArenaError, TournamentError};
use strategy_arena::domain::market_data::MarketData;
use strategy_arena::domain::metrics::BacktestResult;
use strategy_arena::domain::strategy::model::FactorFeatures;
use strategy_arena::domain::strategy::{Signal, Strategy, StrategyRegistry, StrategyVariant};
use strategy_arena::domain::tournament::{
    Phase, SplitPolicy, Tournament, TournamentConfig, split_index,
};
use strategy_arena::ports::forecast_port::ForecastPort;
use tokio_util::sync::CancellationToken;

fn test_variant(id: &str) -> StrategyVariant {
    StrategyVariant {
        id: id.to_string(),
        family: "test".to_string(),
        name: id.to_string(),
        description: String::new(),
        params: BTreeMap::new(),
    }
}

#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

enum Behaviour {
    /// Holds everything equally; measures concurrency and sleeps per step.
    Steady { pause: Duration },
    /// Panics on the first decision.
    Panic,
}

struct Probe {
    variant: StrategyVariant,
    gauge: Arc<Gauge>,
    behaviour: Behaviour,
}

impl Probe {
    fn steady(id: &str, gauge: &Arc<Gauge>, pause_ms: u64) -> Arc<dyn Strategy> {
        Arc::new(Probe {
            variant: test_variant(id),
            gauge: Arc::clone(gauge),
            behaviour: Behaviour::Steady {
                pause: Duration::from_millis(pause_ms),
            },
        })
    }

    fn panicking(id: &str) -> Arc<dyn Strategy> {
        Arc::new(Probe {
            variant: test_variant(id),
            gauge: Arc::new(Gauge::default()),
            behaviour: Behaviour::Panic,
        })
    }
}

impl Strategy for Probe {
    fn variant(&self) -> &StrategyVariant {
        &self.variant
    }

    fn lookback(&self) -> usize {
        0
    }

    fn allocate(
        &self,
        candidates: &[String],
        _market: &MarketData,
        _cursors: &Cursors,
    ) -> BTreeMap<String, f64> {
        match &self.behaviour {
            Behaviour::Panic => panic!("probe {} exploded", self.variant.id),
            Behaviour::Steady { pause } => {
                let now = self.gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.gauge.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(*pause);
                self.gauge.active.fetch_sub(1, Ordering::SeqCst);
                let w = 1.0 / candidates.len() as f64;
                candidates.iter().map(|s| (s.clone(), w)).collect()
            }
        }
    }

    fn signal(&self, _symbol: &str, _history: &[Quote], _cursor: usize) -> Signal {
        Signal::Hold
    }
}

fn config(max_workers: usize) -> TournamentConfig {
    TournamentConfig {
        max_workers,
        ..TournamentConfig::default()
    }
}

mod split {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn forty_five_dates_leave_twenty_for_testing() {
        let market = sample_market(45);
        let tournament = Tournament::new(
            TournamentConfig {
                split: SplitPolicy {
                    min_history_dates: 40,
                    ..SplitPolicy::default()
                },
                ..config(2)
            },
            StrategyRegistry::empty(),
        );
        let gauge = Arc::new(Gauge::default());
        let result = tournament
            .run_catalog(
                vec![Probe::steady("probe", &gauge, 0)],
                market,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.split_date, Some(day(25)));
        let winner = result.winner().unwrap();
        assert_eq!(winner.result.window_start, day(25));
        assert_eq!(winner.result.window_end, day(44));
    }

    #[tokio::test]
    async fn forty_nine_dates_abort() {
        let tournament = Tournament::new(config(2), StrategyRegistry::with_defaults());
        let result = tournament
            .run(sample_market(49), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_aborted());
        assert_eq!(result.train_evaluated, 0);
        assert!(result.ranked.is_empty());
    }

    #[test]
    fn policy_examples() {
        let policy = SplitPolicy::default();
        assert_eq!(split_index(45, &policy), 25);
        assert_eq!(split_index(40, &policy), 32);
        assert_eq!(split_index(100, &policy), 80);
    }
}

mod ranking {
    use super::*;

    fn result(id: &str, alpha: f64, trades: usize, sharpe: f64, return_pct: f64) -> BacktestResult {
        BacktestResult {
            strategy_id: id.to_string(),
            return_pct,
            benchmark_return_pct: return_pct - alpha,
            alpha,
            sharpe,
            max_drawdown_pct: 5.0,
            total_trades: trades,
            final_equity: 100_000.0 * (1.0 + return_pct / 100.0),
            window_start: day(0),
            window_end: day(10),
        }
    }

    #[test]
    fn cost_adjusted_alpha_beats_raw_alpha() {
        let config = TournamentConfig::default();
        let b = result("B", 12.0, 20, 0.5, 8.0);
        let a = result("A", 10.0, 5, 1.5, 12.0);
        let ranked = config.rank(vec![b, a]);

        assert_eq!(ranked[0].result.strategy_id, "A");
        assert!((ranked[0].score - 43.0).abs() < 1e-9);
        assert_eq!(ranked[1].result.strategy_id, "B");
        assert!((ranked[1].score - 9.0).abs() < 1e-9);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gauge_never_exceeds_worker_cap() {
        let gauge = Arc::new(Gauge::default());
        let catalog: Vec<Arc<dyn Strategy>> = (0..10)
            .map(|i| Probe::steady(&format!("probe-{i}"), &gauge, 1))
            .collect();
        let tournament = Tournament::new(config(2), StrategyRegistry::empty());
        let cap = tournament.config().effective_workers();

        let result = tournament
            .run_catalog(catalog, sample_market(60), CancellationToken::new())
            .await
            .unwrap();

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= cap, "peak {peak} above cap {cap}");
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
        assert_eq!(result.train_evaluated, 10);
        assert_eq!(result.ranked.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn single_worker_runs_one_at_a_time() {
        let gauge = Arc::new(Gauge::default());
        let catalog: Vec<Arc<dyn Strategy>> = (0..4)
            .map(|i| Probe::steady(&format!("probe-{i}"), &gauge, 1))
            .collect();
        let tournament = Tournament::new(config(1), StrategyRegistry::empty());
        tournament
            .run_catalog(catalog, sample_market(55), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finalists_are_capped() {
        let gauge = Arc::new(Gauge::default());
        let catalog: Vec<Arc<dyn Strategy>> = (0..6)
            .map(|i| Probe::steady(&format!("probe-{i}"), &gauge, 0))
            .collect();
        let tournament = Tournament::new(
            TournamentConfig {
                finalists: 3,
                ..config(2)
            },
            StrategyRegistry::empty(),
        );
        let result = tournament
            .run_catalog(catalog, sample_market(60), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.train_evaluated, 6);
        assert_eq!(result.ranked.len(), 3);
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_mid_phase_returns_cancelled() {
        let gauge = Arc::new(Gauge::default());
        let catalog: Vec<Arc<dyn Strategy>> = (0..8)
            .map(|i| Probe::steady(&format!("slow-{i}"), &gauge, 20))
            .collect();
        let tournament = Tournament::new(config(2), StrategyRegistry::empty());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = tournament
            .run_catalog(catalog, sample_market(200), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::Cancelled));
        // each run would take seconds; cancellation must cut it short
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
        assert!(matches!(ArenaError::from(err), ArenaError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_before_start() {
        let tournament = Tournament::new(config(2), StrategyRegistry::with_defaults());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tournament.run(sample_market(60), cancel).await.unwrap_err();
        assert!(matches!(err, TournamentError::Cancelled));
    }
}

mod isolation {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_strategy_is_recorded_not_fatal() {
        let gauge = Arc::new(Gauge::default());
        let catalog = vec![
            Probe::steady("steady", &gauge, 0),
            Probe::panicking("exploder"),
        ];
        let tournament = Tournament::new(config(2), StrategyRegistry::empty());
        let result = tournament
            .run_catalog(catalog, sample_market(60), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.train_evaluated, 1);
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.ranked[0].result.strategy_id, "steady");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].strategy_id, "exploder");
        assert_eq!(result.failures[0].phase, Phase::Train);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn symbol_absent_from_test_window_still_runs() {
        // AAA stops trading in the train window; BBB covers the whole timeline
        let early = wavy_quotes("AAA", 40, 100.0, 0.001, 0.0);
        let full = wavy_quotes("BBB", 80, 50.0, 0.001, 2.0);
        let market = Arc::new(make_market(vec![early, full], Vec::new()));

        let only_a = Arc::new(OnlySymbol {
            variant: test_variant("only-aaa"),
            symbol: "AAA".to_string(),
        });
        let tournament = Tournament::new(config(2), StrategyRegistry::empty());
        let result = tournament
            .run_catalog(vec![only_a], market, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.failures.len(), 0);
        assert_eq!(result.ranked.len(), 1);
    }

    struct OnlySymbol {
        variant: StrategyVariant,
        symbol: String,
    }

    impl Strategy for OnlySymbol {
        fn variant(&self) -> &StrategyVariant {
            &self.variant
        }

        fn lookback(&self) -> usize {
            0
        }

        fn allocate(
            &self,
            candidates: &[String],
            _market: &MarketData,
            _cursors: &Cursors,
        ) -> BTreeMap<String, f64> {
            candidates
                .iter()
                .filter(|s| **s == self.symbol)
                .map(|s| (s.clone(), 1.0))
                .collect()
        }

        fn signal(&self, _symbol: &str, _history: &[Quote], _cursor: usize) -> Signal {
            Signal::Hold
        }
    }
}

mod forecasting {
    use super::*;

    struct CountingForecaster {
        calls: AtomicUsize,
    }

    impl ForecastPort for CountingForecaster {
        fn model_version(&self) -> String {
            "counting-v1".to_string()
        }

        fn predict(&self, features: &FactorFeatures) -> Result<f64, ArenaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if features.sma_ratio > 1.0 { 0.7 } else { 0.3 })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn forecasts_are_computed_once_per_key() {
        let forecaster = Arc::new(CountingForecaster {
            calls: AtomicUsize::new(0),
        });
        let registry = StrategyRegistry::with_defaults().with_forecaster(forecaster.clone());
        let cache = registry.forecast_cache();
        let model = registry.build("multi-factor-model-0.55").unwrap();
        let tournament = Tournament::new(config(2), registry);

        let result = tournament
            .run_catalog(vec![model], sample_market(300), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.train_evaluated, 1);
        let (hits, _misses) = cache.stats();
        assert!(!cache.is_empty());
        assert!(hits > 0);
        assert_eq!(forecaster.calls.load(Ordering::SeqCst), cache.len());
    }
}
