//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::model_file_adapter::ModelFileAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestWindow, run_backtest};
use crate::domain::config_validation::{parse_optional_date, validate_all};
use crate::domain::error::ArenaError;
use crate::domain::execution::CostModel;
use crate::domain::metrics::BacktestResult;
use crate::domain::strategy::StrategyRegistry;
use crate::domain::tournament::{SplitPolicy, Tournament, TournamentConfig, TournamentResult};
use crate::domain::universe::{LoadedUniverse, load_universe, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_OUTPUT: &str = "leaderboard.csv";

#[derive(Parser, Debug)]
#[command(name = "strategy-arena", about = "Backtest and rank trading strategies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one catalog strategy over the configured window
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Run the walk-forward tournament and write the leaderboard
    Tournament {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the strategy catalog
    Catalog,
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            json,
        } => run_single_backtest(&config, &strategy, json),
        Command::Tournament { config, output } => run_tournament(&config, output.as_deref()),
        Command::Catalog => run_catalog(),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Installs the global subscriber on stderr. `RUST_LOG` filters (default
/// `info`); `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };
}

fn fail(err: &ArenaError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, ArenaError> {
    let defaults = BacktestConfig::default();
    let start = parse_optional_date(config, "backtest", "start_date")?;
    let end = parse_optional_date(config, "backtest", "end_date")?;

    let trailing_stop_pct = match config.get_string("backtest", "trailing_stop_pct") {
        Some(s) if !s.trim().is_empty() => {
            let pct: f64 = s.trim().parse().map_err(|_| ArenaError::ConfigInvalid {
                section: "backtest".into(),
                key: "trailing_stop_pct".into(),
                reason: format!("not a number: {s}"),
            })?;
            Some(pct)
        }
        _ => None,
    };

    Ok(BacktestConfig {
        initial_cash: config.get_double("backtest", "initial_cash", defaults.initial_cash),
        costs: CostModel {
            slippage_pct: config.get_double(
                "backtest",
                "slippage_pct",
                defaults.costs.slippage_pct,
            ),
            commission_pct: config.get_double(
                "backtest",
                "commission_pct",
                defaults.costs.commission_pct,
            ),
        },
        window: BacktestWindow { start, end },
        rebalance_interval: config
            .get_int(
                "backtest",
                "rebalance_interval",
                defaults.rebalance_interval as i64,
            )
            .max(1) as usize,
        signal_position_fraction: config.get_double(
            "backtest",
            "signal_position_fraction",
            defaults.signal_position_fraction,
        ),
        trailing_stop_pct,
        min_trade_fraction: config.get_double(
            "backtest",
            "min_trade_fraction",
            defaults.min_trade_fraction,
        ),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
    })
}

pub fn build_tournament_config(config: &dyn ConfigPort) -> Result<TournamentConfig, ArenaError> {
    let defaults = TournamentConfig::default();
    let split = SplitPolicy::default();
    let count = |key: &str, default: usize| -> usize {
        config.get_int("tournament", key, default as i64).max(0) as usize
    };

    Ok(TournamentConfig {
        max_workers: count("max_workers", defaults.max_workers),
        finalists: count("finalists", defaults.finalists),
        target_return_pct: config.get_double(
            "tournament",
            "target_return_pct",
            defaults.target_return_pct,
        ),
        per_trade_cost_pct: config.get_double(
            "tournament",
            "per_trade_cost_pct",
            defaults.per_trade_cost_pct,
        ),
        sharpe_cap: config.get_double("tournament", "sharpe_cap", defaults.sharpe_cap),
        target_bonus: config.get_double("tournament", "target_bonus", defaults.target_bonus),
        split: SplitPolicy {
            ratio: config.get_double("tournament", "split_ratio", split.ratio),
            min_test_dates: count("min_test_dates", split.min_test_dates),
            forced_split_threshold: count("forced_split_threshold", split.forced_split_threshold),
            min_history_dates: count("min_history_dates", split.min_history_dates),
        },
        backtest: build_backtest_config(config)?,
    })
}

/// The default catalog, with the model family backed by a weights file when
/// `[model] weights_path` is set. The file is read once up front so a bad
/// path fails before any run starts.
pub fn build_registry(config: &dyn ConfigPort) -> Result<StrategyRegistry, ArenaError> {
    let registry = StrategyRegistry::with_defaults();
    match config.get_string("model", "weights_path") {
        Some(path) if !path.trim().is_empty() => {
            let refresh = config.get_int("model", "refresh_secs", 300).max(1) as u64;
            let adapter = ModelFileAdapter::new(path.trim(), Duration::from_secs(refresh));
            let weights = adapter.load()?;
            tracing::info!(path = path.trim(), version = %weights.version, "using model weights file");
            Ok(registry.with_forecaster(Arc::new(adapter)))
        }
        _ => Ok(registry),
    }
}

/// `[data] symbols` when set, otherwise every symbol the data port knows,
/// minus the benchmark.
pub fn resolve_symbols(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, ArenaError> {
    let benchmark = config.get_string("data", "benchmark");
    let mut symbols = match config.get_string("data", "symbols") {
        Some(list) if !list.trim().is_empty() => {
            parse_symbols(&list).map_err(|e| ArenaError::ConfigInvalid {
                section: "data".into(),
                key: "symbols".into(),
                reason: e.to_string(),
            })?
        }
        _ => data_port.list_symbols()?,
    };
    if let Some(b) = benchmark {
        symbols.retain(|s| !s.eq_ignore_ascii_case(b.trim()));
    }
    Ok(symbols)
}

/// Loads the configured universe from the CSV directory.
pub fn load_market(config: &dyn ConfigPort) -> Result<LoadedUniverse, ArenaError> {
    let dir = config
        .get_string("data", "dir")
        .ok_or_else(|| ArenaError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    let data_port = CsvAdapter::new(PathBuf::from(dir.trim()));
    let symbols = resolve_symbols(config, &data_port)?;
    let benchmark = config.get_string("data", "benchmark");
    let benchmark = benchmark.as_deref().map(str::trim);

    let loaded = load_universe(&data_port, &symbols, benchmark)?;
    eprintln!(
        "Loaded {} symbols ({} skipped)",
        loaded.market.symbols().count(),
        loaded.skipped.len()
    );
    for skipped in &loaded.skipped {
        eprintln!("  skipped {}: {:?}", skipped.symbol, skipped.reason);
    }
    Ok(loaded)
}

/// Loads, validates and runs the tournament described by `config`.
pub async fn execute_tournament(
    config: &dyn ConfigPort,
    cancel: CancellationToken,
) -> Result<TournamentResult, ArenaError> {
    validate_all(config)?;
    let tournament_config = build_tournament_config(config)?;
    let registry = build_registry(config)?;
    let loaded = load_market(config)?;

    let tournament = Tournament::new(tournament_config, registry);
    eprintln!(
        "Running tournament: {} workers",
        tournament.config().effective_workers()
    );
    let result = tournament.run(Arc::new(loaded.market), cancel).await?;
    Ok(result)
}

fn run_tournament(config_path: &Path, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return fail(&ArenaError::Io(e)),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling tournament");
            interrupt.cancel();
        }
    });

    let outcome = runtime.block_on(execute_tournament(&config, cancel));
    let result = match outcome {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    if result.is_aborted() {
        eprintln!("error: not enough shared history for a train/test split");
        return ExitCode::from(5);
    }

    print_leaderboard(&result);

    let output_path = output
        .map(|p| p.display().to_string())
        .or_else(|| config.get_string("report", "output"))
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    match CsvReportAdapter.write_tournament(&result, &output_path) {
        Ok(()) => {
            eprintln!("\nLeaderboard written to: {output_path}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_leaderboard(result: &TournamentResult) {
    if let Some(split) = result.split_date {
        eprintln!("\n=== Tournament (split {split}) ===");
    }
    eprintln!(
        "Train evaluated: {}   Finalists ranked: {}   Failures: {}",
        result.train_evaluated,
        result.ranked.len(),
        result.failures.len()
    );
    for (i, ranked) in result.ranked.iter().enumerate() {
        let r = &ranked.result;
        eprintln!(
            "  {:>2}. {:<32} score {:>8.2}  return {:>7.2}%  alpha {:>7.2}  sharpe {:>5.2}  trades {}",
            i + 1,
            r.strategy_id,
            ranked.score,
            r.return_pct,
            r.alpha,
            r.sharpe,
            r.total_trades
        );
    }
    for failure in &result.failures {
        eprintln!(
            "  failed [{}] {}: {}",
            failure.phase, failure.strategy_id, failure.reason
        );
    }
}

/// Runs a single catalog strategy over the configured window.
pub fn backtest_one(config: &dyn ConfigPort, strategy_id: &str) -> Result<BacktestResult, ArenaError> {
    validate_all(config)?;
    let backtest_config = build_backtest_config(config)?;
    let registry = build_registry(config)?;
    let strategy = registry.build(strategy_id)?;
    let loaded = load_market(config)?;

    strategy.prepare(&loaded.market);
    let result = run_backtest(
        strategy.as_ref(),
        &loaded.market,
        &backtest_config,
        &CancellationToken::new(),
    )?;
    Ok(result)
}

fn run_single_backtest(config_path: &Path, strategy_id: &str, json: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = match backtest_one(&config, strategy_id) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!("\n=== {} ===", result.strategy_id);
    eprintln!("Window:           {} to {}", result.window_start, result.window_end);
    eprintln!("Return:           {:.2}%", result.return_pct);
    eprintln!("Benchmark:        {:.2}%", result.benchmark_return_pct);
    eprintln!("Alpha:            {:.2}", result.alpha);
    eprintln!("Sharpe Ratio:     {:.2}", result.sharpe);
    eprintln!("Max Drawdown:     -{:.1}%", result.max_drawdown_pct);
    eprintln!("Total Trades:     {}", result.total_trades);
    eprintln!("Final Equity:     {:.2}", result.final_equity);

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                return fail(&ArenaError::Report {
                    reason: e.to_string(),
                });
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_catalog() -> ExitCode {
    let registry = StrategyRegistry::with_defaults();
    for strategy in registry.catalog() {
        let variant = strategy.variant();
        println!("{:<36} {}", variant.id, variant.name);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&config) {
        return fail(&e);
    }
    if let Err(e) = build_tournament_config(&config).and_then(|_| build_registry(&config)) {
        return fail(&e);
    }
    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}
