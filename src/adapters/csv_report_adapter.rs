//! Leaderboard CSV writer implementing ReportPort.
//!
//! One row per ranked finalist, best first. Failed runs are not written;
//! they are reported through logging by the coordinator.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::ArenaError;
use crate::domain::tournament::{RankedResult, TournamentResult};
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

#[derive(Debug, Serialize)]
struct LeaderboardRow<'a> {
    rank: usize,
    strategy_id: &'a str,
    score: f64,
    return_pct: f64,
    benchmark_return_pct: f64,
    alpha: f64,
    sharpe: f64,
    max_drawdown_pct: f64,
    total_trades: usize,
    final_equity: f64,
    window_start: NaiveDate,
    window_end: NaiveDate,
}

impl<'a> LeaderboardRow<'a> {
    fn new(rank: usize, ranked: &'a RankedResult) -> Self {
        let r = &ranked.result;
        LeaderboardRow {
            rank,
            strategy_id: &r.strategy_id,
            score: round4(ranked.score),
            return_pct: round4(r.return_pct),
            benchmark_return_pct: round4(r.benchmark_return_pct),
            alpha: round4(r.alpha),
            sharpe: round4(r.sharpe),
            max_drawdown_pct: round4(r.max_drawdown_pct),
            total_trades: r.total_trades,
            final_equity: (r.final_equity * 100.0).round() / 100.0,
            window_start: r.window_start,
            window_end: r.window_end,
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn report_err(e: impl std::fmt::Display) -> ArenaError {
    ArenaError::Report {
        reason: e.to_string(),
    }
}

impl CsvReportAdapter {
    /// Renders the leaderboard without touching the filesystem.
    pub fn render(result: &TournamentResult) -> Result<String, ArenaError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if result.ranked.is_empty() {
            writer
                .write_record([
                    "rank",
                    "strategy_id",
                    "score",
                    "return_pct",
                    "benchmark_return_pct",
                    "alpha",
                    "sharpe",
                    "max_drawdown_pct",
                    "total_trades",
                    "final_equity",
                    "window_start",
                    "window_end",
                ])
                .map_err(report_err)?;
        }
        for (i, ranked) in result.ranked.iter().enumerate() {
            writer
                .serialize(LeaderboardRow::new(i + 1, ranked))
                .map_err(report_err)?;
        }
        let bytes = writer.into_inner().map_err(report_err)?;
        String::from_utf8(bytes).map_err(report_err)
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_tournament(
        &self,
        result: &TournamentResult,
        output_path: &str,
    ) -> Result<(), ArenaError> {
        let content = Self::render(result)?;
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        tracing::info!(path = output_path, rows = result.ranked.len(), "leaderboard written");
        Ok(())
    }
}
