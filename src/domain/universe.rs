//! Symbol universe: parses symbol lists from configuration and loads a
//! market-data snapshot through a [`DataPort`], skipping symbols without
//! usable history.

use crate::domain::error::ArenaError;
use crate::domain::market_data::MarketData;
use crate::domain::quote::Quote;
use crate::ports::data_port::DataPort;
use std::collections::{BTreeMap, HashSet};

/// Symbols with fewer quotes than this are skipped at load time.
pub const MIN_QUOTES: usize = 2;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    FetchFailed { reason: String },
    NoData,
    InsufficientQuotes { quotes: usize },
}

#[derive(Debug, Clone)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct LoadedUniverse {
    pub market: MarketData,
    pub skipped: Vec<SkippedSymbol>,
}

/// Fetches every symbol plus the benchmark. A missing benchmark is logged
/// and leaves benchmark returns at zero; an empty universe is an error.
pub fn load_universe(
    data_port: &dyn DataPort,
    symbols: &[String],
    benchmark: Option<&str>,
) -> Result<LoadedUniverse, ArenaError> {
    let mut quotes: BTreeMap<String, Vec<Quote>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        if benchmark == Some(symbol.as_str()) {
            continue;
        }
        let reason = match data_port.fetch_quotes(symbol) {
            Err(e) => SkipReason::FetchFailed {
                reason: e.to_string(),
            },
            Ok(q) if q.is_empty() => SkipReason::NoData,
            Ok(q) if q.len() < MIN_QUOTES => SkipReason::InsufficientQuotes { quotes: q.len() },
            Ok(q) => {
                tracing::debug!(symbol = %symbol, quotes = q.len(), "loaded");
                quotes.insert(symbol.clone(), q);
                continue;
            }
        };
        tracing::warn!(symbol = %symbol, ?reason, "skipping symbol");
        skipped.push(SkippedSymbol {
            symbol: symbol.clone(),
            reason,
        });
    }

    if quotes.is_empty() {
        return Err(ArenaError::InsufficientData {
            symbol: "all".to_string(),
            bars: 0,
            minimum: MIN_QUOTES,
        });
    }

    let benchmark_quotes = match benchmark {
        Some(b) => data_port.fetch_quotes(b).unwrap_or_else(|e| {
            tracing::warn!(benchmark = b, error = %e, "benchmark unavailable, alpha equals return");
            Vec::new()
        }),
        None => Vec::new(),
    };

    Ok(LoadedUniverse {
        market: MarketData::new(quotes, benchmark_quotes),
        skipped,
    })
}
