#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use strategy_arena::domain::error::ArenaError;
use strategy_arena::domain::market_data::MarketData;
pub use strategy_arena::domain::quote::Quote;
use strategy_arena::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Quote>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_quotes(mut self, symbol: &str, quotes: Vec<Quote>) -> Self {
        self.data.insert(symbol.to_string(), quotes);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_quotes(&self, symbol: &str) -> Result<Vec<Quote>, ArenaError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ArenaError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArenaError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive calendar days starting 2023-01-02.
pub fn day(i: usize) -> NaiveDate {
    date(2023, 1, 2) + chrono::Duration::days(i as i64)
}

pub fn make_quote(symbol: &str, date: NaiveDate, close: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000.0,
    }
}

pub fn quotes_from_closes(symbol: &str, closes: &[f64]) -> Vec<Quote> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_quote(symbol, day(i), c))
        .collect()
}

/// Deterministic wavy price path: a drift plus two sine components, with
/// volume that swells on up days.
pub fn wavy_quotes(symbol: &str, n: usize, start: f64, drift: f64, phase: f64) -> Vec<Quote> {
    let mut prev = start;
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = start * (1.0 + drift * t)
                + 6.0 * ((t + phase) / 7.0).sin()
                + 3.0 * ((t + phase) / 3.0).cos();
            let close = close.max(1.0);
            let base = if close > prev { 15_000.0 } else { 9_000.0 };
            let volume = base + 500.0 * ((t + phase) / 5.0).sin();
            prev = close;
            Quote {
                symbol: symbol.to_string(),
                date: day(i),
                open: close * 0.998,
                high: close * 1.012,
                low: close * 0.988,
                close,
                volume,
            }
        })
        .collect()
}

pub fn make_market(series: Vec<Vec<Quote>>, benchmark: Vec<Quote>) -> MarketData {
    let mut map = BTreeMap::new();
    for quotes in series {
        if let Some(first) = quotes.first() {
            map.insert(first.symbol.clone(), quotes);
        }
    }
    MarketData::new(map, benchmark)
}

/// Three wavy symbols plus a benchmark over `n` days.
pub fn sample_market(n: usize) -> Arc<MarketData> {
    Arc::new(make_market(
        vec![
            wavy_quotes("AAA", n, 100.0, 0.002, 0.0),
            wavy_quotes("BBB", n, 50.0, -0.001, 11.0),
            wavy_quotes("CCC", n, 80.0, 0.0005, 23.0),
        ],
        wavy_quotes("SPY", n, 400.0, 0.0008, 5.0),
    ))
}

pub fn write_csv(dir: &std::path::Path, quotes: &[Quote]) {
    let symbol = &quotes[0].symbol;
    let mut content = String::from("date,open,high,low,close,volume\n");
    for q in quotes {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            q.date, q.open, q.high, q.low, q.close, q.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}
