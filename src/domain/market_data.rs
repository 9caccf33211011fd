//! Immutable market-data snapshot and unified timeline.
//!
//! A [`MarketData`] is built once, wrapped in an `Arc`, and shared read-only
//! by every concurrent backtest run.

use crate::domain::quote::Quote;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub quotes: Vec<Quote>,
    date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    /// Builds a series, sorting by date and dropping duplicate dates (last wins).
    pub fn new(symbol: String, mut quotes: Vec<Quote>) -> Self {
        sort_keep_last(&mut quotes);
        let date_index = quotes
            .iter()
            .enumerate()
            .map(|(i, q)| (q.date, i))
            .collect();
        Self {
            symbol,
            quotes,
            date_index,
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Quote> {
        self.date_index.get(&date).map(|&i| &self.quotes[i])
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Index of the last quote dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        match self.quotes.binary_search_by_key(&date, |q| q.date) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub series: BTreeMap<String, SymbolSeries>,
    pub benchmark: Vec<Quote>,
}

impl MarketData {
    pub fn new(quotes: BTreeMap<String, Vec<Quote>>, mut benchmark: Vec<Quote>) -> Self {
        let series = quotes
            .into_iter()
            .map(|(symbol, q)| (symbol.clone(), SymbolSeries::new(symbol, q)))
            .collect();
        sort_keep_last(&mut benchmark);
        Self { series, benchmark }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(|s| s.is_empty())
    }

    pub fn timeline(&self) -> Vec<NaiveDate> {
        build_unified_timeline(self.series.values())
    }
}

pub fn build_unified_timeline<'a>(series: impl IntoIterator<Item = &'a SymbolSeries>) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|s| s.quotes.iter().map(|q| q.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// Stable sort by date, keeping the last quote supplied for each date.
fn sort_keep_last(quotes: &mut Vec<Quote>) {
    quotes.sort_by_key(|q| q.date);
    quotes.reverse();
    quotes.dedup_by_key(|q| q.date);
    quotes.reverse();
}
