//! Per-symbol cursors into the quote series.
//!
//! A cursor marks the last quote a strategy may observe at the current
//! simulated step. Cursors only move forward during a run.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursors {
    positions: BTreeMap<String, usize>,
}

impl Cursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.positions.get(symbol).copied()
    }

    /// Moves `symbol` to `index`. Returns false (and leaves the cursor alone)
    /// if that would move it backwards.
    pub fn advance(&mut self, symbol: &str, index: usize) -> bool {
        match self.positions.get_mut(symbol) {
            Some(current) if index < *current => {
                tracing::debug!(symbol, current = *current, index, "ignoring backwards cursor move");
                false
            }
            Some(current) => {
                *current = index;
                true
            }
            None => {
                self.positions.insert(symbol.to_string(), index);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &usize)> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
