//! Market data acquisition port.
//!
//! Implementations return quotes already sorted by date with duplicates
//! removed; the engine never fetches or caches prices itself.

use crate::domain::error::ArenaError;
use crate::domain::quote::Quote;

pub trait DataPort {
    fn fetch_quotes(&self, symbol: &str) -> Result<Vec<Quote>, ArenaError>;

    fn list_symbols(&self) -> Result<Vec<String>, ArenaError>;
}
