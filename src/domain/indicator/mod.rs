//! Technical indicators evaluated at the end of a visible quote window.
//!
//! Every function takes the slice a strategy is allowed to see (quotes up to
//! and including its cursor) and returns the indicator value for the last
//! quote, or `None` while the window is shorter than the warmup.
//!
//! Recursive indicators (EMA, Wilder RSI) are seeded from a trailing window of
//! `period * RECURSIVE_WARMUP_FACTOR` quotes so their cost stays bounded per
//! step and their value depends only on visible data.

pub mod bollinger;
pub mod channel;
pub mod moving_average;
pub mod rsi;
pub mod volatility;

pub use bollinger::{Bands, bollinger, stddev};
pub use channel::{highest_high, lowest_low};
pub use moving_average::{ema, sma, sma_by};
pub use rsi::{cutler_rsi, rsi};
pub use volatility::{atr, relative_volume};

use crate::domain::quote::Quote;

pub const RECURSIVE_WARMUP_FACTOR: usize = 4;

/// Trailing window used to seed recursive indicators.
pub(crate) fn seed_window(quotes: &[Quote], period: usize, min_len: usize) -> &[Quote] {
    let len = (period * RECURSIVE_WARMUP_FACTOR).max(min_len);
    &quotes[quotes.len().saturating_sub(len)..]
}

/// The last `period` quotes, or `None` if fewer are available.
pub(crate) fn tail(quotes: &[Quote], period: usize) -> Option<&[Quote]> {
    if period == 0 || quotes.len() < period {
        return None;
    }
    Some(&quotes[quotes.len() - period..])
}
