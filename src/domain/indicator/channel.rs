//! Rolling price channel (highest high / lowest low over the last n quotes).

use super::tail;
use crate::domain::quote::Quote;

pub fn highest_high(quotes: &[Quote], period: usize) -> Option<f64> {
    tail(quotes, period).map(|w| w.iter().map(|q| q.high).fold(f64::MIN, f64::max))
}

pub fn lowest_low(quotes: &[Quote], period: usize) -> Option<f64> {
    tail(quotes, period).map(|w| w.iter().map(|q| q.low).fold(f64::MAX, f64::min))
}
