//! ATR and relative volume, both plain rolling means.

use super::sma_by;
use crate::domain::quote::Quote;

/// Average True Range as the plain mean of the last `period` true ranges.
/// Each true range needs the prior close, so `period + 1` quotes are required.
pub fn atr(quotes: &[Quote], period: usize) -> Option<f64> {
    if period == 0 || quotes.len() < period + 1 {
        return None;
    }
    let window = &quotes[quotes.len() - period - 1..];
    let total: f64 = window.windows(2).map(|w| w[1].true_range(w[0].close)).sum();
    Some(total / period as f64)
}

/// Latest volume divided by the mean volume of the last `period` quotes
/// (today included).
pub fn relative_volume(quotes: &[Quote], period: usize) -> Option<f64> {
    let avg = sma_by(quotes, period, |q| q.volume)?;
    if avg <= 0.0 {
        return None;
    }
    quotes.last().map(|q| q.volume / avg)
}
