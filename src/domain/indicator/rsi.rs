//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! Needs n + 1 quotes (n price changes).
//!
//! [`cutler_rsi`] is the unsmoothed variant: plain means of the last n gains
//! and losses.

use super::seed_window;
use crate::domain::quote::Quote;

pub fn rsi(quotes: &[Quote], period: usize) -> Option<f64> {
    if period == 0 || quotes.len() < period + 1 {
        return None;
    }

    let window = seed_window(quotes, period, period + 1);
    let changes: Vec<f64> = window.windows(2).map(|w| w[1].close - w[0].close).collect();

    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;

    for &c in &changes[period..] {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(c)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(c)) / period as f64;
    }

    if avg_loss == 0.0 {
        Some(100.0)
    } else {
        Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
    }
}

/// RSI over simple means of the last `period` gains and losses. `None` when
/// the window is flat (no gains and no losses).
pub fn cutler_rsi(quotes: &[Quote], period: usize) -> Option<f64> {
    if period == 0 || quotes.len() < period + 1 {
        return None;
    }
    let window = &quotes[quotes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .fold((0.0, 0.0), |(g, l), c| {
            if c > 0.0 { (g + c, l) } else { (g, l - c) }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => None,
        (_, false) => Some(100.0),
        _ => Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss))),
    }
}
