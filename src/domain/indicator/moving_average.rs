//! Simple and exponential moving averages of the close.
//!
//! EMA: k = 2/(n+1), seeded with the SMA of the first n quotes of the seed
//! window, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).

use super::{seed_window, tail};
use crate::domain::quote::Quote;

pub fn sma(quotes: &[Quote], period: usize) -> Option<f64> {
    sma_by(quotes, period, |q| q.close)
}

/// SMA of an arbitrary quote field over the last `period` quotes.
pub fn sma_by(quotes: &[Quote], period: usize, field: impl Fn(&Quote) -> f64) -> Option<f64> {
    let window = tail(quotes, period)?;
    Some(window.iter().map(field).sum::<f64>() / period as f64)
}

pub fn ema(quotes: &[Quote], period: usize) -> Option<f64> {
    if period == 0 || quotes.len() < period {
        return None;
    }
    let window = seed_window(quotes, period, period);
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = window[..period].iter().map(|q| q.close).sum::<f64>() / period as f64;
    for q in &window[period..] {
        ema = q.close * k + ema * (1.0 - k);
    }
    Some(ema)
}
