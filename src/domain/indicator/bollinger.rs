//! Bollinger Bands and population standard deviation of the close.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev divides by N, not N-1.

use super::tail;
use crate::domain::quote::Quote;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn stddev(quotes: &[Quote], period: usize) -> Option<f64> {
    let window = tail(quotes, period)?;
    let mean = window.iter().map(|q| q.close).sum::<f64>() / period as f64;
    let variance = window
        .iter()
        .map(|q| {
            let diff = q.close - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    Some(variance.sqrt())
}

pub fn bollinger(quotes: &[Quote], period: usize, multiplier: f64) -> Option<Bands> {
    let window = tail(quotes, period)?;
    let middle = window.iter().map(|q| q.close).sum::<f64>() / period as f64;
    let sd = stddev(window, period)?;
    Some(Bands {
        upper: middle + multiplier * sd,
        middle,
        lower: middle - multiplier * sd,
    })
}
