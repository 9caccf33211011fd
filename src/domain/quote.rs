//! Daily quote record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Quote {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// A quote is usable for pricing when its close is a positive finite number.
    pub fn is_priced(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote() -> Quote {
        Quote {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let q = sample_quote();
        assert!((q.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let q = sample_quote();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((q.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let q = sample_quote();
        assert!((q.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unpriced_quotes() {
        let mut q = sample_quote();
        assert!(q.is_priced());
        q.close = 0.0;
        assert!(!q.is_priced());
        q.close = f64::NAN;
        assert!(!q.is_priced());
    }
}
