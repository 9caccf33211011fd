//! Open holdings in the simulated portfolio.

/// Quantities below this are treated as a closed holding.
pub const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub average_cost: f64,
    /// Highest close seen since the holding was opened.
    pub peak_price: f64,
}

impl Holding {
    pub fn open(symbol: &str, quantity: f64, price: f64) -> Self {
        Holding {
            symbol: symbol.to_string(),
            quantity,
            average_cost: price,
            peak_price: price,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Add to the holding, re-weighting the average cost.
    pub fn add(&mut self, quantity: f64, price: f64) {
        let total = self.quantity + quantity;
        if total > QUANTITY_EPSILON {
            self.average_cost = (self.average_cost * self.quantity + price * quantity) / total;
        }
        self.quantity = total;
    }

    /// Remove up to `quantity`, returning what was actually removed.
    pub fn reduce(&mut self, quantity: f64) -> f64 {
        let removed = quantity.min(self.quantity).max(0.0);
        self.quantity -= removed;
        removed
    }

    pub fn is_closed(&self) -> bool {
        self.quantity <= QUANTITY_EPSILON
    }

    pub fn observe_close(&mut self, close: f64) {
        if close > self.peak_price {
            self.peak_price = close;
        }
    }

    /// True when `close` has fallen `pct` percent or more below the peak.
    pub fn trailing_stop_hit(&self, close: f64, pct: f64) -> bool {
        close <= self.peak_price * (1.0 - pct / 100.0)
    }
}
