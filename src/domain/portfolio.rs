//! Simulated portfolio: cash, holdings, trade log and equity curve.
//!
//! A portfolio is owned by exactly one engine run and never shared.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::holding::Holding;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    Rebalance,
    Signal,
    TrailingStop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    /// Fill price after slippage.
    pub price: f64,
    pub notional: f64,
    /// Commission paid on this fill.
    pub cost: f64,
    pub reason: TradeReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub holdings: BTreeMap<String, Holding>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            holdings: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    pub fn holding_mut(&mut self, symbol: &str) -> Option<&mut Holding> {
        self.holdings.get_mut(symbol)
    }

    pub fn has_holding(&self, symbol: &str) -> bool {
        self.holdings.contains_key(symbol)
    }

    pub fn quantity(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).map_or(0.0, |h| h.quantity)
    }

    /// Add `quantity` at `price`, opening the holding on first buy.
    pub fn credit(&mut self, symbol: &str, quantity: f64, price: f64) {
        match self.holdings.get_mut(symbol) {
            Some(h) => h.add(quantity, price),
            None => {
                self.holdings
                    .insert(symbol.to_string(), Holding::open(symbol, quantity, price));
            }
        }
    }

    /// Remove up to `quantity`, dropping the holding once it is closed.
    /// Returns the quantity actually removed.
    pub fn debit(&mut self, symbol: &str, quantity: f64) -> f64 {
        let Some(h) = self.holdings.get_mut(symbol) else {
            return 0.0;
        };
        let removed = h.reduce(quantity);
        if h.is_closed() {
            self.holdings.remove(symbol);
        }
        removed
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// cash + Σ quantity × price. Holdings without a price are valued at
    /// their average cost.
    pub fn total_equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let holdings_value: f64 = self
            .holdings
            .values()
            .map(|h| {
                let price = prices.get(&h.symbol).copied().unwrap_or(h.average_cost);
                h.market_value(price)
            })
            .sum();
        self.cash + holdings_value
    }
}
