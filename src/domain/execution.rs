//! Order fills against the simulated portfolio.
//!
//! Costs are quoted per round trip as a percentage of notional; each fill
//! pays half. Slippage moves the fill price against the trader, commission
//! is deducted from cash. Orders that would oversell or overspend are
//! clipped to what the portfolio can actually do.

use chrono::NaiveDate;

use super::holding::QUANTITY_EPSILON;
use super::portfolio::{Portfolio, Side, TradeReason, TradeRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub slippage_pct: f64,
    pub commission_pct: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            slippage_pct: 0.1,
            commission_pct: 0.1,
        }
    }
}

impl CostModel {
    pub fn frictionless() -> Self {
        CostModel {
            slippage_pct: 0.0,
            commission_pct: 0.0,
        }
    }

    fn half_slippage(&self) -> f64 {
        self.slippage_pct / 2.0 / 100.0
    }

    fn half_commission(&self) -> f64 {
        self.commission_pct / 2.0 / 100.0
    }

    pub fn buy_price(&self, market_price: f64) -> f64 {
        market_price * (1.0 + self.half_slippage())
    }

    pub fn sell_price(&self, market_price: f64) -> f64 {
        market_price * (1.0 - self.half_slippage())
    }

    pub fn commission(&self, notional: f64) -> f64 {
        notional * self.half_commission()
    }
}

/// Outcome of an order submission.
#[derive(Debug, Clone, PartialEq)]
pub enum FillResult {
    Filled {
        quantity: f64,
        price: f64,
        commission: f64,
        clipped: bool,
    },
    /// Nothing executable after clipping.
    Rejected,
}

/// An order the engine wants executed on one date.
#[derive(Debug, Clone, Copy)]
pub struct Order<'a> {
    pub symbol: &'a str,
    pub market_price: f64,
    pub date: NaiveDate,
    pub reason: TradeReason,
}

/// Buy roughly `notional` worth of the symbol, clipped to available cash
/// including commission.
pub fn buy(
    portfolio: &mut Portfolio,
    order: Order<'_>,
    notional: f64,
    costs: &CostModel,
) -> FillResult {
    if !(order.market_price.is_finite() && order.market_price > 0.0) || !notional.is_finite() {
        return FillResult::Rejected;
    }

    let price = costs.buy_price(order.market_price);
    let affordable = (portfolio.cash / (1.0 + costs.half_commission())).max(0.0);
    let clipped = notional > affordable;
    let notional = notional.min(affordable);
    let quantity = notional / price;
    if quantity <= QUANTITY_EPSILON {
        return FillResult::Rejected;
    }

    let commission = costs.commission(notional);
    portfolio.cash -= notional + commission;
    portfolio.credit(order.symbol, quantity, price);
    portfolio.record_trade(TradeRecord {
        date: order.date,
        symbol: order.symbol.to_string(),
        side: Side::Buy,
        quantity,
        price,
        notional,
        cost: commission,
        reason: order.reason,
    });

    FillResult::Filled {
        quantity,
        price,
        commission,
        clipped,
    }
}

/// Sell `quantity` of the symbol, clipped to the quantity held.
pub fn sell(
    portfolio: &mut Portfolio,
    order: Order<'_>,
    quantity: f64,
    costs: &CostModel,
) -> FillResult {
    if !(order.market_price.is_finite() && order.market_price > 0.0) {
        return FillResult::Rejected;
    }

    let held = portfolio.quantity(order.symbol);
    let clipped = quantity > held;
    let removed = portfolio.debit(order.symbol, quantity);
    if removed <= QUANTITY_EPSILON {
        return FillResult::Rejected;
    }

    let price = costs.sell_price(order.market_price);
    let notional = removed * price;
    let commission = costs.commission(notional);
    portfolio.cash += notional - commission;
    portfolio.record_trade(TradeRecord {
        date: order.date,
        symbol: order.symbol.to_string(),
        side: Side::Sell,
        quantity: removed,
        price,
        notional,
        cost: commission,
        reason: order.reason,
    });

    FillResult::Filled {
        quantity: removed,
        price,
        commission,
        clipped,
    }
}

/// Sell the entire holding, if any.
pub fn liquidate(portfolio: &mut Portfolio, order: Order<'_>, costs: &CostModel) -> FillResult {
    let held = portfolio.quantity(order.symbol);
    sell(portfolio, order, held, costs)
}
