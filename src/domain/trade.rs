//! Fill-level trade records and realized PnL backfill.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderSide, PositionSide};

/// One execution (fill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: Option<PositionSide>,
    pub price: Decimal,
    /// Base-asset quantity.
    pub quantity: Decimal,
    /// Zero when the venue did not report it.
    pub realized_pnl: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    pub time: i64,
}

#[derive(Default)]
struct CostBasis {
    qty: Decimal,
    avg: Decimal,
}

/// Fill in `realized_pnl` for closing trades that lack it, using an average-cost
/// model per (symbol, position side).
///
/// Trades are processed in time order. LONG+BUY and SHORT+SELL open and move the
/// average; the opposite sides close at most the open quantity and realize
/// `(price - avg) * qty` for LONG or `(avg - price) * qty` for SHORT. Trades that
/// already carry a venue PnL, lack a position side, or have non-positive
/// price/quantity are left untouched and do not affect the cost basis.
pub fn fill_realized_pnl_by_avg_cost(trades: &mut [Trade]) {
    let mut order: Vec<usize> = (0..trades.len()).collect();
    order.sort_by_key(|&i| trades[i].time);

    let mut book: HashMap<(String, PositionSide), CostBasis> = HashMap::new();

    for i in order {
        let trade = &mut trades[i];
        if !trade.realized_pnl.is_zero() {
            continue;
        }
        let Some(position_side) = trade.position_side else {
            continue;
        };
        if trade.price <= Decimal::ZERO || trade.quantity <= Decimal::ZERO {
            continue;
        }

        let key = (trade.symbol.trim().to_uppercase(), position_side);
        let basis = book.entry(key).or_default();

        let opening = matches!(
            (position_side, trade.side),
            (PositionSide::Long, OrderSide::Buy) | (PositionSide::Short, OrderSide::Sell)
        );

        if opening {
            let new_qty = basis.qty + trade.quantity;
            basis.avg = (basis.avg * basis.qty + trade.price * trade.quantity) / new_qty;
            basis.qty = new_qty;
            continue;
        }

        if basis.qty <= Decimal::ZERO || basis.avg <= Decimal::ZERO {
            continue;
        }
        let close_qty = trade.quantity.min(basis.qty);
        trade.realized_pnl = match position_side {
            PositionSide::Long => (trade.price - basis.avg) * close_qty,
            PositionSide::Short => (basis.avg - trade.price) * close_qty,
        };
        basis.qty -= close_qty;
        if basis.qty <= Decimal::ZERO {
            basis.qty = Decimal::ZERO;
            basis.avg = Decimal::ZERO;
        }
    }
}
