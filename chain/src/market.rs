//! The internal AML/ABD market: order matching, fills and cancels.
//!
//! New orders match against the opposing book best price first, always
//! executing at the resting order's price. Integer conversion truncates,
//! so a partially filled order can reach a remainder too small to buy
//! anything; such a remainder is refunded and the order closed.

use std::cmp::Reverse;
use std::ops::Bound;

use amalgam_protocol::operations::FillOrderOp;
use amalgam_protocol::Operation;
use amalgam_store::ObjectId;
use amalgam_types::{Asset, Price};

use crate::error::{ensure, ChainError};
use crate::state::State;

/// Match a freshly created order against the book until it fills or no
/// crossing order remains. Returns whether the order left the book.
pub(crate) fn apply_order(state: &mut State, order_id: ObjectId) -> Result<bool, ChainError> {
    let sell_price = match state.limit_orders.get(order_id) {
        Some(order) => order.sell_price,
        None => return Ok(true),
    };
    // The crossing region of the opposing book: from its best price down
    // to the new order's own rate, inclusive.
    let best = Reverse(Price::max_for(
        sell_price.quote.symbol,
        sell_price.base.symbol,
    ));
    let worst = Reverse(sell_price.invert());

    loop {
        if state.limit_orders.get(order_id).is_none() {
            return Ok(true);
        }
        let counter = state
            .limit_orders
            .range_ordered(
                Bound::Included((best, ObjectId(0))),
                Bound::Included((worst, ObjectId::MAX)),
            )
            .next()
            .map(|order| order.id);
        let Some(counter_id) = counter else {
            return Ok(false);
        };
        if match_orders(state, order_id, counter_id)? {
            return Ok(true);
        }
    }
}

/// Settle one crossing pair at the resting order's price. Returns
/// whether the new order was completely filled.
fn match_orders(
    state: &mut State,
    new_id: ObjectId,
    old_id: ObjectId,
) -> Result<bool, ChainError> {
    let (new_for_sale, new_seller, new_order_id) = {
        let new_order = state
            .limit_orders
            .get(new_id)
            .ok_or_else(|| ChainError::ObjectNotFound(format!("limit order #{new_id}")))?;
        (
            new_order.amount_for_sale(),
            new_order.seller.clone(),
            new_order.order_id,
        )
    };
    let (old_for_sale, old_seller, old_order_id, match_price) = {
        let old_order = state
            .limit_orders
            .get(old_id)
            .ok_or_else(|| ChainError::ObjectNotFound(format!("limit order #{old_id}")))?;
        (
            old_order.amount_for_sale(),
            old_order.seller.clone(),
            old_order.order_id,
            old_order.sell_price,
        )
    };

    let old_in_new_terms = old_for_sale.mul_price(&match_price)?;
    let (new_receives, old_receives) = if new_for_sale.amount <= old_in_new_terms.amount {
        (new_for_sale.mul_price(&match_price)?, new_for_sale)
    } else {
        (old_for_sale, old_in_new_terms)
    };
    let new_pays = old_receives;
    let old_pays = new_receives;

    state.push_virtual_op(Operation::FillOrder(FillOrderOp {
        current_owner: new_seller,
        current_order_id: new_order_id,
        current_pays: new_pays,
        open_owner: old_seller,
        open_order_id: old_order_id,
        open_pays: old_pays,
    }));

    let new_filled = fill_order(state, new_id, new_pays, new_receives)?;
    let old_filled = fill_order(state, old_id, old_pays, old_receives)?;
    ensure(new_filled || old_filled, || {
        "order match settled neither side".to_string()
    })?;
    Ok(new_filled)
}

/// Pay out one side of a match. Returns whether the order is gone from
/// the book, by exact fill or by dust-remainder cancel.
fn fill_order(
    state: &mut State,
    order_id: ObjectId,
    pays: Asset,
    receives: Asset,
) -> Result<bool, ChainError> {
    let (seller, for_sale) = {
        let order = state
            .limit_orders
            .get(order_id)
            .ok_or_else(|| ChainError::ObjectNotFound(format!("limit order #{order_id}")))?;
        (order.seller.clone(), order.amount_for_sale())
    };

    state.adjust_balance(&seller, receives)?;

    if pays == for_sale {
        state.limit_orders.remove(order_id)?;
        return Ok(true);
    }

    let remainder_buys_nothing = {
        let order = state
            .limit_orders
            .modify(order_id, |order| order.for_sale -= pays.amount)?;
        order.amount_to_receive()?.is_zero()
    };
    if remainder_buys_nothing {
        cancel_order(state, order_id)?;
        return Ok(true);
    }
    Ok(false)
}

/// Refund the unfilled remainder to the seller and delete the order.
pub(crate) fn cancel_order(state: &mut State, order_id: ObjectId) -> Result<(), ChainError> {
    let (seller, refund) = {
        let order = state
            .limit_orders
            .get(order_id)
            .ok_or_else(|| ChainError::ObjectNotFound(format!("limit order #{order_id}")))?;
        (order.seller.clone(), order.amount_for_sale())
    };
    state.adjust_balance(&seller, refund)?;
    state.limit_orders.remove(order_id)?;
    Ok(())
}
