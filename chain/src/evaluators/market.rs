//! Limit order placement and cancellation, and ABD conversion requests.

use amalgam_protocol::config;
use amalgam_protocol::operations::{
    ConvertOp, FeedPublishOp, LimitOrderCancelOp, LimitOrderCreate2Op, LimitOrderCreateOp,
};
use amalgam_types::{AccountName, Asset, Price, Timestamp};

use crate::error::{ensure, ChainError};
use crate::market;
use crate::objects::{ConvertRequestObject, LimitOrderObject};
use crate::state::State;

use super::check_liquid;

/// Escrow the sale amount, put the order on the book and match it.
///
/// A fill-or-kill order that does not fill completely fails the whole
/// transaction, which unwinds any partial fills it made.
fn create_order(
    state: &mut State,
    owner: &AccountName,
    order_id: u32,
    amount_to_sell: Asset,
    sell_price: Price,
    fill_or_kill: bool,
    expiration: Timestamp,
) -> Result<(), ChainError> {
    ensure(expiration > state.head_block_time(), || {
        format!("order {order_id} would be created already expired")
    })?;
    ensure(
        !state
            .limit_orders
            .contains(&(owner.clone(), order_id)),
        || format!("\"{owner}\" already has an order {order_id}"),
    )?;
    check_liquid(state, owner, amount_to_sell)?;
    state.adjust_balance(owner, amount_to_sell.negated())?;

    let created = state.head_block_time();
    let id = state
        .limit_orders
        .create(|id| LimitOrderObject {
            id,
            created,
            expiration,
            seller: owner.clone(),
            order_id,
            for_sale: amount_to_sell.amount,
            sell_price,
        })?
        .id;

    let filled = market::apply_order(state, id)?;
    ensure(!fill_or_kill || filled, || {
        format!("fill-or-kill order {order_id} did not fill")
    })?;
    Ok(())
}

pub(super) fn limit_order_create(
    state: &mut State,
    op: &LimitOrderCreateOp,
) -> Result<(), ChainError> {
    create_order(
        state,
        &op.owner,
        op.order_id,
        op.amount_to_sell,
        op.sell_price(),
        op.fill_or_kill,
        op.expiration,
    )
}

pub(super) fn limit_order_create2(
    state: &mut State,
    op: &LimitOrderCreate2Op,
) -> Result<(), ChainError> {
    create_order(
        state,
        &op.owner,
        op.order_id,
        op.amount_to_sell,
        op.sell_price(),
        op.fill_or_kill,
        op.expiration,
    )
}

pub(super) fn limit_order_cancel(
    state: &mut State,
    op: &LimitOrderCancelOp,
) -> Result<(), ChainError> {
    let id = state.get_limit_order(&op.owner, op.order_id)?.id;
    market::cancel_order(state, id)
}

/// Record a witness's view of the ABD/AML price. The chain acts on the
/// median of the elected witnesses' feeds, refreshed hourly.
pub(super) fn feed_publish(state: &mut State, op: &FeedPublishOp) -> Result<(), ChainError> {
    state.get_witness(&op.publisher)?;
    let now = state.head_block_time();
    state.witnesses.modify_by_key(&op.publisher, |w| {
        w.abd_exchange_rate = Some(op.exchange_rate);
        w.last_abd_exchange_update = now;
    })?;
    Ok(())
}

/// Lock ABD for the delayed conversion to AML at the median feed price
/// prevailing when the delay runs out.
pub(super) fn convert(state: &mut State, op: &ConvertOp) -> Result<(), ChainError> {
    ensure(state.median_price().is_some(), || {
        "conversions are suspended while no price feed exists".to_string()
    })?;
    check_liquid(state, &op.owner, op.amount)?;
    ensure(
        !state
            .convert_requests
            .contains(&(op.owner.clone(), op.request_id)),
        || {
            format!(
                "\"{}\" already has a conversion request {}",
                op.owner, op.request_id
            )
        },
    )?;
    state.adjust_balance(&op.owner, op.amount.negated())?;

    let conversion_date = state
        .head_block_time()
        .plus_secs(config::CONVERSION_DELAY_SECS);
    state.convert_requests.create(|id| ConvertRequestObject {
        id,
        owner: op.owner.clone(),
        request_id: op.request_id,
        amount: op.amount,
        conversion_date,
    })?;
    Ok(())
}
