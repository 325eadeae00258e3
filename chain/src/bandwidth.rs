//! Stake-weighted rate limiting.
//!
//! Each authorizing account carries an exponentially decaying average of
//! the bytes it has pushed through the chain, scaled by
//! `BANDWIDTH_PRECISION`. An account may transact while its share of
//! total vesting stake, applied to the chain's virtual bandwidth
//! ceiling, exceeds its average use. The ceiling itself breathes with
//! demand through the reserve ratio.

use amalgam_protocol::config;
use amalgam_types::AccountName;

use crate::error::ChainError;
use crate::objects::{AccountBandwidthObject, BandwidthType};
use crate::state::State;

/// Charge one transaction's bytes to an account's bucket and report
/// whether the account is still inside its bandwidth allowance.
///
/// While total vesting stake is zero nothing is tracked and everything
/// is allowed; there is no stake to weight shares by yet.
pub(crate) fn update_account_bandwidth(
    state: &mut State,
    account: &AccountName,
    trx_size: u64,
    kind: BandwidthType,
) -> Result<bool, ChainError> {
    let total_vshares = state.global.get().total_vesting_shares.amount;
    if total_vshares <= 0 {
        return Ok(true);
    }

    let now = state.head_block_time();
    let key = (account.clone(), kind);
    if !state.bandwidth_records.contains(&key) {
        state.bandwidth_records.create(|id| AccountBandwidthObject {
            id,
            account: account.clone(),
            bandwidth_type: kind,
            average_bandwidth: 0,
            lifetime_bandwidth: 0,
            last_bandwidth_update: now,
        })?;
    }

    let (average, last_update) = {
        let record = state.bandwidth_records.find(&key).ok_or_else(|| {
            ChainError::ObjectNotFound(format!("bandwidth record for \"{account}\""))
        })?;
        (record.average_bandwidth, record.last_bandwidth_update)
    };

    let trx_bandwidth = trx_size.saturating_mul(config::BANDWIDTH_PRECISION);
    let window = config::BANDWIDTH_AVERAGE_WINDOW_SECS;
    let elapsed = u64::from(now.secs_since(last_update));
    let decayed = if elapsed > window {
        0
    } else {
        (u128::from(window - elapsed) * u128::from(average) / u128::from(window)) as u64
    };
    let new_average = decayed.saturating_add(trx_bandwidth);

    state.bandwidth_records.modify_by_key(&key, |record| {
        record.average_bandwidth = new_average;
        record.lifetime_bandwidth = record.lifetime_bandwidth.saturating_add(trx_bandwidth);
        record.last_bandwidth_update = now;
    })?;

    let account_vshares = state.get_account(account)?.effective_vesting_shares().max(0) as u128;
    let max_virtual = state.reserve_ratio.get().max_virtual_bandwidth;
    let allowed = account_vshares.saturating_mul(max_virtual)
        > u128::from(new_average).saturating_mul(total_vshares.max(0) as u128);
    Ok(allowed)
}

/// Fold one block's size into the rolling average and, every
/// `RESERVE_RATIO_UPDATE_INTERVAL_BLOCKS`, retune the reserve ratio
/// toward quarter-full blocks.
pub(crate) fn update_reserve_ratio(state: &mut State, block_size: u64) {
    let max_block_size = state.global.get().maximum_block_size;
    let head = state.head_block_num();
    let old_ratio = state.reserve_ratio.get().current_reserve_ratio;

    state.reserve_ratio.modify(|r| {
        r.average_block_size = (99 * r.average_block_size + block_size) / 100;
        if head % config::RESERVE_RATIO_UPDATE_INTERVAL_BLOCKS != 0 {
            return;
        }

        let quarter = i64::from(max_block_size / 4).max(1);
        let distance =
            (r.average_block_size as i64 - quarter) * config::RESERVE_RATIO_PRECISION / quarter;
        if distance > 0 {
            r.current_reserve_ratio -=
                r.current_reserve_ratio * distance / (distance + config::RESERVE_RATIO_PRECISION);
            if r.current_reserve_ratio < config::RESERVE_RATIO_PRECISION {
                r.current_reserve_ratio = config::RESERVE_RATIO_PRECISION;
            }
        } else {
            let increment = (r.current_reserve_ratio * distance
                / (distance - config::RESERVE_RATIO_PRECISION))
                .max(config::RESERVE_RATIO_MIN_INCREMENT);
            r.current_reserve_ratio += increment;
            let cap = config::MAX_RESERVE_RATIO * config::RESERVE_RATIO_PRECISION;
            if r.current_reserve_ratio > cap {
                r.current_reserve_ratio = cap;
            }
        }
        r.update_max_virtual_bandwidth(max_block_size);
    });

    let new_ratio = state.reserve_ratio.get().current_reserve_ratio;
    if new_ratio != old_ratio {
        tracing::debug!(
            old = old_ratio,
            new = new_ratio,
            "reserve ratio adjusted"
        );
    }
}
