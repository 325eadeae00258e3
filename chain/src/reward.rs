//! Reward-fund math: the claim curve, payout division and the
//! per-block inflation split.
//!
//! Payouts divide a shared pot by a decaying claim accumulator, so the
//! intermediate products routinely exceed 128 bits. All division here
//! goes through an exact 256-bit intermediate; nothing rounds through
//! floating point.

use amalgam_protocol::operations::ProducerRewardOp;
use amalgam_protocol::{config, Operation};
use amalgam_types::{Asset, Price, Symbol};

use crate::error::ChainError;
use crate::objects::{RewardCurve, RewardFund};
use crate::state::State;

// ── Wide arithmetic ──────────────────────────────────────────────────────

/// Full 256-bit product of two `u128` values, as `(high, low)` halves.
fn wide_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Floor of `a * b / divisor` with an exact 256-bit intermediate.
///
/// Saturates to `u128::MAX` when the quotient does not fit or the
/// divisor is zero; callers bound their inputs so neither arises in
/// consensus paths.
fn mul_div(a: u128, b: u128, divisor: u128) -> u128 {
    let (hi, lo) = wide_mul(a, b);
    if divisor == 0 || hi >= divisor {
        return u128::MAX;
    }
    if hi == 0 {
        return lo / divisor;
    }
    // Binary long division of the 256-bit product. The upper half
    // contributes only its residue since hi < divisor.
    let mut quotient = 0u128;
    let mut remainder = hi % divisor;
    for i in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= divisor {
            remainder = remainder.wrapping_sub(divisor);
            quotient |= 1;
        }
    }
    quotient
}

// ── Claim curve and payout ───────────────────────────────────────────────

/// Map an accumulated claim weight through a reward curve.
///
/// The quadratic curve is `(r + s)^2 - s^2` for content constant `s`,
/// computed in its expanded form `r * (r + 2s)`.
pub fn evaluate_reward_curve(rshares: u128, curve: RewardCurve, content_constant: u128) -> u128 {
    match curve {
        RewardCurve::Quadratic => rshares
            .saturating_mul(rshares.saturating_add(content_constant.saturating_mul(2))),
        RewardCurve::Linear => rshares,
    }
}

/// The AML a curved claim earns from the fund right now.
///
/// `payout = claim * reward_weight / 100% * pot / recent_claims`,
/// floored at every division and capped by the fund balance.
pub fn claim_payout(claim: u128, reward_weight: u16, fund: &RewardFund) -> Asset {
    if fund.recent_claims == 0 || fund.reward_balance.amount <= 0 {
        return Asset::zero(Symbol::Aml);
    }
    let weighted = claim.saturating_mul(u128::from(reward_weight)) / u128::from(config::PERCENT_100);
    let payout = mul_div(
        weighted,
        fund.reward_balance.amount as u128,
        fund.recent_claims,
    );
    let capped = payout.min(fund.reward_balance.amount as u128);
    Asset::new(capped as i64, Symbol::Aml)
}

/// Whether an AML payout falls under the minimum and should be dropped.
///
/// Without a price feed every payout is dust; value cannot be measured.
pub fn is_payout_dust(median: Option<Price>, payout: Asset) -> bool {
    let Some(median) = median else {
        return true;
    };
    match payout.mul_price(&median) {
        Ok(abd) => abd.amount < config::min_payout().amount,
        Err(_) => true,
    }
}

// ── Per-block funding ────────────────────────────────────────────────────

/// Age the reward fund's claim accumulator down toward zero.
///
/// Claims decay linearly over the decay window, measured from the last
/// time the fund was touched.
pub(crate) fn decay_recent_claims(state: &mut State) {
    let now = state.head_block_time();
    state.reward_fund.modify(|fund| {
        let elapsed = u128::from(now.secs_since(fund.last_update));
        let decay = (fund.recent_claims.saturating_mul(elapsed)
            / u128::from(config::RECENT_RSHARES_DECAY_SECS))
        .min(fund.recent_claims);
        fund.recent_claims -= decay;
        fund.last_update = now;
    });
}

/// Mint one block's inflation and split it between the content fund,
/// the vesting pool and the producing witness.
///
/// The annual rate starts at [`config::INFLATION_RATE_START_PERCENT`]
/// basis points and narrows by one basis point every
/// [`config::INFLATION_NARROWING_PERIOD`] blocks until it reaches the
/// stop rate. The witness share vests at the price that already
/// includes this block's vesting-pool contribution.
pub(crate) fn process_inflation(state: &mut State) -> Result<(), ChainError> {
    let head = state.head_block_num();
    let narrowing = i64::from(head / config::INFLATION_NARROWING_PERIOD);
    let rate = (i64::from(config::INFLATION_RATE_START_PERCENT) - narrowing)
        .max(i64::from(config::INFLATION_RATE_STOP_PERCENT));

    let new_aml = state.global.get().virtual_supply.amount.saturating_mul(rate)
        / (i64::from(config::PERCENT_100) * i64::from(config::BLOCKS_PER_YEAR));

    let content_reward = new_aml * i64::from(config::CONTENT_REWARD_PERCENT)
        / i64::from(config::PERCENT_100);
    let vesting_reward = new_aml * i64::from(config::VESTING_FUND_PERCENT)
        / i64::from(config::PERCENT_100);
    let witness_reward = new_aml - content_reward - vesting_reward;

    state
        .reward_fund
        .modify(|fund| fund.reward_balance.amount += content_reward);
    decay_recent_claims(state);

    state.global.modify(|g| {
        g.total_vesting_fund_aml.amount += vesting_reward;
        g.current_supply.amount += new_aml;
        g.virtual_supply.amount += new_aml;
    });

    let witness = state.global.get().current_witness.clone();
    let reward = state.create_vesting(&witness, Asset::new(witness_reward, Symbol::Aml))?;
    state.push_virtual_op(Operation::ProducerReward(ProducerRewardOp {
        producer: witness,
        vesting_shares: reward,
    }));
    Ok(())
}
