//! Genesis state: the account set, supply and bookkeeping every node
//! starts from.
//!
//! Genesis runs once, outside any undo frame, so its effects are the
//! irreversible baseline all blocks build on. Every node constructing
//! the same [`GenesisParams`] arrives at an identical state.

use amalgam_protocol::{config, Authority};
use amalgam_types::{Asset, BlockId, PublicKey, Symbol, Timestamp};

use crate::error::ChainError;
use crate::objects::{AccountAuthorityObject, AccountObject, BlockSummaryObject, WitnessObject};
use crate::state::State;

/// Configuration for building the genesis state.
#[derive(Clone, Debug)]
pub struct GenesisParams {
    /// Key controlling the initiator account: all three of its authority
    /// levels, its memo key and the signing key of the initial witness.
    pub initiator_key: PublicKey,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            initiator_key: PublicKey::ZERO,
        }
    }
}

/// Build the genesis state in place.
///
/// Creates:
/// - the reserved accounts: `miners` and `null` behind impossible
///   authorities, `temp` behind an open one
/// - the initiator account, holding the liquid part of the initial
///   supply plus all initial vesting shares, registered as the first
///   witness
/// - the supply totals in the global properties
/// - the 65536-slot block-summary ring, zeroed
pub(crate) fn initialize(state: &mut State, params: &GenesisParams) -> Result<(), ChainError> {
    let created = config::GENESIS_TIME;

    for name in [config::miners_account(), config::null_account()] {
        state
            .accounts
            .create(|id| AccountObject::new(id, name.clone(), created))?;
        state.account_authorities.create(|id| AccountAuthorityObject {
            id,
            account: name.clone(),
            owner: Authority::impossible(),
            active: Authority::impossible(),
            posting: Authority::impossible(),
            last_owner_update: Timestamp::EPOCH,
        })?;
    }

    // The temp account is a pass-through: its zero-threshold authorities
    // let anyone sign for whatever lands there.
    let temp = config::temp_account();
    state
        .accounts
        .create(|id| AccountObject::new(id, temp.clone(), created))?;
    state.account_authorities.create(|id| AccountAuthorityObject {
        id,
        account: temp,
        owner: Authority::new(0),
        active: Authority::new(0),
        posting: Authority::new(0),
        last_owner_update: Timestamp::EPOCH,
    })?;

    let initiator = config::initiator_account();
    state.accounts.create(|id| {
        let mut a = AccountObject::new(id, initiator.clone(), created);
        a.memo_key = params.initiator_key;
        a.balance = Asset::new(
            config::INIT_SUPPLY - config::INIT_VESTING_FUND,
            Symbol::Aml,
        );
        a.vesting_shares = Asset::new(config::INIT_VESTING_SHARES, Symbol::Amlv);
        a
    })?;
    state.account_authorities.create(|id| AccountAuthorityObject {
        id,
        account: initiator.clone(),
        owner: Authority::single_key(params.initiator_key),
        active: Authority::single_key(params.initiator_key),
        posting: Authority::single_key(params.initiator_key),
        last_owner_update: Timestamp::EPOCH,
    })?;

    state.witnesses.create(|id| {
        let mut w = WitnessObject::new(id, initiator.clone(), created);
        w.signing_key = params.initiator_key;
        w
    })?;

    state.global.modify(|g| {
        g.current_witness = initiator;
        g.current_supply = Asset::new(config::INIT_SUPPLY, Symbol::Aml);
        g.virtual_supply = Asset::new(config::INIT_SUPPLY, Symbol::Aml);
        g.total_vesting_fund_aml = Asset::new(config::INIT_VESTING_FUND, Symbol::Aml);
        g.total_vesting_shares = Asset::new(config::INIT_VESTING_SHARES, Symbol::Amlv);
    });

    for slot in 0..=u16::MAX {
        state.block_summaries.create(|id| BlockSummaryObject {
            id,
            slot,
            block_id: BlockId::ZERO,
        })?;
    }

    Ok(())
}
