//! Account state: balances, vesting schedule, voting and recovery data.

use amalgam_protocol::{config, Authority};
use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Asset, PublicKey, Symbol, Timestamp};

/// One account's consensus state.
///
/// The ordered index sorts by `next_vesting_withdrawal` so the weekly
/// power-down pass can walk due accounts from the front; accounts with
/// no active schedule carry `Timestamp::MAX` and sort last.
#[derive(Clone, Debug)]
pub struct AccountObject {
    pub id: ObjectId,
    pub name: AccountName,
    pub memo_key: PublicKey,
    pub json_metadata: String,
    /// Witness-vote proxy; empty means the account votes for itself.
    pub proxy: AccountName,
    pub created: Timestamp,
    pub last_account_update: Timestamp,
    pub recovery_account: AccountName,
    pub last_account_recovery: Timestamp,
    pub can_vote: bool,

    pub balance: Asset,
    pub savings_balance: Asset,
    pub abd_balance: Asset,
    /// Balance-seconds accumulated since the last interest payment.
    pub abd_seconds: u128,
    pub abd_seconds_last_update: Timestamp,
    pub abd_last_interest_payment: Timestamp,
    pub savings_abd_balance: Asset,
    pub savings_abd_seconds: u128,
    pub savings_abd_seconds_last_update: Timestamp,
    pub savings_abd_last_interest_payment: Timestamp,
    pub savings_withdraw_requests: u32,

    pub vesting_shares: Asset,
    pub delegated_vesting_shares: Asset,
    pub received_vesting_shares: Asset,
    pub vesting_withdraw_rate: Asset,
    pub next_vesting_withdrawal: Timestamp,
    /// Shares already paid out of the current withdraw schedule.
    pub withdrawn: i64,
    /// Total shares the current withdraw schedule will pay out.
    pub to_withdraw: i64,
    pub withdraw_routes: u32,

    /// Vote weight reaching this account through proxy chains, bucketed
    /// by chain distance.
    pub proxied_vsf_votes: [i64; config::MAX_PROXY_RECURSION_DEPTH as usize],
    pub witnesses_voted_for: u16,
}

impl AccountObject {
    /// A fresh account with zeroed balances and no vesting schedule.
    pub fn new(id: ObjectId, name: AccountName, created: Timestamp) -> Self {
        Self {
            id,
            name,
            memo_key: PublicKey::ZERO,
            json_metadata: String::new(),
            proxy: config::proxy_to_self(),
            created,
            last_account_update: Timestamp::EPOCH,
            recovery_account: AccountName::empty(),
            last_account_recovery: Timestamp::EPOCH,
            can_vote: true,
            balance: Asset::zero(Symbol::Aml),
            savings_balance: Asset::zero(Symbol::Aml),
            abd_balance: Asset::zero(Symbol::Abd),
            abd_seconds: 0,
            abd_seconds_last_update: created,
            abd_last_interest_payment: created,
            savings_abd_balance: Asset::zero(Symbol::Abd),
            savings_abd_seconds: 0,
            savings_abd_seconds_last_update: created,
            savings_abd_last_interest_payment: created,
            savings_withdraw_requests: 0,
            vesting_shares: Asset::zero(Symbol::Amlv),
            delegated_vesting_shares: Asset::zero(Symbol::Amlv),
            received_vesting_shares: Asset::zero(Symbol::Amlv),
            vesting_withdraw_rate: Asset::zero(Symbol::Amlv),
            next_vesting_withdrawal: Timestamp::MAX,
            withdrawn: 0,
            to_withdraw: 0,
            withdraw_routes: 0,
            proxied_vsf_votes: [0; config::MAX_PROXY_RECURSION_DEPTH as usize],
            witnesses_voted_for: 0,
        }
    }

    pub fn has_proxy(&self) -> bool {
        !self.proxy.is_empty()
    }

    pub fn proxied_vsf_votes_total(&self) -> i64 {
        self.proxied_vsf_votes.iter().sum()
    }

    /// Weight this account contributes to each witness it approves.
    pub fn witness_vote_weight(&self) -> i64 {
        self.vesting_shares.amount + self.proxied_vsf_votes_total()
    }

    /// Own vesting adjusted for delegation; what bandwidth and voting
    /// actually run on.
    pub fn effective_vesting_shares(&self) -> i64 {
        self.vesting_shares.amount - self.delegated_vesting_shares.amount
            + self.received_vesting_shares.amount
    }

    pub fn balance_of(&self, symbol: Symbol) -> Asset {
        match symbol {
            Symbol::Aml => self.balance,
            Symbol::Abd => self.abd_balance,
            Symbol::Amlv => self.vesting_shares,
        }
    }

    pub fn savings_balance_of(&self, symbol: Symbol) -> Asset {
        match symbol {
            Symbol::Aml => self.savings_balance,
            Symbol::Abd => self.savings_abd_balance,
            Symbol::Amlv => Asset::zero(Symbol::Amlv),
        }
    }
}

impl StateObject for AccountObject {
    type Key = AccountName;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.name.clone()
    }

    fn order_key(&self) -> Timestamp {
        self.next_vesting_withdrawal
    }
}

/// The three permission levels of an account, kept apart from the hot
/// balance row because authority rows change on a human timescale.
#[derive(Clone, Debug)]
pub struct AccountAuthorityObject {
    pub id: ObjectId,
    pub account: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub last_owner_update: Timestamp,
}

impl StateObject for AccountAuthorityObject {
    type Key = AccountName;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.account.clone()
    }

    fn order_key(&self) -> Timestamp {
        self.last_owner_update
    }
}

/// A superseded owner authority, kept for the recovery window.
///
/// Rows are pruned once `last_valid_time` falls out of the recovery
/// period, so the table stays bounded.
#[derive(Clone, Debug)]
pub struct OwnerAuthorityHistoryObject {
    pub id: ObjectId,
    pub account: AccountName,
    pub previous_owner_authority: Authority,
    pub last_valid_time: Timestamp,
}

impl StateObject for OwnerAuthorityHistoryObject {
    type Key = ObjectId;
    type OrderKey = (AccountName, Timestamp);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> ObjectId {
        self.id
    }

    fn order_key(&self) -> (AccountName, Timestamp) {
        (self.account.clone(), self.last_valid_time)
    }
}
