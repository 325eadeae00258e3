//! The mutable consensus state: every table and singleton, plus the
//! balance, vesting and vote bookkeeping the evaluators share.
//!
//! All mutation funnels through [`State`] methods or the typed tables,
//! both of which journal into the open undo frame, so a failed
//! transaction rolls back without a trace. The driver owns frame
//! boundaries; nothing here opens or closes one on its own.

use std::ops::Bound;

use amalgam_protocol::operations::InterestOp;
use amalgam_protocol::{config, Authority, Operation};
use amalgam_store::{ObjectId, Singleton, StoreError, Table};
use amalgam_types::{AccountName, Asset, Price, Symbol, Timestamp, TypeError};

use crate::error::{ensure, ChainError};
use crate::objects::{
    AccountAuthorityObject, AccountBandwidthObject, AccountObject, AccountRecoveryRequestObject,
    BlockSummaryObject, ChangeRecoveryAccountRequestObject, ConvertRequestObject,
    DeclineVotingRightsRequestObject, DynamicGlobalProperties, EscrowObject, FeedHistory,
    LimitOrderObject, OwnerAuthorityHistoryObject, ReserveRatio, RewardFund,
    SavingsWithdrawObject, TransactionRecordObject, VestingDelegationExpirationObject,
    VestingDelegationObject, WithdrawVestingRouteObject, WitnessObject, WitnessVoteObject,
};

/// Buckets of a proxy-change delta: the account's own stake first, then
/// one bucket per proxied depth.
pub(crate) const PROXY_VOTE_BUCKETS: usize = config::MAX_PROXY_RECURSION_DEPTH as usize + 1;

/// Which ABD balance of an account accrues interest.
#[derive(Clone, Copy)]
enum AbdBucket {
    Liquid,
    Savings,
}

pub struct State {
    pub accounts: Table<AccountObject>,
    pub account_authorities: Table<AccountAuthorityObject>,
    pub owner_authority_history: Table<OwnerAuthorityHistoryObject>,
    pub witnesses: Table<WitnessObject>,
    pub witness_votes: Table<WitnessVoteObject>,
    pub limit_orders: Table<LimitOrderObject>,
    pub convert_requests: Table<ConvertRequestObject>,
    pub escrows: Table<EscrowObject>,
    pub savings_withdraws: Table<SavingsWithdrawObject>,
    pub vesting_delegations: Table<VestingDelegationObject>,
    pub delegation_expirations: Table<VestingDelegationExpirationObject>,
    pub withdraw_routes: Table<WithdrawVestingRouteObject>,
    pub recovery_requests: Table<AccountRecoveryRequestObject>,
    pub recovery_change_requests: Table<ChangeRecoveryAccountRequestObject>,
    pub decline_voting_requests: Table<DeclineVotingRightsRequestObject>,
    pub bandwidth_records: Table<AccountBandwidthObject>,
    pub transaction_records: Table<TransactionRecordObject>,
    pub block_summaries: Table<BlockSummaryObject>,

    pub global: Singleton<DynamicGlobalProperties>,
    pub feed_history: Singleton<FeedHistory>,
    pub reserve_ratio: Singleton<ReserveRatio>,
    pub reward_fund: Singleton<RewardFund>,

    /// Virtual operations emitted while applying the current operation.
    /// Drained by the driver after each evaluation; not undo-tracked.
    pub(crate) virtual_ops: Vec<Operation>,
}

macro_rules! stores {
    ($($store:ident),* $(,)?) => {
        /// Open a new undo frame across every table and singleton.
        pub fn begin(&mut self) {
            $( self.$store.begin(); )*
        }

        /// Revert the deepest frame everywhere, in lockstep.
        pub fn undo(&mut self) -> Result<(), StoreError> {
            $( self.$store.undo()?; )*
            Ok(())
        }

        /// Fold the deepest frame into its parent everywhere.
        pub fn squash(&mut self) -> Result<(), StoreError> {
            $( self.$store.squash()?; )*
            Ok(())
        }

        /// Make the oldest frame irreversible everywhere.
        pub fn commit_oldest(&mut self) -> Result<(), StoreError> {
            $( self.$store.commit_oldest()?; )*
            Ok(())
        }
    };
}

impl State {
    /// Empty tables and pre-genesis singleton values.
    pub fn new() -> Self {
        let global = DynamicGlobalProperties::initial();
        let reserve_ratio = ReserveRatio::initial(global.maximum_block_size);
        Self {
            accounts: Table::new(),
            account_authorities: Table::new(),
            owner_authority_history: Table::new(),
            witnesses: Table::new(),
            witness_votes: Table::new(),
            limit_orders: Table::new(),
            convert_requests: Table::new(),
            escrows: Table::new(),
            savings_withdraws: Table::new(),
            vesting_delegations: Table::new(),
            delegation_expirations: Table::new(),
            withdraw_routes: Table::new(),
            recovery_requests: Table::new(),
            recovery_change_requests: Table::new(),
            decline_voting_requests: Table::new(),
            bandwidth_records: Table::new(),
            transaction_records: Table::new(),
            block_summaries: Table::new(),
            global: Singleton::new(global),
            feed_history: Singleton::new(FeedHistory::default()),
            reserve_ratio: Singleton::new(reserve_ratio),
            reward_fund: Singleton::new(RewardFund::initial()),
            virtual_ops: Vec::new(),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn global(&self) -> &DynamicGlobalProperties {
        self.global.get()
    }

    pub fn head_block_num(&self) -> u32 {
        self.global.get().head_block_number
    }

    pub fn head_block_time(&self) -> Timestamp {
        self.global.get().time
    }

    /// The current median price feed, if one has been established.
    pub fn median_price(&self) -> Option<Price> {
        self.feed_history.get().current_median
    }

    pub fn get_account(&self, name: &AccountName) -> Result<&AccountObject, ChainError> {
        self.accounts
            .find(name)
            .ok_or_else(|| ChainError::UnknownAccount(name.clone()))
    }

    pub fn get_account_authority(
        &self,
        name: &AccountName,
    ) -> Result<&AccountAuthorityObject, ChainError> {
        self.account_authorities
            .find(name)
            .ok_or_else(|| ChainError::UnknownAccount(name.clone()))
    }

    pub fn get_witness(&self, name: &AccountName) -> Result<&WitnessObject, ChainError> {
        self.witnesses
            .find(name)
            .ok_or_else(|| ChainError::UnknownWitness(name.clone()))
    }

    pub fn get_escrow(
        &self,
        from: &AccountName,
        escrow_id: u32,
    ) -> Result<&EscrowObject, ChainError> {
        self.escrows.find(&(from.clone(), escrow_id)).ok_or_else(|| {
            ChainError::ObjectNotFound(format!("escrow {escrow_id} from \"{from}\""))
        })
    }

    pub fn get_limit_order(
        &self,
        seller: &AccountName,
        order_id: u32,
    ) -> Result<&LimitOrderObject, ChainError> {
        self.limit_orders
            .find(&(seller.clone(), order_id))
            .ok_or_else(|| {
                ChainError::ObjectNotFound(format!("limit order {order_id} of \"{seller}\""))
            })
    }

    pub fn get_savings_withdraw(
        &self,
        from: &AccountName,
        request_id: u32,
    ) -> Result<&SavingsWithdrawObject, ChainError> {
        self.savings_withdraws
            .find(&(from.clone(), request_id))
            .ok_or_else(|| {
                ChainError::ObjectNotFound(format!(
                    "savings withdrawal {request_id} from \"{from}\""
                ))
            })
    }

    // ── Virtual operations ──────────────────────────────────────────────

    pub(crate) fn push_virtual_op(&mut self, op: Operation) {
        self.virtual_ops.push(op);
    }

    // ── Balance and supply bookkeeping ──────────────────────────────────

    /// Credit or debit a liquid balance.
    ///
    /// ABD adjustments first accrue interest on the touched balance, so
    /// balance-seconds always integrate over a constant balance.
    pub(crate) fn adjust_balance(
        &mut self,
        name: &AccountName,
        delta: Asset,
    ) -> Result<(), ChainError> {
        match delta.symbol {
            Symbol::Aml => {
                let updated = self.get_account(name)?.balance.checked_add(delta)?;
                ensure(!updated.is_negative(), || {
                    format!("AML balance of \"{name}\" would go negative")
                })?;
                self.accounts.modify_by_key(name, |a| a.balance = updated)?;
                Ok(())
            }
            Symbol::Abd => {
                self.accrue_abd_interest(name, AbdBucket::Liquid)?;
                let updated = self.get_account(name)?.abd_balance.checked_add(delta)?;
                ensure(!updated.is_negative(), || {
                    format!("ABD balance of \"{name}\" would go negative")
                })?;
                self.accounts.modify_by_key(name, |a| a.abd_balance = updated)?;
                Ok(())
            }
            Symbol::Amlv => Err(ChainError::Precondition(
                "vesting shares are not a liquid balance".to_string(),
            )),
        }
    }

    /// Credit or debit a savings balance; ABD interest accrues here too.
    pub(crate) fn adjust_savings_balance(
        &mut self,
        name: &AccountName,
        delta: Asset,
    ) -> Result<(), ChainError> {
        match delta.symbol {
            Symbol::Aml => {
                let updated = self.get_account(name)?.savings_balance.checked_add(delta)?;
                ensure(!updated.is_negative(), || {
                    format!("AML savings of \"{name}\" would go negative")
                })?;
                self.accounts
                    .modify_by_key(name, |a| a.savings_balance = updated)?;
                Ok(())
            }
            Symbol::Abd => {
                self.accrue_abd_interest(name, AbdBucket::Savings)?;
                let updated = self
                    .get_account(name)?
                    .savings_abd_balance
                    .checked_add(delta)?;
                ensure(!updated.is_negative(), || {
                    format!("ABD savings of \"{name}\" would go negative")
                })?;
                self.accounts
                    .modify_by_key(name, |a| a.savings_abd_balance = updated)?;
                Ok(())
            }
            Symbol::Amlv => Err(ChainError::Precondition(
                "vesting shares cannot be held in savings".to_string(),
            )),
        }
    }

    /// Integrate balance-seconds and pay compound interest once the
    /// payment interval has passed.
    fn accrue_abd_interest(
        &mut self,
        name: &AccountName,
        bucket: AbdBucket,
    ) -> Result<(), ChainError> {
        let now = self.head_block_time();
        let rate = self.global.get().abd_interest_rate;
        let (balance, seconds, last_update, last_payment) = {
            let account = self.get_account(name)?;
            match bucket {
                AbdBucket::Liquid => (
                    account.abd_balance,
                    account.abd_seconds,
                    account.abd_seconds_last_update,
                    account.abd_last_interest_payment,
                ),
                AbdBucket::Savings => (
                    account.savings_abd_balance,
                    account.savings_abd_seconds,
                    account.savings_abd_seconds_last_update,
                    account.savings_abd_last_interest_payment,
                ),
            }
        };
        if last_update == now {
            return Ok(());
        }

        let seconds =
            seconds + (balance.amount.max(0) as u128) * u128::from(now.secs_since(last_update));
        let due = seconds > 0
            && now.secs_since(last_payment) > config::ABD_INTEREST_COMPOUND_INTERVAL_SECS;
        let interest = if due {
            let wide = seconds / u128::from(config::SECONDS_PER_YEAR) * u128::from(rate)
                / u128::from(config::PERCENT_100);
            i64::try_from(wide).map_err(|_| ChainError::Type(TypeError::AmountOverflow))?
        } else {
            0
        };

        self.accounts.modify_by_key(name, |a| {
            let (bal, sec, upd, paid) = match bucket {
                AbdBucket::Liquid => (
                    &mut a.abd_balance,
                    &mut a.abd_seconds,
                    &mut a.abd_seconds_last_update,
                    &mut a.abd_last_interest_payment,
                ),
                AbdBucket::Savings => (
                    &mut a.savings_abd_balance,
                    &mut a.savings_abd_seconds,
                    &mut a.savings_abd_seconds_last_update,
                    &mut a.savings_abd_last_interest_payment,
                ),
            };
            *upd = now;
            if due {
                bal.amount += interest;
                *sec = 0;
                *paid = now;
            } else {
                *sec = seconds;
            }
        })?;

        if due && interest > 0 {
            let paid = Asset::new(interest, Symbol::Abd);
            self.push_virtual_op(Operation::Interest(InterestOp {
                owner: name.clone(),
                interest: paid,
            }));
            let in_aml = match self.median_price() {
                Some(median) => paid.mul_price(&median)?,
                None => Asset::zero(Symbol::Aml),
            };
            self.global.modify(|g| {
                g.current_abd_supply.amount += interest;
                g.virtual_supply.amount += in_aml.amount;
            });
        }
        Ok(())
    }

    /// Track issuance and destruction in the global supply counters.
    pub(crate) fn adjust_supply(&mut self, delta: Asset) -> Result<(), ChainError> {
        match delta.symbol {
            Symbol::Aml => {
                self.global.modify(|g| {
                    g.current_supply.amount += delta.amount;
                    g.virtual_supply.amount += delta.amount;
                });
                ensure(self.global.get().current_supply.amount >= 0, || {
                    "AML supply went negative".to_string()
                })
            }
            Symbol::Abd => {
                let median = self.median_price();
                self.global
                    .modify(|g| g.current_abd_supply.amount += delta.amount);
                let abd_supply = self.global.get().current_abd_supply;
                ensure(abd_supply.amount >= 0, || {
                    "ABD supply went negative".to_string()
                })?;
                let in_aml = match median {
                    Some(m) => abd_supply.mul_price(&m)?,
                    None => Asset::zero(Symbol::Aml),
                };
                self.global.modify(|g| {
                    g.virtual_supply.amount = g.current_supply.amount + in_aml.amount;
                });
                Ok(())
            }
            Symbol::Amlv => Err(ChainError::Precondition(
                "vesting shares are not part of the liquid supply".to_string(),
            )),
        }
    }

    /// Convert liquid AML into new vesting shares for `to` at the
    /// current vesting price, growing both sides of the ratio.
    pub(crate) fn create_vesting(
        &mut self,
        to: &AccountName,
        liquid: Asset,
    ) -> Result<Asset, ChainError> {
        ensure(liquid.symbol == Symbol::Aml, || {
            format!("cannot vest {liquid}")
        })?;
        let price = self.global.get().vesting_share_price();
        let new_vesting = liquid.mul_price(&price)?;
        self.accounts
            .modify_by_key(to, |a| a.vesting_shares.amount += new_vesting.amount)?;
        self.global.modify(|g| {
            g.total_vesting_fund_aml.amount += liquid.amount;
            g.total_vesting_shares.amount += new_vesting.amount;
        });
        self.adjust_proxied_witness_votes(to, new_vesting.amount)?;
        Ok(new_vesting)
    }

    // ── Witness vote tallies ────────────────────────────────────────────

    /// Apply a stake delta to one witness's vote total.
    pub(crate) fn adjust_witness_vote(
        &mut self,
        witness: &AccountName,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.witnesses.modify_by_key(witness, |w| w.votes += delta)?;
        Ok(())
    }

    /// Apply a stake delta to every witness the account approves.
    pub(crate) fn adjust_witness_votes(
        &mut self,
        account: &AccountName,
        delta: i64,
    ) -> Result<(), ChainError> {
        let approved: Vec<AccountName> = self
            .witness_votes
            .range_ordered(
                Bound::Included(((account.clone(), AccountName::empty()), ObjectId(0))),
                Bound::Unbounded,
            )
            .take_while(|vote| vote.account == *account)
            .map(|vote| vote.witness.clone())
            .collect();
        for witness in approved {
            self.adjust_witness_vote(&witness, delta)?;
        }
        Ok(())
    }

    /// Propagate a vesting-stake delta up the proxy chain, landing on
    /// witness vote totals where a chain ends.
    pub(crate) fn adjust_proxied_witness_votes(
        &mut self,
        account: &AccountName,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.propagate_stake_delta(account, delta, 0)
    }

    fn propagate_stake_delta(
        &mut self,
        account: &AccountName,
        delta: i64,
        depth: u32,
    ) -> Result<(), ChainError> {
        let proxy = {
            let a = self.get_account(account)?;
            a.has_proxy().then(|| a.proxy.clone())
        };
        match proxy {
            Some(proxy) => {
                if depth >= config::MAX_PROXY_RECURSION_DEPTH {
                    return Ok(());
                }
                self.accounts
                    .modify_by_key(&proxy, |a| a.proxied_vsf_votes[depth as usize] += delta)?;
                self.propagate_stake_delta(&proxy, delta, depth + 1)
            }
            None => self.adjust_witness_votes(account, delta),
        }
    }

    /// Propagate a full bucket vector up the proxy chain; used when the
    /// account's own proxy assignment is what changes.
    pub(crate) fn adjust_proxied_witness_vote_buckets(
        &mut self,
        account: &AccountName,
        delta: &[i64; PROXY_VOTE_BUCKETS],
    ) -> Result<(), ChainError> {
        self.propagate_stake_buckets(account, delta, 0)
    }

    fn propagate_stake_buckets(
        &mut self,
        account: &AccountName,
        delta: &[i64; PROXY_VOTE_BUCKETS],
        depth: u32,
    ) -> Result<(), ChainError> {
        let proxy = {
            let a = self.get_account(account)?;
            a.has_proxy().then(|| a.proxy.clone())
        };
        match proxy {
            Some(proxy) => {
                if depth >= config::MAX_PROXY_RECURSION_DEPTH {
                    return Ok(());
                }
                // Buckets slide one hop deeper at each step; whatever
                // would pass the depth limit falls off.
                let take = (config::MAX_PROXY_RECURSION_DEPTH - depth) as usize;
                self.accounts.modify_by_key(&proxy, |a| {
                    for (i, d) in delta[..take].iter().enumerate() {
                        a.proxied_vsf_votes[i + depth as usize] += d;
                    }
                })?;
                self.propagate_stake_buckets(&proxy, delta, depth + 1)
            }
            None => {
                let take = (config::MAX_PROXY_RECURSION_DEPTH - depth) as usize + 1;
                let total: i64 = delta[..take].iter().sum();
                self.adjust_witness_votes(account, total)
            }
        }
    }

    /// Remove every approval the account has cast. Vote totals are not
    /// touched; callers settle tallies through the delta machinery.
    pub(crate) fn clear_witness_votes(&mut self, account: &AccountName) -> Result<(), ChainError> {
        let ids: Vec<ObjectId> = self
            .witness_votes
            .range_ordered(
                Bound::Included(((account.clone(), AccountName::empty()), ObjectId(0))),
                Bound::Unbounded,
            )
            .take_while(|vote| vote.account == *account)
            .map(|vote| vote.id)
            .collect();
        for id in ids {
            self.witness_votes.remove(id)?;
        }
        self.accounts
            .modify_by_key(account, |a| a.witnesses_voted_for = 0)?;
        Ok(())
    }

    // ── Owner authority ─────────────────────────────────────────────────

    /// Install a new owner authority, archiving the old one for the
    /// recovery window.
    pub(crate) fn update_owner_authority(
        &mut self,
        account: &AccountName,
        new_owner: Authority,
    ) -> Result<(), ChainError> {
        let now = self.head_block_time();
        let previous = self.get_account_authority(account)?.owner.clone();
        self.owner_authority_history
            .create(|id| OwnerAuthorityHistoryObject {
                id,
                account: account.clone(),
                previous_owner_authority: previous,
                last_valid_time: now,
            })?;
        self.account_authorities.modify_by_key(account, |auth| {
            auth.owner = new_owner;
            auth.last_owner_update = now;
        })?;
        Ok(())
    }

    // ── Undo sessions ───────────────────────────────────────────────────

    stores!(
        accounts,
        account_authorities,
        owner_authority_history,
        witnesses,
        witness_votes,
        limit_orders,
        convert_requests,
        escrows,
        savings_withdraws,
        vesting_delegations,
        delegation_expirations,
        withdraw_routes,
        recovery_requests,
        recovery_change_requests,
        decline_voting_requests,
        bandwidth_records,
        transaction_records,
        block_summaries,
        global,
        feed_history,
        reserve_ratio,
        reward_fund,
    );

    pub fn undo_depth(&self) -> usize {
        self.accounts.undo_depth()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
