//! Block application: admission checks, per-transaction authority and
//! bandwidth gating, evaluator dispatch and the per-block maintenance
//! sweep.
//!
//! The [`Database`] owns the consensus [`State`] behind a lock and is
//! the only way blocks and transactions reach it. Every applied block
//! opens one undo frame, so recent blocks can be popped off during
//! forks; frames beyond `max_undo_history` are folded into the
//! irreversible baseline.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::{Mutex, RwLock};

use amalgam_protocol::operations::{
    ChainProperties, FillConvertRequestOp, FillTransferFromSavingsOp, FillVestingWithdrawOp,
    ReturnVestingDelegationOp,
};
use amalgam_protocol::{
    config, verify_authority, Authority, AuthorityLevel, AuthorityProvider, Operation,
    ProtocolError, RequiredAuthorities, SignedBlock, SignedTransaction,
};
use amalgam_store::ObjectId;
use amalgam_types::{AccountName, Asset, BlockId, Digest, Price, Symbol, Timestamp, TransactionId};

use crate::bandwidth;
use crate::error::{ensure, ChainError};
use crate::evaluators;
use crate::genesis::{self, GenesisParams};
use crate::market;
use crate::objects::{BandwidthType, TransactionRecordObject};
use crate::reward;
use crate::state::{State, PROXY_VOTE_BUCKETS};

/// Settings that shape how blocks and transactions are admitted.
#[derive(Clone, Debug)]
pub struct DatabaseOptions {
    /// Chain id every transaction signature must commit to.
    pub chain_id: Digest,
    /// Charge stake-weighted bandwidth for each transaction. Replay of
    /// trusted history is the only reason to turn this off.
    pub enforce_bandwidth: bool,
    /// Number of reversible blocks to retain; anything older becomes
    /// part of the irreversible baseline and can no longer be popped.
    pub max_undo_history: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            chain_id: config::chain_id(),
            enforce_bandwidth: true,
            max_undo_history: config::MAX_UNDO_HISTORY,
        }
    }
}

/// Where in the chain an operation ran, handed to operation observers.
#[derive(Clone, Debug)]
pub struct OperationNotification {
    /// Id of the carrying transaction, or zero for virtual operations
    /// emitted by block-level maintenance.
    pub trx_id: TransactionId,
    pub block: u32,
    pub trx_in_block: u32,
    pub op_in_trx: u32,
    /// Zero for a user operation; the virtual operations it emitted
    /// count up from one.
    pub virtual_op: u32,
    pub op: Operation,
}

pub type OperationListener = Box<dyn Fn(&OperationNotification) + Send + Sync>;
pub type TransactionListener = Box<dyn Fn(&SignedTransaction) + Send + Sync>;
pub type BlockListener = Box<dyn Fn(&SignedBlock) + Send + Sync>;

#[derive(Default)]
struct Observers {
    pre_apply: Vec<OperationListener>,
    post_apply: Vec<OperationListener>,
    pre_apply_trx: Vec<TransactionListener>,
    post_apply_trx: Vec<TransactionListener>,
    pre_apply_block: Vec<BlockListener>,
    post_apply_block: Vec<BlockListener>,
}

/// Authority lookups backed by live state, for signature verification.
struct StateAuthorities<'a>(&'a State);

impl AuthorityProvider for StateAuthorities<'_> {
    fn authority(
        &self,
        account: &AccountName,
        level: AuthorityLevel,
    ) -> Result<Authority, ProtocolError> {
        let row = self
            .0
            .account_authorities
            .find(account)
            .ok_or_else(|| ProtocolError::UnknownAuthorityAccount(account.clone()))?;
        Ok(match level {
            AuthorityLevel::Owner => row.owner.clone(),
            AuthorityLevel::Active => row.active.clone(),
            AuthorityLevel::Posting => row.posting.clone(),
        })
    }
}

/// The consensus state machine.
pub struct Database {
    state: RwLock<State>,
    options: DatabaseOptions,
    observers: Mutex<Observers>,
}

impl Database {
    /// Open a database holding only the default genesis state.
    pub fn new(options: DatabaseOptions) -> Result<Self, ChainError> {
        Self::with_genesis(options, &GenesisParams::default())
    }

    pub fn with_genesis(
        options: DatabaseOptions,
        params: &GenesisParams,
    ) -> Result<Self, ChainError> {
        let mut state = State::new();
        genesis::initialize(&mut state, params)?;
        Ok(Self {
            state: RwLock::new(state),
            options,
            observers: Mutex::new(Observers::default()),
        })
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Run `read` against the current state under the read lock.
    pub fn with_state<R>(&self, read: impl FnOnce(&State) -> R) -> R {
        read(&self.state.read().unwrap())
    }

    pub fn head_block_num(&self) -> u32 {
        self.with_state(|s| s.head_block_num())
    }

    pub fn head_block_time(&self) -> Timestamp {
        self.with_state(|s| s.head_block_time())
    }

    /// Register a listener fired before each operation applies.
    ///
    /// Listeners run inline on the applying thread while the state lock
    /// is held: keep them fast, and never call back into the database
    /// from one. Speculative applications through
    /// [`Database::validate_transaction`] notify as well.
    pub fn on_pre_apply_operation(&self, listener: OperationListener) {
        self.observers.lock().unwrap().pre_apply.push(listener);
    }

    /// Register a listener fired after each operation applies.
    pub fn on_post_apply_operation(&self, listener: OperationListener) {
        self.observers.lock().unwrap().post_apply.push(listener);
    }

    /// Register a listener fired once a transaction has passed admission,
    /// before its operations run.
    pub fn on_pre_apply_transaction(&self, listener: TransactionListener) {
        self.observers.lock().unwrap().pre_apply_trx.push(listener);
    }

    /// Register a listener fired after a transaction's operations have run.
    pub fn on_post_apply_transaction(&self, listener: TransactionListener) {
        self.observers.lock().unwrap().post_apply_trx.push(listener);
    }

    /// Register a listener fired once a block has passed admission,
    /// before its transactions run.
    pub fn on_pre_apply_block(&self, listener: BlockListener) {
        self.observers.lock().unwrap().pre_apply_block.push(listener);
    }

    /// Register a listener fired after a block has fully applied,
    /// maintenance included.
    pub fn on_post_apply_block(&self, listener: BlockListener) {
        self.observers.lock().unwrap().post_apply_block.push(listener);
    }

    /// Apply `block` on top of the current head.
    ///
    /// The block either applies in full or leaves no trace. On success
    /// it stays reversible via [`Database::pop_block`] until it ages out
    /// of the undo history.
    pub fn apply_block(&self, block: &SignedBlock) -> Result<(), ChainError> {
        let mut state = self.state.write().unwrap();
        state.begin();
        match self.apply_block_inner(&mut state, block) {
            Ok(()) => {
                while state.undo_depth() > self.options.max_undo_history as usize {
                    state.commit_oldest()?;
                }
                tracing::debug!(
                    num = block.block_num(),
                    transactions = block.transactions.len(),
                    "applied block"
                );
                Ok(())
            }
            Err(err) => {
                state.virtual_ops.clear();
                state.undo()?;
                Err(err)
            }
        }
    }

    /// Rewind the most recent block, restoring the previous head.
    pub fn pop_block(&self) -> Result<(), ChainError> {
        let mut state = self.state.write().unwrap();
        ensure(state.undo_depth() > 0, || {
            "there is no reversible block to pop".to_string()
        })?;
        state.undo()?;
        Ok(())
    }

    /// Dry-run a transaction against the head state.
    ///
    /// Performs the full admission pipeline, then unwinds every effect.
    /// This is what a node runs before relaying a pending transaction.
    pub fn validate_transaction(&self, tx: &SignedTransaction) -> Result<(), ChainError> {
        let mut state = self.state.write().unwrap();
        let block_num = state.head_block_num() + 1;
        state.begin();
        let mut custom_accounts = BTreeSet::new();
        let result = self.apply_transaction_inner(&mut state, tx, block_num, 0, &mut custom_accounts);
        state.virtual_ops.clear();
        state.undo()?;
        result
    }

    fn apply_block_inner(&self, state: &mut State, block: &SignedBlock) -> Result<(), ChainError> {
        let block_num = block.block_num();
        let (head_num, head_id, head_time) = {
            let g = state.global();
            (g.head_block_number, g.head_block_id, g.time)
        };

        if block.header.previous != head_id {
            return Err(ChainError::UnlinkedBlock {
                num: block_num,
                head: head_num,
            });
        }

        let stamp = block.header.timestamp;
        if stamp <= head_time
            || stamp.secs_since(config::GENESIS_TIME) % config::BLOCK_INTERVAL_SECS != 0
        {
            return Err(ChainError::InvalidBlockTime {
                stamp,
                head: head_time,
            });
        }

        let block_size = bincode::serialized_size(block)
            .map_err(|e| ChainError::Precondition(format!("block does not serialize: {e}")))?;
        let max_block_size = state.global().maximum_block_size;
        ensure(block_size <= u64::from(max_block_size), || {
            format!("block of {block_size} bytes exceeds the {max_block_size} byte limit")
        })?;

        let merkle = block.calculate_merkle_root()?;
        if merkle != block.header.transaction_merkle_root {
            return Err(ChainError::MerkleMismatch);
        }

        let witness = block.header.witness.clone();
        let signing_key = state.get_witness(&witness)?.signing_key;
        if !block.verify_signer(&signing_key)? {
            return Err(ChainError::InvalidBlockSignature { witness });
        }

        let block_id = block.id()?;
        self.notify_pre_apply_block(block);

        // Per-block limit on accounts reusing custom operations.
        let mut custom_accounts = BTreeSet::new();
        for (trx_in_block, tx) in block.transactions.iter().enumerate() {
            state.begin();
            match self.apply_transaction_inner(
                state,
                tx,
                block_num,
                trx_in_block as u32,
                &mut custom_accounts,
            ) {
                Ok(()) => state.squash()?,
                Err(err) => {
                    state.virtual_ops.clear();
                    state.undo()?;
                    return Err(err);
                }
            }
        }

        update_global_state(state, block, block_id)?;
        clear_expired_transactions(state)?;
        clear_expired_orders(state)?;
        clear_expired_delegations(state)?;
        update_witness_medians(state);
        update_median_feed(state);
        update_virtual_supply(state)?;
        clear_null_account_balance(state)?;
        reward::process_inflation(state)?;
        process_conversions(state)?;
        process_vesting_withdrawals(state)?;
        process_savings_withdraws(state)?;
        update_virtual_supply(state)?;
        process_account_recovery(state)?;
        expire_escrow_ratifications(state)?;
        process_decline_voting_rights(state)?;
        bandwidth::update_reserve_ratio(state, block_size);

        self.emit_virtual_ops(
            state,
            TransactionId::ZERO,
            block_num,
            block.transactions.len() as u32,
            0,
        );
        self.notify_post_apply_block(block);

        Ok(())
    }

    fn apply_transaction_inner(
        &self,
        state: &mut State,
        tx: &SignedTransaction,
        block_num: u32,
        trx_in_block: u32,
        custom_accounts: &mut BTreeSet<AccountName>,
    ) -> Result<(), ChainError> {
        tx.tx.validate()?;
        let trx_id = tx.id()?;

        if state.transaction_records.contains(&trx_id) {
            return Err(ChainError::DuplicateTransaction(trx_id));
        }

        let now = state.head_block_time();
        let expiration = tx.tx.expiration;
        let horizon = now.plus_secs(config::MAX_TIME_UNTIL_EXPIRATION_SECS);
        if expiration > horizon {
            return Err(ChainError::ExpirationTooFar {
                expiration,
                horizon,
            });
        }
        if now >= expiration {
            return Err(ChainError::TransactionExpired { expiration, now });
        }

        let anchor = state
            .block_summaries
            .find(&tx.tx.ref_block_num)
            .map(|s| s.block_id)
            .ok_or(ChainError::TaposMismatch)?;
        if anchor.ref_prefix() != tx.tx.ref_block_prefix {
            return Err(ChainError::TaposMismatch);
        }

        let signer_keys = tx.signature_keys(&self.options.chain_id)?;
        let required = tx.tx.required_authorities();
        verify_authority(&required, &signer_keys, &StateAuthorities(state))?;

        state.transaction_records.create(|id| TransactionRecordObject {
            id,
            trx_id,
            expiration,
        })?;

        if self.options.enforce_bandwidth {
            self.charge_bandwidth(state, tx, &required)?;
        }

        for op in &tx.tx.operations {
            note_custom_accounts(op, custom_accounts)?;
        }

        self.notify_pre_apply_trx(tx);

        for (op_in_trx, op) in tx.tx.operations.iter().enumerate() {
            let note = OperationNotification {
                trx_id,
                block: block_num,
                trx_in_block,
                op_in_trx: op_in_trx as u32,
                virtual_op: 0,
                op: op.clone(),
            };
            self.notify_pre_apply(&note);
            evaluators::apply(state, op)?;
            self.notify_post_apply(&note);
            self.emit_virtual_ops(state, trx_id, block_num, trx_in_block, op_in_trx as u32);
        }

        self.notify_post_apply_trx(tx);

        Ok(())
    }

    fn charge_bandwidth(
        &self,
        state: &mut State,
        tx: &SignedTransaction,
        required: &RequiredAuthorities,
    ) -> Result<(), ChainError> {
        let size = bincode::serialized_size(tx).map_err(|e| {
            ChainError::Precondition(format!("transaction does not serialize: {e}"))
        })?;
        // Market operations pay for their bytes at a multiple.
        let (kind, charged) = if tx.tx.operations.iter().any(Operation::is_market) {
            (
                BandwidthType::Market,
                size.saturating_mul(config::MARKET_BANDWIDTH_MULTIPLIER),
            )
        } else {
            (BandwidthType::Forum, size)
        };
        let accounts: BTreeSet<&AccountName> = required
            .owner
            .iter()
            .chain(required.active.iter())
            .chain(required.posting.iter())
            .collect();
        for account in accounts {
            if !bandwidth::update_account_bandwidth(state, account, charged, kind)? {
                return Err(ChainError::BandwidthExceeded {
                    account: account.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drain and announce the virtual operations queued on the state.
    fn emit_virtual_ops(
        &self,
        state: &mut State,
        trx_id: TransactionId,
        block: u32,
        trx_in_block: u32,
        op_in_trx: u32,
    ) {
        if state.virtual_ops.is_empty() {
            return;
        }
        let queued: Vec<Operation> = state.virtual_ops.drain(..).collect();
        for (i, op) in queued.into_iter().enumerate() {
            let note = OperationNotification {
                trx_id,
                block,
                trx_in_block,
                op_in_trx,
                virtual_op: i as u32 + 1,
                op,
            };
            self.notify_pre_apply(&note);
            self.notify_post_apply(&note);
        }
    }

    fn notify_pre_apply(&self, note: &OperationNotification) {
        for listener in &self.observers.lock().unwrap().pre_apply {
            listener(note);
        }
    }

    fn notify_post_apply(&self, note: &OperationNotification) {
        for listener in &self.observers.lock().unwrap().post_apply {
            listener(note);
        }
    }

    fn notify_pre_apply_trx(&self, tx: &SignedTransaction) {
        for listener in &self.observers.lock().unwrap().pre_apply_trx {
            listener(tx);
        }
    }

    fn notify_post_apply_trx(&self, tx: &SignedTransaction) {
        for listener in &self.observers.lock().unwrap().post_apply_trx {
            listener(tx);
        }
    }

    fn notify_pre_apply_block(&self, block: &SignedBlock) {
        for listener in &self.observers.lock().unwrap().pre_apply_block {
            listener(block);
        }
    }

    fn notify_post_apply_block(&self, block: &SignedBlock) {
        for listener in &self.observers.lock().unwrap().post_apply_block {
            listener(block);
        }
    }
}

/// Reject a transaction whose custom operations reuse an account already
/// charged for one in this block.
fn note_custom_accounts(
    op: &Operation,
    seen: &mut BTreeSet<AccountName>,
) -> Result<(), ChainError> {
    let mut note = |account: &AccountName| -> Result<(), ChainError> {
        if !seen.insert(account.clone()) {
            return Err(ChainError::DuplicateCustomOperation(account.clone()));
        }
        Ok(())
    };
    match op {
        Operation::Custom(op) => {
            for account in &op.required_auths {
                note(account)?;
            }
        }
        Operation::CustomJson(op) => {
            for account in op.required_auths.iter().chain(&op.required_posting_auths) {
                note(account)?;
            }
        }
        Operation::CustomBinary(op) => {
            for account in op
                .required_owner_auths
                .iter()
                .chain(&op.required_active_auths)
                .chain(&op.required_posting_auths)
            {
                note(account)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn update_global_state(
    state: &mut State,
    block: &SignedBlock,
    block_id: BlockId,
) -> Result<(), ChainError> {
    let block_num = block.block_num();
    let stamp = block.header.timestamp;
    let witness = block.header.witness.clone();
    let prev_time = state.head_block_time();

    // Slots the schedule let pass between the previous block and this one.
    let missed = (stamp.secs_since(prev_time) / config::BLOCK_INTERVAL_SECS).saturating_sub(1);

    state.global.modify(|g| {
        g.recent_slots_filled = if missed >= 127 {
            1
        } else {
            (g.recent_slots_filled << (missed + 1)) | 1
        };
        g.participation_count = g.recent_slots_filled.count_ones() as u8;
        g.head_block_number = block_num;
        g.head_block_id = block_id;
        g.time = stamp;
        g.current_witness = witness.clone();
    });

    state.witnesses.modify_by_key(&witness, |w| {
        w.last_confirmed_block_num = block_num;
    })?;

    state
        .block_summaries
        .modify_by_key(&((block_num & 0xffff) as u16), |s| {
            s.block_id = block_id;
        })?;

    Ok(())
}

fn clear_expired_transactions(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    while let Some(record) = state.transaction_records.first_ordered() {
        if record.expiration > now {
            break;
        }
        let id = record.id;
        state.transaction_records.remove(id)?;
    }
    Ok(())
}

fn clear_expired_orders(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    // The order book indexes by price, so expiry has to scan.
    let expired: Vec<ObjectId> = state
        .limit_orders
        .iter()
        .filter(|o| o.expiration <= now)
        .map(|o| o.id)
        .collect();
    for id in expired {
        market::cancel_order(state, id)?;
    }
    Ok(())
}

fn clear_expired_delegations(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    loop {
        let (id, delegator, shares) = match state.delegation_expirations.first_ordered() {
            Some(row) if row.expiration <= now => {
                (row.id, row.delegator.clone(), row.vesting_shares)
            }
            _ => break,
        };
        state.accounts.modify_by_key(&delegator, |a| {
            a.delegated_vesting_shares.amount -= shares.amount;
        })?;
        state.push_virtual_op(Operation::ReturnVestingDelegation(
            ReturnVestingDelegationOp {
                account: delegator,
                vesting_shares: shares,
            },
        ));
        state.delegation_expirations.remove(id)?;
    }
    Ok(())
}

/// Fold the elected witnesses' published chain properties into the
/// global state, once per witness round. Each property takes the median
/// independently, so no single witness controls any parameter.
fn update_witness_medians(state: &mut State) {
    if state.head_block_num() % config::MAX_WITNESSES != 0 {
        return;
    }
    let mut props: Vec<ChainProperties> = state
        .witnesses
        .iter_ordered()
        .filter(|w| w.is_active())
        .take(config::MAX_WITNESSES as usize)
        .map(|w| w.props.clone())
        .collect();
    if props.is_empty() {
        return;
    }
    let mid = props.len() / 2;
    props.sort_by_key(|p| p.account_creation_fee.amount);
    let account_creation_fee = props[mid].account_creation_fee;
    props.sort_by_key(|p| p.maximum_block_size);
    let maximum_block_size = props[mid].maximum_block_size;
    props.sort_by_key(|p| p.abd_interest_rate);
    let abd_interest_rate = props[mid].abd_interest_rate;
    state.global.modify(|g| {
        g.account_creation_fee = account_creation_fee;
        g.maximum_block_size = maximum_block_size;
        g.abd_interest_rate = abd_interest_rate;
    });
}

/// Refresh the median price feed from the active witnesses' published
/// rates, once per feed interval.
fn update_median_feed(state: &mut State) {
    if state.head_block_num() % config::FEED_INTERVAL_BLOCKS != 0 {
        return;
    }
    let now = state.head_block_time();
    let mut feeds: Vec<Price> = state
        .witnesses
        .iter()
        .filter(|w| w.is_active())
        .filter_map(|w| {
            w.abd_exchange_rate
                .filter(|_| now.secs_since(w.last_abd_exchange_update) < config::MAX_FEED_AGE_SECS)
        })
        .collect();
    if (feeds.len() as u32) < config::MIN_FEEDS {
        return;
    }
    feeds.sort();
    let median = feeds[feeds.len() / 2];
    state.feed_history.modify(|f| {
        f.window.push_back(median);
        while f.window.len() as u32 > config::FEED_HISTORY_WINDOW {
            f.window.pop_front();
        }
        let mut sorted: Vec<Price> = f.window.iter().copied().collect();
        sorted.sort();
        f.current_median = Some(sorted[sorted.len() / 2]);
    });
}

/// Revalue the ABD debt at the median feed and set the print rate the
/// haircut collar allows.
fn update_virtual_supply(state: &mut State) -> Result<(), ChainError> {
    let median = match state.median_price() {
        Some(p) => p,
        None => return Ok(()),
    };
    let (current, abd) = {
        let g = state.global();
        (g.current_supply, g.current_abd_supply)
    };
    let abd_as_aml = abd.mul_price(&median)?;
    let virtual_supply = current.checked_add(abd_as_aml)?;

    let percent_abd = if virtual_supply.amount > 0 {
        ((abd_as_aml.amount as i128 * config::PERCENT_100 as i128)
            / virtual_supply.amount as i128) as i64
    } else {
        0
    };
    let print_rate = if percent_abd <= config::ABD_START_PERCENT as i64 {
        config::PERCENT_100
    } else if percent_abd >= config::ABD_STOP_PERCENT as i64 {
        0
    } else {
        (((config::ABD_STOP_PERCENT as i64 - percent_abd) * config::PERCENT_100 as i64)
            / (config::ABD_STOP_PERCENT - config::ABD_START_PERCENT) as i64) as u16
    };

    state.global.modify(|g| {
        g.virtual_supply = virtual_supply;
        g.abd_print_rate = print_rate;
    });
    Ok(())
}

/// Anything sent to the null account is destroyed, supply and all.
fn clear_null_account_balance(state: &mut State) -> Result<(), ChainError> {
    let null = config::null_account();
    let (balance, savings, abd, savings_abd, vesting) = {
        let account = state.get_account(&null)?;
        (
            account.balance,
            account.savings_balance,
            account.abd_balance,
            account.savings_abd_balance,
            account.vesting_shares,
        )
    };
    if balance.is_zero()
        && savings.is_zero()
        && abd.is_zero()
        && savings_abd.is_zero()
        && vesting.is_zero()
    {
        return Ok(());
    }

    let mut burned_aml = balance.checked_add(savings)?;
    let burned_abd = abd.checked_add(savings_abd)?;

    if !vesting.is_zero() {
        let price = state.global().vesting_share_price();
        let converted = vesting.mul_price(&price)?;
        state.global.modify(|g| {
            g.total_vesting_shares.amount -= vesting.amount;
            g.total_vesting_fund_aml.amount -= converted.amount;
        });
        burned_aml = burned_aml.checked_add(converted)?;
    }

    state.accounts.modify_by_key(&null, |a| {
        a.balance = Asset::zero(Symbol::Aml);
        a.savings_balance = Asset::zero(Symbol::Aml);
        a.abd_balance = Asset::zero(Symbol::Abd);
        a.savings_abd_balance = Asset::zero(Symbol::Abd);
        a.vesting_shares = Asset::zero(Symbol::Amlv);
    })?;

    if !burned_aml.is_zero() {
        state.adjust_supply(Asset::new(-burned_aml.amount, Symbol::Aml))?;
    }
    if !burned_abd.is_zero() {
        state.adjust_supply(Asset::new(-burned_abd.amount, Symbol::Abd))?;
    }
    Ok(())
}

/// Settle conversion requests whose delay has passed, at the current
/// median feed.
fn process_conversions(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    let median = match state.median_price() {
        Some(p) => p,
        None => return Ok(()),
    };

    let mut net_abd = Asset::zero(Symbol::Abd);
    let mut net_aml = Asset::zero(Symbol::Aml);
    loop {
        let (id, owner, request_id, amount) = match state.convert_requests.first_ordered() {
            Some(req) if req.conversion_date <= now => {
                (req.id, req.owner.clone(), req.request_id, req.amount)
            }
            _ => break,
        };
        let converted = amount.mul_price(&median)?;
        state.adjust_balance(&owner, converted)?;
        net_abd = net_abd.checked_add(amount)?;
        net_aml = net_aml.checked_add(converted)?;
        state.push_virtual_op(Operation::FillConvertRequest(FillConvertRequestOp {
            owner,
            request_id,
            amount_in: amount,
            amount_out: converted,
        }));
        state.convert_requests.remove(id)?;
    }

    if !net_abd.is_zero() {
        state.adjust_supply(Asset::new(-net_abd.amount, Symbol::Abd))?;
        state.adjust_supply(net_aml)?;
    }
    Ok(())
}

/// Pay the weekly power-down installment of every account whose schedule
/// is due, honoring withdraw routes.
fn process_vesting_withdrawals(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    let mut due = Vec::new();
    for account in state.accounts.iter_ordered() {
        if account.next_vesting_withdrawal > now {
            break;
        }
        due.push(account.name.clone());
    }

    for name in due {
        let account = match state.accounts.find(&name) {
            Some(a) => a.clone(),
            None => continue,
        };
        if account.vesting_withdraw_rate.amount <= 0 {
            state.accounts.modify_by_key(&name, |a| {
                a.vesting_withdraw_rate = Asset::zero(Symbol::Amlv);
                a.next_vesting_withdrawal = Timestamp::MAX;
            })?;
            continue;
        }

        let rate = account.vesting_withdraw_rate.amount;
        let remaining = account.to_withdraw - account.withdrawn;
        // The final installment pays whatever the schedule has left.
        let to_withdraw = if remaining < rate {
            account.vesting_shares.amount.min(account.to_withdraw % rate)
        } else {
            account.vesting_shares.amount.min(rate)
        };

        let price = state.global().vesting_share_price();
        let routes: Vec<_> = state
            .withdraw_routes
            .range_ordered(
                Bound::Included(((name.clone(), AccountName::empty()), ObjectId(0))),
                Bound::Unbounded,
            )
            .take_while(|r| r.from == name)
            .cloned()
            .collect();

        let mut deposited_vests: i64 = 0;
        let mut vests_converted: i64 = 0;
        let mut aml_converted = Asset::zero(Symbol::Aml);
        for route in &routes {
            let portion = ((to_withdraw as i128 * route.percent as i128)
                / config::PERCENT_100 as i128) as i64;
            if portion <= 0 {
                continue;
            }
            if route.auto_vest {
                deposited_vests += portion;
                state.accounts.modify_by_key(&route.to, |a| {
                    a.vesting_shares.amount += portion;
                })?;
                state.adjust_proxied_witness_votes(&route.to, portion)?;
                state.push_virtual_op(Operation::FillVestingWithdraw(FillVestingWithdrawOp {
                    from_account: name.clone(),
                    to_account: route.to.clone(),
                    withdrawn: Asset::new(portion, Symbol::Amlv),
                    deposited: Asset::new(portion, Symbol::Amlv),
                }));
            } else {
                let converted = Asset::new(portion, Symbol::Amlv).mul_price(&price)?;
                vests_converted += portion;
                aml_converted = aml_converted.checked_add(converted)?;
                state.adjust_balance(&route.to, converted)?;
                state.push_virtual_op(Operation::FillVestingWithdraw(FillVestingWithdrawOp {
                    from_account: name.clone(),
                    to_account: route.to.clone(),
                    withdrawn: Asset::new(portion, Symbol::Amlv),
                    deposited: converted,
                }));
            }
        }

        let remainder = to_withdraw - deposited_vests - vests_converted;
        let converted_remainder = Asset::new(remainder, Symbol::Amlv).mul_price(&price)?;
        state.push_virtual_op(Operation::FillVestingWithdraw(FillVestingWithdrawOp {
            from_account: name.clone(),
            to_account: name.clone(),
            withdrawn: Asset::new(to_withdraw, Symbol::Amlv),
            deposited: converted_remainder,
        }));

        state.accounts.modify_by_key(&name, |a| {
            a.vesting_shares.amount -= to_withdraw;
            a.balance.amount += converted_remainder.amount;
            a.withdrawn += to_withdraw;
            if a.withdrawn >= a.to_withdraw || a.vesting_shares.amount == 0 {
                a.vesting_withdraw_rate = Asset::zero(Symbol::Amlv);
                a.next_vesting_withdrawal = Timestamp::MAX;
            } else {
                a.next_vesting_withdrawal = a
                    .next_vesting_withdrawal
                    .plus_secs(config::VESTING_WITHDRAW_INTERVAL_SECS);
            }
        })?;

        state.global.modify(|g| {
            g.total_vesting_fund_aml.amount -=
                aml_converted.amount + converted_remainder.amount;
            g.total_vesting_shares.amount -= vests_converted + remainder;
        });

        if to_withdraw > 0 {
            state.adjust_proxied_witness_votes(&name, -to_withdraw)?;
        }
    }
    Ok(())
}

fn process_savings_withdraws(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    loop {
        let row = match state.savings_withdraws.first_ordered() {
            Some(r) if r.complete <= now => r.clone(),
            _ => break,
        };
        state.adjust_balance(&row.to, row.amount)?;
        state.accounts.modify_by_key(&row.from, |a| {
            a.savings_withdraw_requests -= 1;
        })?;
        state.push_virtual_op(Operation::FillTransferFromSavings(
            FillTransferFromSavingsOp {
                from: row.from.clone(),
                to: row.to.clone(),
                amount: row.amount,
                request_id: row.request_id,
                memo: row.memo.clone(),
            },
        ));
        state.savings_withdraws.remove(row.id)?;
    }
    Ok(())
}

/// Expire spent recovery requests, make partner changes effective, and
/// prune owner history that can no longer vouch for a recovery.
fn process_account_recovery(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();

    while let Some(req) = state.recovery_requests.first_ordered() {
        if req.expires > now {
            break;
        }
        let id = req.id;
        state.recovery_requests.remove(id)?;
    }

    loop {
        let (id, account, partner) = match state.recovery_change_requests.first_ordered() {
            Some(req) if req.effective_on <= now => (
                req.id,
                req.account_to_recover.clone(),
                req.recovery_account.clone(),
            ),
            _ => break,
        };
        state.accounts.modify_by_key(&account, |a| {
            a.recovery_account = partner;
        })?;
        state.recovery_change_requests.remove(id)?;
    }

    let stale: Vec<ObjectId> = state
        .owner_authority_history
        .iter()
        .filter(|h| {
            h.last_valid_time
                .plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS)
                < now
        })
        .map(|h| h.id)
        .collect();
    for id in stale {
        state.owner_authority_history.remove(id)?;
    }
    Ok(())
}

/// Refund escrows whose ratification deadline passed without full
/// approval.
fn expire_escrow_ratifications(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    loop {
        let row = match state.escrows.first_ordered() {
            Some(e) if !e.is_approved() && e.ratification_deadline <= now => e.clone(),
            _ => break,
        };
        state.adjust_balance(&row.from, row.aml_balance)?;
        state.adjust_balance(&row.from, row.abd_balance)?;
        state.adjust_balance(&row.from, row.pending_fee)?;
        state.escrows.remove(row.id)?;
    }
    Ok(())
}

fn process_decline_voting_rights(state: &mut State) -> Result<(), ChainError> {
    let now = state.head_block_time();
    loop {
        let (id, name) = match state.decline_voting_requests.first_ordered() {
            Some(req) if req.effective_date <= now => (req.id, req.account.clone()),
            _ => break,
        };
        let (vesting, proxied) = {
            let account = state.get_account(&name)?;
            (account.vesting_shares.amount, account.proxied_vsf_votes)
        };
        let mut delta = [0i64; PROXY_VOTE_BUCKETS];
        delta[0] = -vesting;
        for (i, bucket) in proxied.iter().enumerate() {
            delta[i + 1] = -bucket;
        }
        state.adjust_proxied_witness_vote_buckets(&name, &delta)?;
        state.clear_witness_votes(&name)?;
        state.accounts.modify_by_key(&name, |a| {
            a.can_vote = false;
            a.proxy = config::proxy_to_self();
        })?;
        state.decline_voting_requests.remove(id)?;
    }
    Ok(())
}
