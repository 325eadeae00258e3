//! Chain-wide consensus constants.
//!
//! Every value here is part of consensus: changing one changes which
//! blocks a node accepts. Amounts are raw integer units at the symbol's
//! precision (1.000 AML == 1000 raw).

use amalgam_crypto::blake2b_256;
use amalgam_types::{AccountName, Asset, Digest, Symbol, Timestamp};

pub use amalgam_types::price::MAX_SHARE_SUPPLY;

// ── Chain identity ───────────────────────────────────────────────────────

pub const CHAIN_NAME: &str = "AMALGAM";
pub const ADDRESS_PREFIX: &str = "AML";

/// Unix time of the genesis block.
pub const GENESIS_TIME: Timestamp = Timestamp::new(1_534_377_600);

/// The chain id mixed into every signing digest so signatures cannot be
/// replayed across chains.
pub fn chain_id() -> Digest {
    Digest::new(blake2b_256(CHAIN_NAME.as_bytes()))
}

// ── Block production ─────────────────────────────────────────────────────

pub const BLOCK_INTERVAL_SECS: u32 = 3;
pub const BLOCKS_PER_HOUR: u32 = 60 * 60 / BLOCK_INTERVAL_SECS;
pub const BLOCKS_PER_DAY: u32 = 24 * 60 * 60 / BLOCK_INTERVAL_SECS;
pub const BLOCKS_PER_YEAR: u32 = 365 * 24 * 60 * 60 / BLOCK_INTERVAL_SECS;

pub const MAX_WITNESSES: u32 = 21;
pub const MAX_VOTED_WITNESSES: u32 = 20;
pub const MAX_RUNNER_WITNESSES: u32 = 1;
pub const IRREVERSIBLE_THRESHOLD: u16 = 75 * PERCENT_1;

pub const MIN_BLOCK_SIZE: u32 = 115;
pub const MAX_TRANSACTION_SIZE: u32 = 1024 * 64;
pub const MIN_BLOCK_SIZE_LIMIT: u32 = MAX_TRANSACTION_SIZE;
pub const MAX_BLOCK_SIZE: u32 = MAX_TRANSACTION_SIZE * BLOCK_INTERVAL_SECS * 2000;
pub const SOFT_MAX_BLOCK_SIZE: u32 = 2 * 1024 * 1024;

// ── Transaction admission ────────────────────────────────────────────────

/// Furthest into the future a transaction's expiration may lie.
pub const MAX_TIME_UNTIL_EXPIRATION_SECS: u32 = 60 * 60;
pub const MAX_MEMO_SIZE: usize = 2048;

// ── Percentages ──────────────────────────────────────────────────────────

/// Basis points. All percentage math in consensus uses this scale.
pub const PERCENT_100: u16 = 10_000;
pub const PERCENT_1: u16 = PERCENT_100 / 100;
pub const PERCENT_1_TENTH: u16 = PERCENT_100 / 1000;

// ── Authority and accounts ───────────────────────────────────────────────

/// Maximum recursion when expanding account-auth memberships inside an
/// authority. Doubles as the only cycle defense; see the sign-state
/// walker before touching it.
pub const MAX_SIG_CHECK_DEPTH: u32 = 2;
pub const MAX_PROXY_RECURSION_DEPTH: u32 = 4;
pub const MAX_ACCOUNT_WITNESS_VOTES: u32 = 30;

/// Floor for the account creation fee a witness may propose, in raw AML.
pub const MIN_ACCOUNT_CREATION_FEE: i64 = 100;
pub const CREATE_ACCOUNT_WITH_AML_MODIFIER: i64 = 30;
pub const CREATE_ACCOUNT_DELEGATION_RATIO: i64 = 5;
pub const CREATE_ACCOUNT_DELEGATION_TIME_SECS: u32 = 60 * 60 * 24 * 30;

// ── Recovery ─────────────────────────────────────────────────────────────

/// How far back an old owner authority remains usable for recovery.
pub const OWNER_AUTH_RECOVERY_PERIOD_SECS: u32 = 60 * 60 * 24 * 30;
pub const ACCOUNT_RECOVERY_REQUEST_EXPIRATION_SECS: u32 = 60 * 60 * 24;
/// Minimum spacing between owner-authority updates.
pub const OWNER_UPDATE_LIMIT_SECS: u32 = 60 * 60;

// ── Vesting ──────────────────────────────────────────────────────────────

pub const VESTING_WITHDRAW_INTERVALS: u32 = 13;
pub const VESTING_WITHDRAW_INTERVAL_SECS: u32 = 60 * 60 * 24 * 7;
pub const MAX_WITHDRAW_ROUTES: u32 = 10;
/// Shares pulled out of a delegation stay locked this long before
/// returning to the delegator.
pub const DELEGATION_RETURN_PERIOD_SECS: u32 = 60 * 60 * 24 * 7;

// ── Savings ──────────────────────────────────────────────────────────────

pub const SAVINGS_WITHDRAW_DELAY_SECS: u32 = 60 * 60 * 24 * 3;
pub const SAVINGS_WITHDRAW_REQUEST_LIMIT: u32 = 100;

// ── ABD and price feeds ──────────────────────────────────────────────────

pub const DEFAULT_ABD_INTEREST_RATE: u16 = 10 * PERCENT_1;
pub const ABD_INTEREST_COMPOUND_INTERVAL_SECS: u32 = 60 * 60 * 24 * 30;

/// Median feed history: one sample per hour, 3.5 days deep.
pub const FEED_INTERVAL_BLOCKS: u32 = BLOCKS_PER_HOUR;
pub const FEED_HISTORY_WINDOW: u32 = 12 * 7;
pub const MAX_FEED_AGE_SECS: u32 = 60 * 60 * 24 * 7;
pub const MIN_FEEDS: u32 = MAX_WITNESSES / 3;
pub const CONVERSION_DELAY_SECS: u32 = 60 * 60 * FEED_HISTORY_WINDOW;

/// Haircut collar: stop printing ABD at 5% of market cap, start easing
/// off at 2%.
pub const ABD_STOP_PERCENT: u16 = 5 * PERCENT_1;
pub const ABD_START_PERCENT: u16 = 2 * PERCENT_1;

// ── Inflation and rewards ────────────────────────────────────────────────

pub const INFLATION_RATE_START_PERCENT: u16 = 950;
pub const INFLATION_RATE_STOP_PERCENT: u16 = 95;
pub const INFLATION_NARROWING_PERIOD: u32 = 250_000;
pub const CONTENT_REWARD_PERCENT: u16 = 75 * PERCENT_1;
pub const VESTING_FUND_PERCENT: u16 = 15 * PERCENT_1;

pub const POST_REWARD_FUND_NAME: &str = "post";
pub const RECENT_RSHARES_DECAY_SECS: u32 = 60 * 60 * 24 * 15;
pub const CONTENT_CONSTANT: u128 = 2_000_000_000_000;

/// Payouts below this ABD-equivalent value are dust and are dropped.
pub fn min_payout() -> Asset {
    Asset::new(20, Symbol::Abd)
}

// ── Bandwidth ────────────────────────────────────────────────────────────

pub const BANDWIDTH_AVERAGE_WINDOW_SECS: u64 = 60 * 60 * 24 * 7;
pub const BANDWIDTH_PRECISION: u64 = 1_000_000;
/// Transactions carrying a market operation charge their bytes at this
/// multiple.
pub const MARKET_BANDWIDTH_MULTIPLIER: u64 = 10;

/// The reserve ratio is a fixed-point value scaled by this precision.
pub const RESERVE_RATIO_PRECISION: i64 = 10_000;
pub const MAX_RESERVE_RATIO: i64 = 20_000;
pub const RESERVE_RATIO_MIN_INCREMENT: i64 = 5_000;
pub const RESERVE_RATIO_UPDATE_INTERVAL_BLOCKS: u32 = 20;

// ── Genesis supply ───────────────────────────────────────────────────────

pub const INIT_SUPPLY: i64 = 500_000_000_000;
pub const INIT_VESTING_FUND: i64 = 360_000_000_000;
pub const INIT_VESTING_SHARES: i64 = 900_000_000_000_000_000;
pub const INIT_RECENT_CLAIMS: u128 = 8_400_000_000_000_000;

pub const SECONDS_PER_YEAR: u64 = 60 * 60 * 24 * 365;

// ── Limits ───────────────────────────────────────────────────────────────

pub const MAX_WITNESS_URL_LENGTH: usize = 2048;
pub const MAX_UNDO_HISTORY: u32 = 10_000;

// ── Reserved accounts ────────────────────────────────────────────────────

/// The account that produces the genesis state and the first blocks.
pub fn initiator_account() -> AccountName {
    AccountName::from_static("initiator")
}

/// Sink account. Balances sent here are burned at the next block.
pub fn null_account() -> AccountName {
    AccountName::from_static("null")
}

/// Pass-through account. Anyone may sign for it; its balances are swept
/// back to the chain each block.
pub fn temp_account() -> AccountName {
    AccountName::from_static("temp")
}

/// Placeholder owner of the mining queue. Unusable as a normal account.
pub fn miners_account() -> AccountName {
    AccountName::from_static("miners")
}

/// An empty proxy means the account votes for itself.
pub fn proxy_to_self() -> AccountName {
    AccountName::empty()
}
