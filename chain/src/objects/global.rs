//! Chain-wide singletons and the small bookkeeping tables behind
//! duplicate detection and TaPoS.

use std::collections::VecDeque;

use amalgam_protocol::config;
use amalgam_protocol::operations::ChainProperties;
use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{
    AccountName, Asset, BlockId, Digest, Price, Symbol, Timestamp, TransactionId,
};

/// Head-of-chain facts every evaluator reads.
#[derive(Clone, Debug)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: BlockId,
    pub time: Timestamp,
    pub current_witness: AccountName,

    pub current_supply: Asset,
    pub current_abd_supply: Asset,
    /// AML supply plus the ABD supply valued at the median feed.
    pub virtual_supply: Asset,
    pub total_vesting_fund_aml: Asset,
    pub total_vesting_shares: Asset,

    /// Elected medians of the top witnesses' chain properties.
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
    pub abd_interest_rate: u16,
    /// Fraction of ABD rewards actually printed as ABD; falls as the
    /// ABD share of market cap approaches the haircut collar.
    pub abd_print_rate: u16,

    /// Rolling bitmap of the last 128 slots, 1 where a block arrived.
    pub recent_slots_filled: u128,
    /// Filled slots out of the last 128, maintained incrementally.
    pub participation_count: u8,
}

impl DynamicGlobalProperties {
    /// Pre-genesis values; `genesis::initialize` reshapes them.
    pub fn initial() -> Self {
        let defaults = ChainProperties::default();
        Self {
            head_block_number: 0,
            head_block_id: BlockId::from_digest(Digest::ZERO, 0),
            time: config::GENESIS_TIME,
            current_witness: AccountName::empty(),
            current_supply: Asset::zero(Symbol::Aml),
            current_abd_supply: Asset::zero(Symbol::Abd),
            virtual_supply: Asset::zero(Symbol::Aml),
            total_vesting_fund_aml: Asset::zero(Symbol::Aml),
            total_vesting_shares: Asset::zero(Symbol::Amlv),
            account_creation_fee: defaults.account_creation_fee,
            maximum_block_size: defaults.maximum_block_size,
            abd_interest_rate: defaults.abd_interest_rate,
            abd_print_rate: config::PERCENT_100,
            recent_slots_filled: u128::MAX,
            participation_count: 128,
        }
    }

    /// Vesting shares per unit of the vesting fund.
    ///
    /// Falls back to 1000 μAMLV per mAML while either side of the ratio
    /// is still zero, so the first deposits convert at a sane rate.
    pub fn vesting_share_price(&self) -> Price {
        if self.total_vesting_fund_aml.amount == 0 || self.total_vesting_shares.amount == 0 {
            return Price::new(
                Asset::new(1_000, Symbol::Aml),
                Asset::new(1_000_000, Symbol::Amlv),
            );
        }
        Price::new(self.total_vesting_shares, self.total_vesting_fund_aml)
    }
}

/// Median price feed and the window it is computed from.
#[derive(Clone, Debug, Default)]
pub struct FeedHistory {
    /// None until enough witnesses have published.
    pub current_median: Option<Price>,
    /// Hourly medians of the published feeds, most recent at the back.
    pub window: VecDeque<Price>,
}

/// Chain-wide bandwidth budget state.
#[derive(Clone, Debug)]
pub struct ReserveRatio {
    /// Exponential average of recent block sizes.
    pub average_block_size: u64,
    /// Fixed-point multiplier over physical capacity, scaled by
    /// `RESERVE_RATIO_PRECISION`.
    pub current_reserve_ratio: i64,
    /// Total virtual bandwidth the stake-weighted shares divide up.
    pub max_virtual_bandwidth: u128,
}

impl ReserveRatio {
    pub fn initial(maximum_block_size: u32) -> Self {
        let mut ratio = Self {
            average_block_size: 0,
            current_reserve_ratio: config::MAX_RESERVE_RATIO * config::RESERVE_RATIO_PRECISION,
            max_virtual_bandwidth: 0,
        };
        ratio.update_max_virtual_bandwidth(maximum_block_size);
        ratio
    }

    /// Recompute the virtual bandwidth ceiling from the current ratio.
    pub fn update_max_virtual_bandwidth(&mut self, maximum_block_size: u32) {
        let scale = u128::from(config::BANDWIDTH_PRECISION)
            * u128::from(config::BANDWIDTH_AVERAGE_WINDOW_SECS);
        self.max_virtual_bandwidth = u128::from(maximum_block_size)
            * (self.current_reserve_ratio.max(0) as u128)
            * scale
            / (u128::from(config::BLOCK_INTERVAL_SECS) * config::RESERVE_RATIO_PRECISION as u128);
    }
}

/// Shape of the claim-weight curve a reward fund pays along.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RewardCurve {
    /// `r * (r + 2s)` for content constant `s`; rewards scale
    /// superlinearly with accumulated share weight.
    Quadratic,
    Linear,
}

/// The content reward pot and its claim accounting.
#[derive(Clone, Debug)]
pub struct RewardFund {
    pub name: String,
    pub reward_balance: Asset,
    /// Decaying sum of recent reward claims; the denominator every
    /// payout is measured against.
    pub recent_claims: u128,
    pub last_update: Timestamp,
    pub reward_curve: RewardCurve,
    pub content_constant: u128,
}

impl RewardFund {
    pub fn initial() -> Self {
        Self {
            name: config::POST_REWARD_FUND_NAME.to_string(),
            reward_balance: Asset::zero(Symbol::Aml),
            recent_claims: config::INIT_RECENT_CLAIMS,
            last_update: config::GENESIS_TIME,
            reward_curve: RewardCurve::Quadratic,
            content_constant: config::CONTENT_CONSTANT,
        }
    }
}

/// A transaction id remembered until its expiration passes, for
/// duplicate rejection.
#[derive(Clone, Debug)]
pub struct TransactionRecordObject {
    pub id: ObjectId,
    pub trx_id: TransactionId,
    pub expiration: Timestamp,
}

impl StateObject for TransactionRecordObject {
    type Key = TransactionId;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> TransactionId {
        self.trx_id
    }

    fn order_key(&self) -> Timestamp {
        self.expiration
    }
}

/// One slot of the 65536-entry ring of recent block ids backing TaPoS
/// reference checks.
#[derive(Clone, Debug)]
pub struct BlockSummaryObject {
    pub id: ObjectId,
    pub slot: u16,
    pub block_id: BlockId,
}

impl StateObject for BlockSummaryObject {
    type Key = u16;
    type OrderKey = u16;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> u16 {
        self.slot
    }

    fn order_key(&self) -> u16 {
        self.slot
    }
}
