//! Open limit orders and pending ABD conversion requests.

use std::cmp::Reverse;

use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Asset, Price, Timestamp, TypeError};

/// An open order on the internal AML/ABD market.
///
/// `for_sale` is denominated in `sell_price.base`; the funds themselves
/// left the seller's balance when the order was placed. The ordered
/// index sorts best price first within each symbol orientation, which
/// lets matching walk the top of the opposing book directly.
#[derive(Clone, Debug)]
pub struct LimitOrderObject {
    pub id: ObjectId,
    pub created: Timestamp,
    pub expiration: Timestamp,
    pub seller: AccountName,
    pub order_id: u32,
    pub for_sale: i64,
    pub sell_price: Price,
}

impl LimitOrderObject {
    pub fn amount_for_sale(&self) -> Asset {
        Asset::new(self.for_sale, self.sell_price.base.symbol)
    }

    pub fn amount_to_receive(&self) -> Result<Asset, TypeError> {
        self.amount_for_sale().mul_price(&self.sell_price)
    }
}

impl StateObject for LimitOrderObject {
    type Key = (AccountName, u32);
    type OrderKey = Reverse<Price>;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, u32) {
        (self.seller.clone(), self.order_id)
    }

    fn order_key(&self) -> Reverse<Price> {
        Reverse(self.sell_price)
    }
}

/// ABD queued for conversion to AML at the median feed, settling after
/// the conversion delay.
#[derive(Clone, Debug)]
pub struct ConvertRequestObject {
    pub id: ObjectId,
    pub owner: AccountName,
    pub request_id: u32,
    pub amount: Asset,
    pub conversion_date: Timestamp,
}

impl StateObject for ConvertRequestObject {
    type Key = (AccountName, u32);
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, u32) {
        (self.owner.clone(), self.request_id)
    }

    fn order_key(&self) -> Timestamp {
        self.conversion_date
    }
}
