//! The internal AML:ABD market, debt conversion and witness price feeds.

use amalgam_types::{AccountName, Asset, Price, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

use super::check_account_name;
use crate::error::ProtocolError;

fn check_market_pair(a: Symbol, b: Symbol) -> Result<(), ProtocolError> {
    let ok = (a == Symbol::Aml && b == Symbol::Abd) || (a == Symbol::Abd && b == Symbol::Aml);
    if ok {
        Ok(())
    } else {
        Err(ProtocolError::validation(
            "order must be on the AML:ABD market",
        ))
    }
}

/// Offer `amount_to_sell` for at least `min_to_receive`, at the price
/// implied by the two amounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderCreateOp {
    pub owner: AccountName,
    /// Owner-chosen id, unique among the owner's open orders.
    pub order_id: u32,
    pub amount_to_sell: Asset,
    pub min_to_receive: Asset,
    /// Cancel instead of resting on the book if not completely filled.
    pub fill_or_kill: bool,
    pub expiration: Timestamp,
}

impl LimitOrderCreateOp {
    /// The sell price this order is willing to trade at.
    pub fn sell_price(&self) -> Price {
        Price::new(self.amount_to_sell, self.min_to_receive)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)?;
        check_market_pair(self.amount_to_sell.symbol, self.min_to_receive.symbol)?;
        self.sell_price()
            .validate()
            .map_err(|_| ProtocolError::validation("order amounts must be positive"))
    }
}

/// Offer `amount_to_sell` at an explicit price instead of an implied one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderCreate2Op {
    pub owner: AccountName,
    pub order_id: u32,
    pub amount_to_sell: Asset,
    pub fill_or_kill: bool,
    pub exchange_rate: Price,
    pub expiration: Timestamp,
}

impl LimitOrderCreate2Op {
    pub fn sell_price(&self) -> Price {
        self.exchange_rate
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)?;
        if self.amount_to_sell.symbol != self.exchange_rate.base.symbol {
            return Err(ProtocolError::validation(
                "sell asset must be the base of the price",
            ));
        }
        self.exchange_rate
            .validate()
            .map_err(|_| ProtocolError::validation("exchange rate is degenerate"))?;
        check_market_pair(self.amount_to_sell.symbol, self.exchange_rate.quote.symbol)?;
        let receives = self.amount_to_sell.mul_price(&self.exchange_rate)?;
        if receives.amount <= 0 {
            return Err(ProtocolError::validation(
                "amount to sell cannot round to zero when traded",
            ));
        }
        Ok(())
    }
}

/// Cancel an open order and refund whatever remains unsold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderCancelOp {
    pub owner: AccountName,
    pub order_id: u32,
}

impl LimitOrderCancelOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)
    }
}

/// Ask the chain to convert ABD into AML at the median feed price, settled
/// after the conversion delay.
///
/// Only the ABD-to-AML direction exists. The reverse would let traders
/// mint ABD against short price swings without moving the market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvertOp {
    pub owner: AccountName,
    pub request_id: u32,
    pub amount: Asset,
}

impl ConvertOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)?;
        if self.amount.symbol != Symbol::Abd {
            return Err(ProtocolError::validation("can only convert ABD to AML"));
        }
        if self.amount.amount <= 0 {
            return Err(ProtocolError::validation("must convert a positive amount"));
        }
        Ok(())
    }
}

/// A witness's signed opinion of the AML:ABD exchange rate. The median
/// over all witness feeds drives conversions and the debt collar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPublishOp {
    pub publisher: AccountName,
    pub exchange_rate: Price,
}

impl FeedPublishOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.publisher)?;
        check_market_pair(
            self.exchange_rate.base.symbol,
            self.exchange_rate.quote.symbol,
        )?;
        self.exchange_rate
            .validate()
            .map_err(|_| ProtocolError::validation("exchange rate is degenerate"))
    }
}
