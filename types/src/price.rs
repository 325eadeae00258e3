//! Exchange prices as exact rationals.
//!
//! A price is the quotient `base / quote` of two assets with different
//! symbols. Comparison cross-multiplies in 128-bit integers, never dividing,
//! so ordering two prices is exact on every platform. This property is what
//! makes order matching deterministic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::asset::{Asset, Symbol};
use crate::error::TypeError;

/// Hard cap on any single share amount; bounds price numerators.
pub const MAX_SHARE_SUPPLY: i64 = 1_000_000_000_000_000;

/// An exact-rational price quoting `base` in terms of `quote`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Price {
    pub base: Asset,
    pub quote: Asset,
}

impl Price {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// Structural validity: positive amounts, two distinct symbols.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.base.amount > 0 && self.quote.amount > 0 && self.base.symbol != self.quote.symbol {
            Ok(())
        } else {
            Err(TypeError::InvalidPrice)
        }
    }

    /// The highest representable price for a symbol pair.
    pub fn max_for(base: Symbol, quote: Symbol) -> Self {
        Self::new(Asset::new(MAX_SHARE_SUPPLY, base), Asset::new(1, quote))
    }

    /// The lowest representable price for a symbol pair.
    pub fn min_for(base: Symbol, quote: Symbol) -> Self {
        Self::new(Asset::new(1, base), Asset::new(MAX_SHARE_SUPPLY, quote))
    }

    /// The same rate quoted from the other side of the pair.
    pub fn invert(self) -> Self {
        Self::new(self.quote, self.base)
    }

    fn symbol_pair(&self) -> (Symbol, Symbol) {
        (self.base.symbol, self.quote.symbol)
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Price {}

impl Ord for Price {
    /// Symbol pair first, then exact cross-multiplied magnitude.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.symbol_pair().cmp(&other.symbol_pair()) {
            Ordering::Equal => {
                let lhs = i128::from(self.base.amount) * i128::from(other.quote.amount);
                let rhs = i128::from(other.base.amount) * i128::from(self.quote.amount);
                lhs.cmp(&rhs)
            }
            unequal => unequal,
        }
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.base, self.quote)
    }
}

impl Asset {
    /// Convert this asset across a price, truncating toward zero.
    ///
    /// An asset in the price's base symbol converts to the quote symbol and
    /// vice versa; any other symbol is an error.
    pub fn mul_price(self, price: &Price) -> Result<Asset, TypeError> {
        let (from, to) = if self.symbol == price.base.symbol {
            (price.base, price.quote)
        } else if self.symbol == price.quote.symbol {
            (price.quote, price.base)
        } else {
            return Err(TypeError::PriceSymbolMismatch(
                self.symbol.as_str(),
                price.base.symbol.as_str(),
                price.quote.symbol.as_str(),
            ));
        };
        if from.amount == 0 {
            return Err(TypeError::InvalidPrice);
        }
        let wide = i128::from(self.amount) * i128::from(to.amount) / i128::from(from.amount);
        let amount = i64::try_from(wide).map_err(|_| TypeError::AmountOverflow)?;
        Ok(Asset::new(amount, to.symbol))
    }
}
