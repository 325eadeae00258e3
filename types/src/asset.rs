//! Fixed-point asset amounts tagged by symbol.
//!
//! Amounts are signed 64-bit integers in the symbol's smallest unit, so
//! balance deltas and fees use the same representation as balances. All
//! arithmetic is checked; nothing here silently wraps or mixes symbols.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypeError;

/// The three chain symbols.
///
/// The declaration order is consensus-relevant: it fixes the serialized tag
/// and the symbol component of price ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    /// Liquid base asset, precision 3.
    Aml,
    /// Stablecoin (debt asset), precision 3.
    Abd,
    /// Vesting shares, precision 6.
    Amlv,
}

impl Symbol {
    /// Number of decimal places in the display form.
    pub fn precision(self) -> u32 {
        match self {
            Symbol::Aml | Symbol::Abd => 3,
            Symbol::Amlv => 6,
        }
    }

    /// One whole unit expressed in the smallest unit.
    pub fn unit(self) -> i64 {
        10i64.pow(self.precision())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Aml => "AML",
            Symbol::Abd => "ABD",
            Symbol::Amlv => "AMLV",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Symbol {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AML" => Ok(Symbol::Aml),
            "ABD" => Ok(Symbol::Abd),
            "AMLV" => Ok(Symbol::Amlv),
            other => Err(TypeError::InvalidAssetString(other.to_string())),
        }
    }
}

/// A fixed-point amount of one symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    /// Zero of the given symbol.
    pub fn zero(symbol: Symbol) -> Self {
        Self { amount: 0, symbol }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Checked same-symbol addition.
    pub fn checked_add(self, other: Asset) -> Result<Asset, TypeError> {
        self.require_same_symbol(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(TypeError::AmountOverflow)?;
        Ok(Asset::new(amount, self.symbol))
    }

    /// Checked same-symbol subtraction.
    pub fn checked_sub(self, other: Asset) -> Result<Asset, TypeError> {
        self.require_same_symbol(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(TypeError::AmountOverflow)?;
        Ok(Asset::new(amount, self.symbol))
    }

    /// Negation, for balance deltas.
    pub fn negated(self) -> Asset {
        Asset::new(-self.amount, self.symbol)
    }

    fn require_same_symbol(self, other: Asset) -> Result<(), TypeError> {
        if self.symbol == other.symbol {
            Ok(())
        } else {
            Err(TypeError::SymbolMismatch(
                self.symbol.as_str(),
                other.symbol.as_str(),
            ))
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.symbol.unit();
        let sign = if self.amount < 0 { "-" } else { "" };
        let magnitude = self.amount.unsigned_abs();
        let integral = magnitude / unit as u64;
        let fractional = magnitude % unit as u64;
        write!(
            f,
            "{sign}{integral}.{fractional:0width$} {}",
            self.symbol,
            width = self.symbol.precision() as usize
        )
    }
}

impl std::str::FromStr for Asset {
    type Err = TypeError;

    /// Parse the canonical display form, e.g. `"1.000 AML"`.
    ///
    /// The fractional part must carry exactly the symbol's precision in
    /// digits so that every asset string has one unambiguous reading.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidAssetString(s.to_string());
        let (number, symbol_str) = s.split_once(' ').ok_or_else(invalid)?;
        let symbol: Symbol = symbol_str.parse()?;

        let (sign, digits) = match number.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, number),
        };
        let (int_part, frac_part) = digits.split_once('.').ok_or_else(invalid)?;
        if int_part.is_empty()
            || frac_part.len() != symbol.precision() as usize
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let integral: i64 = int_part.parse().map_err(|_| invalid())?;
        let fractional: i64 = frac_part.parse().map_err(|_| invalid())?;
        let amount = integral
            .checked_mul(symbol.unit())
            .and_then(|v| v.checked_add(fractional))
            .and_then(|v| v.checked_mul(sign))
            .ok_or(TypeError::AmountOverflow)?;
        Ok(Asset::new(amount, symbol))
    }
}
