//! Currency codes and whole-unit amounts
//!
//! Reimbursement amounts are stored as whole currency units (rupees, dollars),
//! never as minor units. `Amount` rejects negative inputs at construction so
//! every value that reaches a claim record is already valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
    JPY,
    CHF,
    AUD,
    CAD,
    SGD,
    HKD,
    AED,
}

impl Currency {
    /// Every supported currency, in declaration order
    pub const ALL: [Currency; 11] = [
        Currency::INR,
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::JPY,
        Currency::CHF,
        Currency::AUD,
        Currency::CAD,
        Currency::SGD,
        Currency::HKD,
        Currency::AED,
    ];

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CHF => "CHF",
            Currency::AUD => "A$",
            Currency::CAD => "C$",
            Currency::SGD => "S$",
            Currency::HKD => "HK$",
            Currency::AED => "AED",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CHF => "CHF",
            Currency::AUD => "AUD",
            Currency::CAD => "CAD",
            Currency::SGD => "SGD",
            Currency::HKD => "HKD",
            Currency::AED => "AED",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| MoneyError::UnknownCurrency(code.to_string()))
    }
}

/// Errors that can occur when constructing monetary values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A non-negative amount in whole currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Creates an amount from whole units
    pub fn new(units: u64) -> Self {
        Self(units)
    }

    /// Creates an amount from a signed input, rejecting negatives
    pub fn from_i64(units: i64) -> Result<Self, MoneyError> {
        u64::try_from(units)
            .map(Self)
            .map_err(|_| MoneyError::InvalidAmount(format!("{} is negative", units)))
    }

    /// Returns the amount in whole units
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Result<Amount, MoneyError> {
        self.0.checked_add(other.0).map(Self).ok_or(MoneyError::Overflow)
    }

    /// Formats the amount with a currency symbol, e.g. `₹ 550`
    pub fn display_in(&self, currency: Currency) -> String {
        format!("{} {}", currency.symbol(), self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn non_negative_inputs_round_trip(units in 0i64..i64::MAX) {
            let amount = Amount::from_i64(units).unwrap();
            prop_assert_eq!(amount.units(), units as u64);
        }

        #[test]
        fn negative_inputs_always_rejected(units in i64::MIN..0i64) {
            prop_assert!(Amount::from_i64(units).is_err());
        }
    }
}
