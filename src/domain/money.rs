use crate::error::DunningError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount still owed by a customer.
///
/// Wraps `rust_decimal::Decimal` and never goes below zero: payments larger than
/// the balance are capped rather than carried forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

/// A strictly positive monetary amount, e.g. a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, DunningError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(DunningError::ValidationError(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DunningError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, DunningError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(DunningError::ValidationError(format!(
                "Balance cannot be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Applies a payment, flooring the result at zero.
    pub fn saturating_sub(self, payment: Amount) -> Self {
        Self((self.0 - payment.0).max(Decimal::ZERO))
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = DunningError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

/// Rupee formatting with two decimal places, as used in customer messages.
pub struct Rupees(pub Decimal);

impl fmt::Display for Rupees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2}", self.0)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Rupees(self.0).fmt(f)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Rupees(self.0).fmt(f)
    }
}
