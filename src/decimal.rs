use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// rate type for interest rates, fees and split portions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 5 for 5%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// create from basis points (e.g., 500 for 5%)
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10000))
    }

    /// one k-th share, used when spreading a balance over k periods
    pub fn one_over(k: u32) -> Self {
        if k == 0 {
            return Rate::ZERO;
        }
        Rate(Decimal::ONE / Decimal::from(k))
    }

    /// ratio of two decimals, `None` when the denominator is zero
    pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Self> {
        numerator.checked_div(denominator).map(Rate)
    }

    /// get as decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// get as percentage
    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// complement (1 - rate)
    pub fn complement(&self) -> Rate {
        Rate(Decimal::ONE - self.0)
    }

    /// check the rate is a valid portion in [0, 1]
    pub fn is_portion(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}
