pub mod currency;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::Rate;
use crate::errors::{LoanError, Result};

pub use currency::Currency;

/// rounding rule applied when snapping an amount to a currency's minor unit
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// Currency-aware monetary value.
///
/// Values are immutable: every operation returns a new value. An amount is only
/// guaranteed to be a multiple of the currency's minor unit after [`MoneyValue::validate`],
/// or when produced by [`MoneyValue::take`] / [`MoneyValue::sum`] on validated operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyValue {
    #[serde(rename = "iso4217")]
    currency: String,
    amount: Decimal,
    #[serde(rename = "time")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    details: String,
}

/// a value rounded to its currency's precision, plus the rounding signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rounded {
    pub value: MoneyValue,
    pub mismatch: Option<PrecisionMismatch>,
}

/// non-fatal notice that an amount needed rounding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionMismatch {
    pub currency: String,
    pub raw: Decimal,
    pub rounded: Decimal,
}

impl From<PrecisionMismatch> for LoanError {
    fn from(m: PrecisionMismatch) -> Self {
        LoanError::PrecisionMismatch {
            currency: m.currency,
            raw: m.raw,
            rounded: m.rounded,
        }
    }
}

/// result of a proportional split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub taken: MoneyValue,
    pub remainder: MoneyValue,
}

impl MoneyValue {
    pub fn new(
        currency: impl Into<String>,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            currency: currency.into(),
            amount,
            timestamp,
            details: details.into(),
        }
    }

    /// zero in the given currency
    pub fn zero(currency: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(currency, Decimal::ZERO, timestamp, String::new())
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    /// minor-unit precision of this value's currency
    pub fn precision(&self) -> Result<u32> {
        Currency::lookup(&self.currency)
            .map(|c| c.precision)
            .ok_or_else(|| LoanError::UnknownCurrency {
                code: self.currency.clone(),
            })
    }

    pub fn with_amount(&self, amount: Decimal) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }

    pub fn with_timestamp(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    pub fn with_details(&self, details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            ..self.clone()
        }
    }

    /// same value with the sign flipped
    pub fn negate(&self) -> Self {
        self.with_amount(-self.amount)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// round the amount to the currency's minor unit.
    ///
    /// Ties round away from zero. A changed amount is reported through
    /// [`Rounded::mismatch`] while still returning the rounded value.
    pub fn validate(&self) -> Result<Rounded> {
        let precision = self.precision()?;
        let rounded = self.amount.round_dp_with_strategy(precision, ROUNDING);

        let mismatch = (rounded != self.amount).then(|| PrecisionMismatch {
            currency: self.currency.clone(),
            raw: self.amount,
            rounded,
        });

        Ok(Rounded {
            value: self.with_amount(rounded),
            mismatch,
        })
    }

    /// add all operands to self; every operand must share self's currency
    pub fn sum<'a, I>(&self, others: I) -> Result<MoneyValue>
    where
        I: IntoIterator<Item = &'a MoneyValue>,
    {
        let mut total = self.amount;
        for other in others {
            if other.currency != self.currency {
                return Err(LoanError::CurrencyMismatch {
                    expected: self.currency.clone(),
                    found: other.currency.clone(),
                });
            }
            total = total
                .checked_add(other.amount)
                .ok_or_else(|| LoanError::validation("amount overflow in sum"))?;
        }
        Ok(self.with_amount(total))
    }

    /// subtract `other` from self, both in the same currency
    pub fn minus(&self, other: &MoneyValue) -> Result<MoneyValue> {
        self.sum([&other.negate()])
    }

    /// split off `portion` of this value.
    ///
    /// The taken part is rounded to the currency's precision; the remainder is the plain
    /// difference, so `taken + remainder == self` holds exactly.
    pub fn take(&self, portion: Rate) -> Result<Split> {
        if !portion.is_portion() {
            return Err(LoanError::InvalidPortion { portion });
        }

        let raw = self
            .amount
            .checked_mul(portion.as_decimal())
            .ok_or_else(|| LoanError::validation("amount overflow in take"))?;
        let taken = self.with_amount(raw).validate()?.value;
        let remainder = self.with_amount(self.amount - taken.amount);

        Ok(Split { taken, remainder })
    }
}

impl fmt::Display for MoneyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Currency::lookup(&self.currency) {
            Some(c) => write!(f, "{} {}", self.amount.round_dp_with_strategy(c.precision, ROUNDING), self.currency),
            None => write!(f, "{} {}", self.amount, self.currency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn money(code: &str, amount: Decimal) -> MoneyValue {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MoneyValue::new(code, amount, at, "test")
    }

    #[test]
    fn test_validate_unknown_currency() {
        let err = money("ABC", dec!(10000.234)).validate().unwrap_err();
        assert_eq!(err, LoanError::UnknownCurrency { code: "ABC".to_string() });
    }

    #[test]
    fn test_validate_rounds_per_currency() {
        let idr = money("IDR", dec!(10000.234)).validate().unwrap();
        assert_eq!(idr.value.amount(), dec!(10000.23));
        assert_eq!(
            idr.mismatch,
            Some(PrecisionMismatch {
                currency: "IDR".to_string(),
                raw: dec!(10000.234),
                rounded: dec!(10000.23),
            })
        );

        let jpy = money("JPY", dec!(10000.5)).validate().unwrap();
        assert_eq!(jpy.value.amount(), dec!(10001));

        let kwd = money("KWD", dec!(1.2345)).validate().unwrap();
        assert_eq!(kwd.value.amount(), dec!(1.235));

        let exact = money("USD", dec!(12.50)).validate().unwrap();
        assert!(exact.mismatch.is_none());
    }

    #[test]
    fn test_validate_negative_midpoint_rounds_away_from_zero() {
        let v = money("USD", dec!(-0.125)).validate().unwrap();
        assert_eq!(v.value.amount(), dec!(-0.13));
    }

    #[test]
    fn test_sum_same_currency_keeps_self_metadata() {
        let a = money("IDR", dec!(100)).with_details("a");
        let b = money("IDR", dec!(20)).with_details("b");
        let c = money("IDR", dec!(3));
        let total = a.sum([&b, &c]).unwrap();
        assert_eq!(total.amount(), dec!(123));
        assert_eq!(total.details(), "a");
        assert_eq!(total.currency(), "IDR");
    }

    #[test]
    fn test_sum_currency_mismatch() {
        let err = money("IDR", dec!(1)).sum([&money("USD", dec!(1))]).unwrap_err();
        assert!(matches!(err, LoanError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_take_invalid_portion() {
        let m = money("IDR", dec!(100));
        assert!(matches!(
            m.take(Rate::from_decimal(dec!(1.5))),
            Err(LoanError::InvalidPortion { .. })
        ));
        assert!(matches!(
            m.take(Rate::from_decimal(dec!(-0.1))),
            Err(LoanError::InvalidPortion { .. })
        ));
    }

    #[test]
    fn test_take_conserves_value() {
        let m = money("IDR", dec!(100.01));
        let split = m.take(Rate::one_over(3)).unwrap();
        assert_eq!(split.taken.amount(), dec!(33.34));
        assert_eq!(split.remainder.amount(), dec!(66.67));
        assert_eq!(split.taken.amount() + split.remainder.amount(), m.amount());
    }

    #[test]
    fn test_take_bounds() {
        let m = money("JPY", dec!(999));
        let none = m.take(Rate::ZERO).unwrap();
        assert!(none.taken.is_zero());
        assert_eq!(none.remainder.amount(), dec!(999));

        let all = m.take(Rate::ONE).unwrap();
        assert_eq!(all.taken.amount(), dec!(999));
        assert!(all.remainder.is_zero());
    }

    #[test]
    fn test_display_uses_precision() {
        assert_eq!(money("IDR", dec!(11500000)).to_string(), "11500000 IDR");
        assert_eq!(money("USD", dec!(1.005)).to_string(), "1.01 USD");
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(money("IDR", dec!(5))).unwrap();
        assert_eq!(json["iso4217"], "IDR");
        assert_eq!(json["amount"], "5");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn currency_code() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec!["IDR", "JPY", "KWD", "CLF", "USD"])
        }

        proptest! {
            #[test]
            fn take_conserves_for_any_portion(
                code in currency_code(),
                units in -1_000_000_000_000i64..1_000_000_000_000i64,
                scale in 0u32..6,
                portion_bps in 0u32..=10_000,
            ) {
                let m = money(code, Decimal::new(units, scale));
                let split = m.take(Rate::from_bps(portion_bps)).unwrap();
                prop_assert_eq!(split.taken.amount() + split.remainder.amount(), m.amount());
            }

            #[test]
            fn validate_is_idempotent(
                code in currency_code(),
                units in -1_000_000_000_000i64..1_000_000_000_000i64,
                scale in 0u32..8,
            ) {
                let once = money(code, Decimal::new(units, scale)).validate().unwrap();
                let twice = once.value.validate().unwrap();
                prop_assert_eq!(&twice.value, &once.value);
                prop_assert!(twice.mismatch.is_none());
            }
        }
    }
}
