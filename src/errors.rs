use rust_decimal::Decimal;
use thiserror::Error;

use crate::decimal::Rate;
use crate::money::MoneyValue;
use crate::types::{LoanId, LoanState};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("unknown ISO 4217 currency code: {code}")]
    UnknownCurrency {
        code: String,
    },

    #[error("invalid portion {portion}: should be ranged between 0 and 1")]
    InvalidPortion {
        portion: Rate,
    },

    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        expected: String,
        found: String,
    },

    #[error("precision mismatch for {currency}: {raw} rounded to {rounded}")]
    PrecisionMismatch {
        currency: String,
        raw: Decimal,
        rounded: Decimal,
    },

    #[error("state conflict on loan {loan_id}: expected {expected:?}")]
    StateConflict {
        loan_id: LoanId,
        expected: LoanState,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("principal is not fully covered, missing {missing}")]
    Coverage {
        missing: MoneyValue,
    },

    #[error("invalid signature: {message}")]
    InvalidSignature {
        message: String,
    },

    #[error("invalid identifier: {message}")]
    InvalidIdentifier {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },
}

impl LoanError {
    pub fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
