use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};
use crate::money::{MoneyValue, PrecisionMismatch};
use crate::payments::{Allocation, LenderOffer};
use crate::state::Loan;
use crate::types::{LoanId, UserId};

/// A lifecycle transition, exactly one payload per request.
///
/// Serialised externally tagged by the state the loan moves into, e.g.
/// `{"approved": {"loan_id": "...", ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionRequest {
    Proposed(ProposeRequest),
    Approved(ApproveRequest),
    Invested(InvestRequest),
    Disbursed(DisburseRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub borrower_id: UserId,
    pub principal: MoneyValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub loan_id: LoanId,
    pub approved_by: UserId,
    /// reference to the approval document, e.g. a url
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestRequest {
    pub loan_id: LoanId,
    pub offers: Vec<LenderOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisburseRequest {
    pub loan_id: LoanId,
    pub disbursed_by: UserId,
    /// reference to the signed loan contract
    pub contract: String,
}

/// committed result of a transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub loan: Loan,
    /// amounts that were rounded to their currency's minor unit on the way in
    pub precision_warnings: Vec<PrecisionMismatch>,
    /// used and unused offers, set for the invest transition only
    pub allocation: Option<Allocation>,
}

impl TransitionOutcome {
    pub fn new(loan: Loan) -> Self {
        Self {
            loan,
            precision_warnings: Vec::new(),
            allocation: None,
        }
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoanError::validation(format!("{} is required", field)));
    }
    Ok(())
}

impl ProposeRequest {
    pub fn validate(&self) -> Result<()> {
        require(self.borrower_id.as_str(), "borrower_id")?;
        self.principal.precision()?;
        if !self.principal.is_positive() {
            return Err(LoanError::validation(format!(
                "principal must be positive, got {}",
                self.principal
            )));
        }
        Ok(())
    }
}

impl ApproveRequest {
    pub fn validate(&self) -> Result<()> {
        require(self.approved_by.as_str(), "approved_by")?;
        require(&self.document, "document")
    }
}

impl DisburseRequest {
    pub fn validate(&self) -> Result<()> {
        require(self.disbursed_by.as_str(), "disbursed_by")?;
        require(&self.contract, "contract")
    }
}

impl InvestRequest {
    /// Structural checks on the offers: at least one, each with a lender and a positive
    /// amount in a known currency, all in one currency.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .offers
            .first()
            .ok_or_else(|| LoanError::validation("at least one lender offer is required"))?;

        for offer in &self.offers {
            require(offer.lender_id.as_str(), "lender_id")?;
            offer.payment.precision()?;
            if !offer.payment.is_positive() {
                return Err(LoanError::validation(format!(
                    "offer from {} must be positive, got {}",
                    offer.lender_id, offer.payment
                )));
            }
            if offer.payment.currency() != first.payment.currency() {
                return Err(LoanError::CurrencyMismatch {
                    expected: first.payment.currency().to_string(),
                    found: offer.payment.currency().to_string(),
                });
            }
        }
        Ok(())
    }

    /// offers rounded to their currency's precision, with a warning per rounded amount
    pub fn rounded_offers(&self) -> Result<(Vec<LenderOffer>, Vec<PrecisionMismatch>)> {
        let mut offers = Vec::with_capacity(self.offers.len());
        let mut warnings = Vec::new();

        for offer in &self.offers {
            let rounded = offer.payment.validate()?;
            if !rounded.value.is_positive() {
                return Err(LoanError::validation(format!(
                    "offer from {} rounds to zero, got {}",
                    offer.lender_id,
                    offer.payment.amount()
                )));
            }
            warnings.extend(rounded.mismatch);
            offers.push(LenderOffer {
                payment: rounded.value,
                ..offer.clone()
            });
        }
        Ok((offers, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money(code: &str, amount: Decimal) -> MoneyValue {
        MoneyValue::new(code, amount, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), "")
    }

    fn offer(lender: &str, payment: MoneyValue) -> LenderOffer {
        LenderOffer {
            lender_id: UserId::from(lender),
            contract: None,
            payment,
        }
    }

    #[test]
    fn test_propose_requires_borrower_and_positive_principal() {
        let ok = ProposeRequest {
            borrower_id: UserId::from("900"),
            principal: money("IDR", dec!(10000000)),
        };
        assert!(ok.validate().is_ok());

        let no_borrower = ProposeRequest {
            borrower_id: UserId::from("  "),
            ..ok.clone()
        };
        assert!(matches!(no_borrower.validate(), Err(LoanError::Validation { .. })));

        let zero = ProposeRequest {
            principal: money("IDR", Decimal::ZERO),
            ..ok.clone()
        };
        assert!(matches!(zero.validate(), Err(LoanError::Validation { .. })));

        let unknown = ProposeRequest {
            principal: money("XYZ", dec!(5)),
            ..ok
        };
        assert!(matches!(unknown.validate(), Err(LoanError::UnknownCurrency { .. })));
    }

    #[test]
    fn test_approve_and_disburse_require_fields() {
        let approve = ApproveRequest {
            loan_id: LoanId::generate(),
            approved_by: UserId::from("777"),
            document: String::new(),
        };
        assert!(approve.validate().is_err());

        let disburse = DisburseRequest {
            loan_id: LoanId::generate(),
            disbursed_by: UserId::from(""),
            contract: "http://docs/contract".to_string(),
        };
        assert!(disburse.validate().is_err());
    }

    #[test]
    fn test_invest_validation() {
        let loan_id = LoanId::generate();
        let empty = InvestRequest {
            loan_id,
            offers: Vec::new(),
        };
        assert!(matches!(empty.validate(), Err(LoanError::Validation { .. })));

        let negative = InvestRequest {
            loan_id,
            offers: vec![offer("1111", money("IDR", dec!(-5)))],
        };
        assert!(matches!(negative.validate(), Err(LoanError::Validation { .. })));

        let mixed = InvestRequest {
            loan_id,
            offers: vec![offer("1111", money("IDR", dec!(5))), offer("1112", money("USD", dec!(5)))],
        };
        assert!(matches!(mixed.validate(), Err(LoanError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_rounded_offers_surface_warnings() {
        let request = InvestRequest {
            loan_id: LoanId::generate(),
            offers: vec![
                offer("1111", money("IDR", dec!(5000000.004))),
                offer("1112", money("IDR", dec!(5000000))),
            ],
        };
        let (offers, warnings) = request.rounded_offers().unwrap();
        assert_eq!(offers[0].payment.amount(), dec!(5000000.00));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].raw, dec!(5000000.004));
    }

    #[test]
    fn test_offer_rounding_to_zero_rejected() {
        let request = InvestRequest {
            loan_id: LoanId::generate(),
            offers: vec![offer("1111", money("IDR", dec!(0.001)))],
        };
        assert!(request.validate().is_ok());
        assert!(matches!(request.rounded_offers(), Err(LoanError::Validation { .. })));
    }

    #[test]
    fn test_request_is_externally_tagged() {
        let request = TransitionRequest::Disbursed(DisburseRequest {
            loan_id: LoanId::generate(),
            disbursed_by: UserId::from("777"),
            contract: "http://docs/contract".to_string(),
        });
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("disbursed").is_some());

        let back: TransitionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
