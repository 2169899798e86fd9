use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::Attestation;
use crate::money::MoneyValue;
use crate::types::{LoanId, LoanState, PartyId, PartyRole, UserId};

/// loan aggregate: the loan row plus its parties and their payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub parties: Vec<LoanParty>,
    pub approval: Option<ApprovalRecord>,
    pub disbursement: Option<DisbursementRecord>,
    /// stamped by the store when the loan is first written
    pub created: Option<Attestation>,
}

/// approval metadata, attached on the Approved transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approved_by: UserId,
    pub document: String,
    pub attested: Option<Attestation>,
}

/// disbursement metadata, attached on the Disbursed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRecord {
    pub disbursed_by: UserId,
    pub contract: String,
    pub attested: Option<Attestation>,
}

/// participant on a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParty {
    pub party_id: PartyId,
    pub user_id: UserId,
    pub role: PartyRole,
    pub payments: Vec<Payment>,
    pub created: Option<Attestation>,
}

/// Signed ledger entry against a party.
///
/// Negative amounts are outflows recorded against the party (principal draw,
/// repayment owed to a lender); positive amounts are inflows (installment due,
/// investment contributed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "iso4217")]
    pub currency: String,
    pub amount: Decimal,
    pub due: DateTime<Utc>,
    pub details: String,
    pub created: Option<Attestation>,
}

impl Payment {
    pub fn from_money(money: &MoneyValue) -> Self {
        Self {
            currency: money.currency().to_string(),
            amount: money.amount(),
            due: money.timestamp(),
            details: money.details().to_string(),
            created: None,
        }
    }

    pub fn as_money(&self) -> MoneyValue {
        MoneyValue::new(self.currency.clone(), self.amount, self.due, self.details.clone())
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

impl LoanParty {
    pub fn new(user_id: UserId, role: PartyRole, payments: Vec<Payment>) -> Self {
        Self {
            party_id: PartyId::generate(),
            user_id,
            role,
            payments,
            created: None,
        }
    }
}

impl Loan {
    /// fresh loan in the Proposed state
    pub fn proposed(loan_id: LoanId, borrower: LoanParty) -> Self {
        Self {
            loan_id,
            state: LoanState::Proposed,
            parties: vec![borrower],
            approval: None,
            disbursement: None,
            created: None,
        }
    }

    pub fn borrower(&self) -> Option<&LoanParty> {
        self.parties.iter().find(|p| p.role == PartyRole::Borrower)
    }

    pub fn lenders(&self) -> impl Iterator<Item = &LoanParty> {
        self.parties.iter().filter(|p| p.role == PartyRole::Lender)
    }

    /// Outstanding principal, read from the borrower's principal-draw payment.
    ///
    /// The draw is the borrower's first outflow; the returned value is positive.
    pub fn principal(&self) -> Option<MoneyValue> {
        self.borrower()?
            .payments
            .iter()
            .find(|p| p.is_outflow())
            .map(|p| p.as_money().negate())
    }

    /// installments due from the borrower, in schedule order
    pub fn installments(&self) -> Vec<&Payment> {
        self.borrower()
            .map(|b| b.payments.iter().filter(|p| !p.is_outflow()).collect())
            .unwrap_or_default()
    }

    /// every attestation on the aggregate, loan first then parties and payments
    pub fn attestations(&self) -> Vec<&Attestation> {
        let mut all: Vec<&Attestation> = Vec::new();
        all.extend(self.created.as_ref());
        all.extend(self.approval.as_ref().and_then(|a| a.attested.as_ref()));
        all.extend(self.disbursement.as_ref().and_then(|d| d.attested.as_ref()));
        for party in &self.parties {
            all.extend(party.created.as_ref());
            for payment in &party.payments {
                all.extend(payment.created.as_ref());
            }
        }
        all
    }
}
