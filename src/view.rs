/// read-model projections of a loan
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::Attestation;
use crate::state::{Loan, LoanParty, Payment};
use crate::types::{LoanId, LoanState, UserId};

/// serializable view of a loan's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub created_at: Option<DateTime<Utc>>,
    pub borrower: Option<BorrowerView>,
    pub lenders: Vec<LenderView>,
    pub approval: Option<SignoffView>,
    pub disbursement: Option<SignoffView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerView {
    pub user_id: UserId,
    pub principal: Option<PaymentView>,
    /// installments still expected from the borrower
    pub expected_payments: Vec<PaymentView>,
    pub repayment_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderView {
    pub user_id: UserId,
    pub invested: Decimal,
    pub payments: Vec<PaymentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub iso4217: String,
    pub amount: Decimal,
    pub due: DateTime<Utc>,
    pub details: String,
}

/// who signed off a transition, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignoffView {
    pub by: UserId,
    pub document: String,
    pub at: Option<DateTime<Utc>>,
}

fn attested_at(attestation: &Option<Attestation>) -> Option<DateTime<Utc>> {
    attestation.as_ref().and_then(Attestation::at)
}

impl PaymentView {
    fn from_payment(payment: &Payment) -> Self {
        PaymentView {
            iso4217: payment.currency.clone(),
            amount: payment.amount,
            due: payment.due,
            details: payment.details.clone(),
        }
    }
}

impl BorrowerView {
    fn from_party(party: &LoanParty) -> Self {
        let principal = party.payments.iter().find(|p| p.is_outflow()).map(PaymentView::from_payment);
        let expected_payments: Vec<PaymentView> = party
            .payments
            .iter()
            .filter(|p| !p.is_outflow())
            .map(PaymentView::from_payment)
            .collect();
        let repayment_total: Decimal = expected_payments.iter().map(|p| p.amount).sum();

        BorrowerView {
            user_id: party.user_id.clone(),
            principal,
            expected_payments,
            repayment_total,
        }
    }
}

impl LenderView {
    fn from_party(party: &LoanParty) -> Self {
        LenderView {
            user_id: party.user_id.clone(),
            invested: party.payments.iter().filter(|p| !p.is_outflow()).map(|p| p.amount).sum(),
            payments: party.payments.iter().map(PaymentView::from_payment).collect(),
        }
    }
}

impl LoanView {
    pub fn from_loan(loan: &Loan) -> Self {
        LoanView {
            loan_id: loan.loan_id,
            state: loan.state,
            created_at: attested_at(&loan.created),
            borrower: loan.borrower().map(BorrowerView::from_party),
            lenders: loan.lenders().map(LenderView::from_party).collect(),
            approval: loan.approval.as_ref().map(|a| SignoffView {
                by: a.approved_by.clone(),
                document: a.document.clone(),
                at: attested_at(&a.attested),
            }),
            disbursement: loan.disbursement.as_ref().map(|d| SignoffView {
                by: d.disbursed_by.clone(),
                document: d.contract.clone(),
                at: attested_at(&d.attested),
            }),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
