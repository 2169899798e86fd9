use crate::audit::Attestation;
use crate::state::{ApprovalRecord, DisbursementRecord, Loan, LoanParty, Payment};
use crate::types::{LoanId, LoanState, PartyId, PartyRole, UserId};

/// loan columns of a joined row
#[derive(Debug, Clone, PartialEq)]
pub struct LoanRecord {
    pub loan_id: LoanId,
    pub state: LoanState,
    pub approval: Option<ApprovalRecord>,
    pub disbursement: Option<DisbursementRecord>,
    pub created: Option<Attestation>,
}

/// party columns of a joined row
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRecord {
    pub party_id: PartyId,
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub role: PartyRole,
    pub created: Option<Attestation>,
}

/// One row of the loan / party / payment join.
///
/// Party and payment columns are empty for a loan without parties, payment columns for
/// a party without payments.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanRow {
    pub loan: LoanRecord,
    pub party: Option<PartyRecord>,
    pub payment: Option<Payment>,
}

impl LoanRecord {
    pub fn from_loan(loan: &Loan) -> Self {
        Self {
            loan_id: loan.loan_id,
            state: loan.state,
            approval: loan.approval.clone(),
            disbursement: loan.disbursement.clone(),
            created: loan.created.clone(),
        }
    }

    fn into_loan(self) -> Loan {
        Loan {
            loan_id: self.loan_id,
            state: self.state,
            parties: Vec::new(),
            approval: self.approval,
            disbursement: self.disbursement,
            created: self.created,
        }
    }
}

impl PartyRecord {
    pub fn from_party(loan_id: LoanId, party: &LoanParty) -> Self {
        Self {
            party_id: party.party_id,
            loan_id,
            user_id: party.user_id.clone(),
            role: party.role,
            created: party.created.clone(),
        }
    }

    fn into_party(self) -> LoanParty {
        LoanParty {
            party_id: self.party_id,
            user_id: self.user_id,
            role: self.role,
            payments: Vec::new(),
            created: self.created,
        }
    }
}

/// Rebuild loan aggregates from flat join rows.
///
/// Rows must arrive sorted by loan, then by party within a loan: a new aggregate starts
/// whenever the loan id changes and a new party whenever the party id changes. Loans
/// and parties come out in the order they were first seen.
pub fn group_rows<I>(rows: I) -> Vec<Loan>
where
    I: IntoIterator<Item = LoanRow>,
{
    let mut loans: Vec<Loan> = Vec::new();
    // index of the open party inside the open loan
    let mut party_idx: Option<usize> = None;

    for row in rows {
        let same_loan = loans
            .last()
            .map(|l| l.loan_id == row.loan.loan_id)
            .unwrap_or(false);
        if !same_loan {
            loans.push(row.loan.into_loan());
            party_idx = None;
        }
        let loan_idx = loans.len() - 1;

        let Some(party) = row.party else {
            continue;
        };

        let same_party = party_idx
            .map(|i| loans[loan_idx].parties[i].party_id == party.party_id)
            .unwrap_or(false);
        if !same_party {
            loans[loan_idx].parties.push(party.into_party());
            party_idx = Some(loans[loan_idx].parties.len() - 1);
        }

        if let (Some(payment), Some(i)) = (row.payment, party_idx) {
            loans[loan_idx].parties[i].payments.push(payment);
        }
    }

    loans
}

/// Flatten an aggregate into join rows, the inverse of [`group_rows`].
pub fn flatten(loan: &Loan) -> Vec<LoanRow> {
    let record = LoanRecord::from_loan(loan);
    if loan.parties.is_empty() {
        return vec![LoanRow {
            loan: record,
            party: None,
            payment: None,
        }];
    }

    let mut rows = Vec::new();
    for party in &loan.parties {
        let party_record = PartyRecord::from_party(loan.loan_id, party);
        if party.payments.is_empty() {
            rows.push(LoanRow {
                loan: record.clone(),
                party: Some(party_record),
                payment: None,
            });
            continue;
        }
        for payment in &party.payments {
            rows.push(LoanRow {
                loan: record.clone(),
                party: Some(party_record.clone()),
                payment: Some(payment.clone()),
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn payment(amount: Decimal) -> Payment {
        Payment {
            currency: "IDR".to_string(),
            amount,
            due: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            details: String::new(),
            created: None,
        }
    }

    fn loan_with(parties: Vec<LoanParty>) -> Loan {
        Loan {
            loan_id: LoanId::generate(),
            state: LoanState::Invested,
            parties,
            approval: None,
            disbursement: None,
            created: None,
        }
    }

    #[test]
    fn test_groups_on_boundary_changes() {
        let first = loan_with(vec![
            LoanParty::new(UserId::from("900"), PartyRole::Borrower, vec![payment(dec!(-100)), payment(dec!(60)), payment(dec!(55))]),
            LoanParty::new(UserId::from("1111"), PartyRole::Lender, vec![payment(dec!(100)), payment(dec!(-101))]),
        ]);
        let second = loan_with(vec![LoanParty::new(
            UserId::from("901"),
            PartyRole::Borrower,
            vec![payment(dec!(-5))],
        )]);

        let rows: Vec<LoanRow> = flatten(&first).into_iter().chain(flatten(&second)).collect();
        assert_eq!(rows.len(), 6);

        let loans = group_rows(rows);
        assert_eq!(loans, vec![first, second]);
    }

    #[test]
    fn test_loan_and_party_without_children() {
        let bare = loan_with(Vec::new());
        let empty_party = loan_with(vec![LoanParty::new(UserId::from("900"), PartyRole::Borrower, Vec::new())]);

        let rows: Vec<LoanRow> = flatten(&bare).into_iter().chain(flatten(&empty_party)).collect();
        let loans = group_rows(rows);

        assert_eq!(loans.len(), 2);
        assert!(loans[0].parties.is_empty());
        assert_eq!(loans[1].parties.len(), 1);
        assert!(loans[1].parties[0].payments.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(group_rows(Vec::new()).is_empty());
    }
}
