use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::audit::{Attestation, AuditSigner};
use crate::errors::{LoanError, Result};
use crate::state::{ApprovalRecord, DisbursementRecord, Loan, LoanParty, Payment};
use crate::store::rows::{group_rows, LoanRecord, LoanRow, PartyRecord};
use crate::store::{LoanMutation, LoanStore, QueryFilter};
use crate::types::{LoanId, PartyId, PartyRole, UserId};

/// normalised tables, as a relational store would keep them
#[derive(Debug, Default)]
struct Tables {
    loans: Vec<LoanRecord>,
    parties: Vec<PartyRecord>,
    payments: Vec<(PartyId, Payment)>,
}

/// In-memory loan store for testing and embedding.
///
/// A single write lock covers each mutation, giving the compare-and-swap on state plus
/// the row inserts as one unit.
#[derive(Clone)]
pub struct InMemoryLoanStore {
    tables: Arc<RwLock<Tables>>,
    signer: Arc<AuditSigner>,
}

impl InMemoryLoanStore {
    pub fn new(signer: AuditSigner) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            signer: Arc::new(signer),
        }
    }

    pub fn signer(&self) -> &AuditSigner {
        &self.signer
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> LoanError {
        LoanError::Storage {
            message: format!("lock poisoned: {}", e),
        }
    }

    fn verify(&self, loan: &Loan) -> Result<()> {
        for attestation in loan.attestations() {
            self.signer.verify(attestation)?;
        }
        Ok(())
    }
}

impl Tables {
    fn loan_mut(&mut self, loan_id: &LoanId) -> Option<&mut LoanRecord> {
        self.loans.iter_mut().find(|l| l.loan_id == *loan_id)
    }

    fn matches(&self, record: &LoanRecord, filter: &QueryFilter) -> bool {
        let has_party = |role: PartyRole, user: &UserId| {
            self.parties
                .iter()
                .any(|p| p.loan_id == record.loan_id && p.role == role && p.user_id == *user)
        };
        match filter {
            QueryFilter::ByLoanId(id) => record.loan_id == *id,
            QueryFilter::ByBorrowerId(user) => has_party(PartyRole::Borrower, user),
            QueryFilter::ByLenderId(user) => has_party(PartyRole::Lender, user),
        }
    }

    /// join rows for matching loans, ordered by loan id then party insertion order
    fn join(&self, filter: &QueryFilter) -> Vec<LoanRow> {
        let mut loans: Vec<&LoanRecord> = self.loans.iter().filter(|l| self.matches(l, filter)).collect();
        loans.sort_by_key(|l| l.loan_id);

        let mut rows = Vec::new();
        for loan in loans {
            let parties: Vec<&PartyRecord> = self.parties.iter().filter(|p| p.loan_id == loan.loan_id).collect();
            if parties.is_empty() {
                rows.push(LoanRow {
                    loan: loan.clone(),
                    party: None,
                    payment: None,
                });
                continue;
            }
            for party in parties {
                let payments: Vec<&Payment> = self
                    .payments
                    .iter()
                    .filter(|(id, _)| *id == party.party_id)
                    .map(|(_, p)| p)
                    .collect();
                if payments.is_empty() {
                    rows.push(LoanRow {
                        loan: loan.clone(),
                        party: Some(party.clone()),
                        payment: None,
                    });
                }
                for payment in payments {
                    rows.push(LoanRow {
                        loan: loan.clone(),
                        party: Some(party.clone()),
                        payment: Some(payment.clone()),
                    });
                }
            }
        }
        rows
    }

    fn insert_parties(&mut self, loan_id: LoanId, parties: &[LoanParty], seal: &Attestation) {
        for party in parties {
            let mut record = PartyRecord::from_party(loan_id, party);
            record.created = Some(seal.clone());
            self.parties.push(record);

            for payment in &party.payments {
                let mut payment = payment.clone();
                payment.created = Some(seal.clone());
                self.payments.push((party.party_id, payment));
            }
        }
    }
}

impl LoanStore for InMemoryLoanStore {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<Loan>> {
        let rows = {
            let tables = self.tables.read().map_err(Self::poisoned)?;
            tables.join(filter)
        };

        let loans = group_rows(rows);
        for loan in &loans {
            self.verify(loan)?;
        }
        Ok(loans)
    }

    fn mutate(&self, mutation: LoanMutation) -> Result<Loan> {
        let loan_id = mutation.loan_id();
        let target = mutation.target_state();
        let seal = self.signer.stamp_at(mutation.at());

        {
            let mut tables = self.tables.write().map_err(Self::poisoned)?;

            // check the precondition before touching any row
            match (tables.loans.iter().find(|l| l.loan_id == loan_id), mutation.required_state()) {
                (Some(_), None) => {
                    return Err(LoanError::Storage {
                        message: format!("loan {} already exists", loan_id),
                    });
                }
                (None, Some(_)) => return Err(LoanError::LoanNotFound { loan_id }),
                (Some(stored), Some(required)) if stored.state != required => {
                    debug!(loan_id = %loan_id, stored = %stored.state, %required, "state precondition failed");
                    return Err(LoanError::StateConflict {
                        loan_id,
                        expected: required,
                    });
                }
                _ => {}
            }

            match mutation {
                LoanMutation::Propose { loan, .. } => {
                    let mut record = LoanRecord::from_loan(&loan);
                    record.state = target;
                    record.created = Some(seal.clone());
                    tables.loans.push(record);
                    tables.insert_parties(loan_id, &loan.parties, &seal);
                }
                LoanMutation::Approve {
                    approved_by,
                    document,
                    ..
                } => {
                    if let Some(record) = tables.loan_mut(&loan_id) {
                        record.state = target;
                        record.approval = Some(ApprovalRecord {
                            approved_by,
                            document,
                            attested: Some(seal.clone()),
                        });
                    }
                }
                LoanMutation::Invest { lenders, .. } => {
                    if let Some(record) = tables.loan_mut(&loan_id) {
                        record.state = target;
                    }
                    tables.insert_parties(loan_id, &lenders, &seal);
                }
                LoanMutation::Disburse {
                    disbursed_by,
                    contract,
                    ..
                } => {
                    if let Some(record) = tables.loan_mut(&loan_id) {
                        record.state = target;
                        record.disbursement = Some(DisbursementRecord {
                            disbursed_by,
                            contract,
                            attested: Some(seal.clone()),
                        });
                    }
                }
            }
        }

        debug!(loan_id = %loan_id, state = %target, "mutation committed");

        self.query(&QueryFilter::ByLoanId(loan_id))?
            .into_iter()
            .next()
            .ok_or(LoanError::LoanNotFound { loan_id })
    }
}
