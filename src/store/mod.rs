pub mod memory;
pub mod rows;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::state::{Loan, LoanParty};
use crate::types::{LoanId, LoanState, UserId};

pub use memory::InMemoryLoanStore;
pub use rows::{group_rows, LoanRecord, LoanRow, PartyRecord};

/// which loans to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    ByLoanId(LoanId),
    ByBorrowerId(UserId),
    ByLenderId(UserId),
}

/// A single state transition submitted to the store.
///
/// Each variant names the state it moves the loan into; the store applies it only when
/// the stored state equals [`LoanMutation::required_state`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoanMutation {
    Propose {
        loan: Loan,
        at: DateTime<Utc>,
    },
    Approve {
        loan_id: LoanId,
        approved_by: UserId,
        document: String,
        at: DateTime<Utc>,
    },
    Invest {
        loan_id: LoanId,
        lenders: Vec<LoanParty>,
        at: DateTime<Utc>,
    },
    Disburse {
        loan_id: LoanId,
        disbursed_by: UserId,
        contract: String,
        at: DateTime<Utc>,
    },
}

impl LoanMutation {
    pub fn loan_id(&self) -> LoanId {
        match self {
            LoanMutation::Propose { loan, .. } => loan.loan_id,
            LoanMutation::Approve { loan_id, .. }
            | LoanMutation::Invest { loan_id, .. }
            | LoanMutation::Disburse { loan_id, .. } => *loan_id,
        }
    }

    pub fn target_state(&self) -> LoanState {
        match self {
            LoanMutation::Propose { .. } => LoanState::Proposed,
            LoanMutation::Approve { .. } => LoanState::Approved,
            LoanMutation::Invest { .. } => LoanState::Invested,
            LoanMutation::Disburse { .. } => LoanState::Disbursed,
        }
    }

    /// state the loan must currently be in; `None` means the loan must not exist yet
    pub fn required_state(&self) -> Option<LoanState> {
        self.target_state().predecessor()
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            LoanMutation::Propose { at, .. }
            | LoanMutation::Approve { at, .. }
            | LoanMutation::Invest { at, .. }
            | LoanMutation::Disburse { at, .. } => *at,
        }
    }
}

/// Persistence collaborator for loan aggregates.
///
/// `mutate` must be atomic: it checks the stored state against
/// [`LoanMutation::required_state`] and writes every new or changed row as one unit, or
/// writes nothing and fails with `StateConflict`, or `LoanNotFound` when there is no row for
/// the loan at all. Attestations are stamped inside the same
/// unit. `query` returns fully hydrated aggregates.
pub trait LoanStore: Send + Sync {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<Loan>>;

    fn mutate(&self, mutation: LoanMutation) -> Result<Loan>;
}
