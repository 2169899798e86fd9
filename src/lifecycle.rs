use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::config::LoanConfig;
use crate::errors::{LoanError, Result};
use crate::money::PrecisionMismatch;
use crate::payments::{InstallmentScheduler, InvestmentAllocator};
use crate::request::{
    ApproveRequest, DisburseRequest, InvestRequest, ProposeRequest, TransitionOutcome, TransitionRequest,
};
use crate::state::{Loan, LoanParty};
use crate::store::{LoanMutation, LoanStore, QueryFilter};
use crate::types::{LoanId, LoanState, PartyRole};
use crate::view::LoanView;

/// Drives a loan through Proposed, Approved, Invested and Disbursed.
///
/// Requests are validated before the store is touched. The store applies each
/// transition as a conditional write, so a loan that moved on in the meantime
/// surfaces as `StateConflict` and nothing is written.
pub struct LoanStateMachine<S: LoanStore> {
    config: LoanConfig,
    store: S,
    time: Arc<SafeTimeProvider>,
    scheduler: InstallmentScheduler,
    allocator: InvestmentAllocator,
}

fn log_warnings(loan_id: &LoanId, warnings: &[PrecisionMismatch]) {
    for w in warnings {
        warn!(
            loan_id = %loan_id,
            currency = %w.currency,
            raw = %w.raw,
            rounded = %w.rounded,
            "amount rounded to currency precision"
        );
    }
}

impl<S: LoanStore> LoanStateMachine<S> {
    pub fn new(config: LoanConfig, store: S, time: Arc<SafeTimeProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: InstallmentScheduler::from_config(&config),
            allocator: InvestmentAllocator::from_config(&config),
            config,
            store,
            time,
        })
    }

    pub fn config(&self) -> &LoanConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// dispatch a transition request to its handler
    pub fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome> {
        match request {
            TransitionRequest::Proposed(r) => self.propose(r),
            TransitionRequest::Approved(r) => self.approve(r),
            TransitionRequest::Invested(r) => self.invest(r),
            TransitionRequest::Disbursed(r) => self.disburse(r),
        }
    }

    /// Create a loan with its borrower and repayment schedule.
    ///
    /// The principal is rounded to its currency first; a rounding is reported in the
    /// outcome, not treated as a failure.
    pub fn propose(&self, request: ProposeRequest) -> Result<TransitionOutcome> {
        debug!(borrower = %request.borrower_id, principal = %request.principal, "propose");
        request.validate()?;

        let rounded = request.principal.validate()?;
        if !rounded.value.is_positive() {
            return Err(LoanError::validation(format!(
                "principal {} rounds to zero",
                request.principal.amount()
            )));
        }
        let warnings: Vec<PrecisionMismatch> = rounded.mismatch.into_iter().collect();

        let now = self.time.now();
        let loan_id = LoanId::generate();
        log_warnings(&loan_id, &warnings);

        let schedule = self.scheduler.schedule(&rounded.value, now)?;
        let borrower = LoanParty::new(
            request.borrower_id,
            PartyRole::Borrower,
            schedule.borrower_payments(&loan_id, now),
        );

        let loan = self.store.mutate(LoanMutation::Propose {
            loan: Loan::proposed(loan_id, borrower),
            at: now,
        })?;
        info!(
            loan_id = %loan.loan_id,
            repayment_total = %schedule.repayment_total,
            installments = schedule.installments.len(),
            "loan proposed"
        );

        Ok(TransitionOutcome {
            precision_warnings: warnings,
            ..TransitionOutcome::new(loan)
        })
    }

    pub fn approve(&self, request: ApproveRequest) -> Result<TransitionOutcome> {
        debug!(loan_id = %request.loan_id, approved_by = %request.approved_by, "approve");
        request.validate()?;

        let loan = self.store.mutate(LoanMutation::Approve {
            loan_id: request.loan_id,
            approved_by: request.approved_by,
            document: request.document,
            at: self.time.now(),
        })?;
        info!(loan_id = %loan.loan_id, "loan approved");

        Ok(TransitionOutcome::new(loan))
    }

    /// Allocate lender offers against the loan's principal and attach the lenders.
    ///
    /// The principal is read from the stored borrower draw. Either every used offer is
    /// committed with the Invested state or nothing is.
    pub fn invest(&self, request: InvestRequest) -> Result<TransitionOutcome> {
        debug!(loan_id = %request.loan_id, offers = request.offers.len(), "invest");
        request.validate()?;

        let (offers, warnings) = request.rounded_offers()?;
        log_warnings(&request.loan_id, &warnings);

        let stored = self.load(&request.loan_id)?;
        if stored.state != LoanState::Approved {
            return Err(LoanError::StateConflict {
                loan_id: request.loan_id,
                expected: LoanState::Approved,
            });
        }
        let principal = stored.principal().ok_or_else(|| LoanError::Storage {
            message: format!("loan {} has no principal draw", request.loan_id),
        })?;

        let now = self.time.now();
        let allocation = self.allocator.allocate(&request.loan_id, &principal, &offers, now)?;

        let loan = self.store.mutate(LoanMutation::Invest {
            loan_id: request.loan_id,
            lenders: allocation.lender_parties(),
            at: now,
        })?;
        info!(
            loan_id = %loan.loan_id,
            used = allocation.used.len(),
            unused = allocation.unused.len(),
            "loan invested"
        );

        Ok(TransitionOutcome {
            loan,
            precision_warnings: warnings,
            allocation: Some(allocation),
        })
    }

    pub fn disburse(&self, request: DisburseRequest) -> Result<TransitionOutcome> {
        debug!(loan_id = %request.loan_id, disbursed_by = %request.disbursed_by, "disburse");
        request.validate()?;

        let loan = self.store.mutate(LoanMutation::Disburse {
            loan_id: request.loan_id,
            disbursed_by: request.disbursed_by,
            contract: request.contract,
            at: self.time.now(),
        })?;
        info!(loan_id = %loan.loan_id, "loan disbursed");

        Ok(TransitionOutcome::new(loan))
    }

    /// load one loan aggregate
    pub fn load(&self, loan_id: &LoanId) -> Result<Loan> {
        self.store
            .query(&QueryFilter::ByLoanId(*loan_id))?
            .into_iter()
            .next()
            .ok_or(LoanError::LoanNotFound { loan_id: *loan_id })
    }

    pub fn view(&self, filter: &QueryFilter) -> Result<Vec<LoanView>> {
        Ok(self.store.query(filter)?.iter().map(LoanView::from_loan).collect())
    }
}
