pub mod audit;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod lifecycle;
pub mod money;
pub mod payments;
pub mod request;
pub mod state;
pub mod store;
pub mod types;
pub mod view;

// re-export key types
pub use audit::{Attestation, AuditSigner};
pub use config::LoanConfig;
pub use decimal::Rate;
pub use errors::{LoanError, Result};
pub use lifecycle::LoanStateMachine;
pub use money::{Currency, MoneyValue, PrecisionMismatch, Rounded, Split};
pub use payments::{
    Allocation, CoveredOfferPolicy, InstallmentScheduler, InvestmentAllocator, LenderOffer,
    RepaymentSchedule, UsedInvestment,
};
pub use request::{
    ApproveRequest, DisburseRequest, InvestRequest, ProposeRequest, TransitionOutcome,
    TransitionRequest,
};
pub use state::{ApprovalRecord, DisbursementRecord, Loan, LoanParty, Payment};
pub use store::{InMemoryLoanStore, LoanMutation, LoanStore, QueryFilter};
pub use types::{LoanId, LoanState, PartyId, PartyRole, UserId};
pub use view::LoanView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
