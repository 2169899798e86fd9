pub mod allocation;
pub mod schedule;

pub use allocation::{Allocation, CoveredOfferPolicy, InvestmentAllocator, LenderOffer, UsedInvestment};
pub use schedule::{add_months, Installment, InstallmentScheduler, RepaymentSchedule};
