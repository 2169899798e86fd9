use chrono::{DateTime, Months, Utc};

use crate::config::LoanConfig;
use crate::decimal::Rate;
use crate::errors::{LoanError, Result};
use crate::money::MoneyValue;
use crate::state::Payment;
use crate::types::LoanId;

/// one installment due from the borrower
#[derive(Debug, Clone, PartialEq)]
pub struct Installment {
    pub number: u32,
    pub count: u32,
    /// amount due; the value's timestamp is the due date
    pub amount: MoneyValue,
}

/// repayment obligation derived from a principal
#[derive(Debug, Clone, PartialEq)]
pub struct RepaymentSchedule {
    pub principal: MoneyValue,
    pub interest: MoneyValue,
    pub service_fee: MoneyValue,
    pub repayment_total: MoneyValue,
    pub installments: Vec<Installment>,
}

/// generates a borrower's monthly installments
#[derive(Debug, Clone)]
pub struct InstallmentScheduler {
    interest_rate: Rate,
    service_fee_rate: Rate,
    installment_count: u32,
}

impl InstallmentScheduler {
    pub fn new(interest_rate: Rate, service_fee_rate: Rate, installment_count: u32) -> Self {
        Self {
            interest_rate,
            service_fee_rate,
            installment_count,
        }
    }

    pub fn from_config(config: &LoanConfig) -> Self {
        Self::new(
            config.pricing.interest_rate,
            config.pricing.service_fee_rate,
            config.schedule.installment_count,
        )
    }

    /// Build the schedule for `principal`, first installment one month after `start`.
    ///
    /// Installment `i` takes `1/k` of what is still unscheduled, `k` counting down from
    /// the installment count, so the installments add up to the repayment total exactly.
    pub fn schedule(&self, principal: &MoneyValue, start: DateTime<Utc>) -> Result<RepaymentSchedule> {
        if self.installment_count == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "installment_count must be at least 1".to_string(),
            });
        }

        let principal = principal.validate()?.value;
        let interest = principal.take(self.interest_rate)?.taken;
        let service_fee = principal.take(self.service_fee_rate)?.taken;
        let repayment_total = principal.sum([&interest, &service_fee])?;

        let count = self.installment_count;
        let mut installments = Vec::with_capacity(count as usize);
        let mut remaining = repayment_total.clone();

        for (number, k) in (1..=count).zip((1..=count).rev()) {
            let split = remaining.take(Rate::one_over(k))?;
            let due = add_months(start, number)?;
            installments.push(Installment {
                number,
                count,
                amount: split.taken.with_timestamp(due),
            });
            remaining = split.remainder;
        }

        debug_assert!(remaining.is_zero());

        Ok(RepaymentSchedule {
            principal,
            interest,
            service_fee,
            repayment_total,
            installments,
        })
    }
}

impl RepaymentSchedule {
    /// Borrower ledger entries: the principal draw at `drawn_at` followed by each installment.
    pub fn borrower_payments(&self, loan_id: &LoanId, drawn_at: DateTime<Utc>) -> Vec<Payment> {
        let mut payments = Vec::with_capacity(self.installments.len() + 1);
        payments.push(Payment::from_money(&self.principal.negate().with_timestamp(drawn_at)));

        for installment in &self.installments {
            let labelled = installment.amount.with_details(format!(
                "Payment #{} of {} for loan [{}]",
                installment.number, installment.count, loan_id
            ));
            payments.push(Payment::from_money(&labelled));
        }
        payments
    }

    pub fn installment_total(&self) -> Result<MoneyValue> {
        let zero = MoneyValue::zero(self.repayment_total.currency(), self.repayment_total.timestamp());
        zero.sum(self.installments.iter().map(|i| &i.amount))
    }
}

/// Calendar month arithmetic; day-of-month clamps at month end.
///
/// Installment due dates are each computed from the start date rather than chained from
/// the previous due date, so a Jan 31 start gives Feb 29 then Mar 31 instead of Mar 29.
pub fn add_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LoanError::validation(format!("date overflow adding {} months", months)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap()
    }

    fn idr(amount: Decimal) -> MoneyValue {
        MoneyValue::new("IDR", amount, start(), "factory expansion")
    }

    fn standard() -> InstallmentScheduler {
        InstallmentScheduler::new(Rate::from_percentage(10), Rate::from_percentage(5), 12)
    }

    #[test]
    fn test_standard_schedule_totals() {
        let schedule = standard().schedule(&idr(dec!(10_000_000)), start()).unwrap();

        assert_eq!(schedule.interest.amount(), dec!(1_000_000));
        assert_eq!(schedule.service_fee.amount(), dec!(500_000));
        assert_eq!(schedule.repayment_total.amount(), dec!(11_500_000));
        assert_eq!(schedule.installments.len(), 12);
        assert_eq!(schedule.installment_total().unwrap().amount(), dec!(11_500_000));
    }

    #[test]
    fn test_installments_spread_evenly_with_rounding() {
        let schedule = standard().schedule(&idr(dec!(10_000_000)), start()).unwrap();
        let amounts: Vec<Decimal> = schedule.installments.iter().map(|i| i.amount.amount()).collect();

        // 11_500_000 / 12 = 958_333.333..
        assert_eq!(amounts[0], dec!(958_333.33));
        let spread = amounts.iter().max().unwrap() - amounts.iter().min().unwrap();
        assert!(spread <= dec!(0.01));
    }

    #[test]
    fn test_due_dates_are_monthly() {
        let schedule = standard().schedule(&idr(dec!(1_000)), start()).unwrap();
        let first = schedule.installments[0].amount.timestamp();
        let second = schedule.installments[1].amount.timestamp();
        let last = schedule.installments[11].amount.timestamp();

        // jan 31 + 1 month clamps to feb 29 in a leap year
        assert_eq!(first, Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap());
        assert_eq!(second, Utc.with_ymd_and_hms(2024, 3, 31, 9, 0, 0).unwrap());
        assert_eq!(last, Utc.with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_single_installment_takes_everything() {
        let scheduler = InstallmentScheduler::new(Rate::from_percentage(10), Rate::ZERO, 1);
        let schedule = scheduler.schedule(&idr(dec!(333.33)), start()).unwrap();
        assert_eq!(schedule.installments.len(), 1);
        assert_eq!(schedule.installments[0].amount.amount(), dec!(366.66));
    }

    #[test]
    fn test_zero_decimal_currency_sums_exactly() {
        let scheduler = InstallmentScheduler::new(Rate::from_percentage(7), Rate::from_percentage(3), 7);
        let principal = MoneyValue::new("JPY", dec!(1_000_001), start(), "");
        let schedule = scheduler.schedule(&principal, start()).unwrap();

        for installment in &schedule.installments {
            assert_eq!(installment.amount.amount().fract(), Decimal::ZERO);
        }
        assert_eq!(
            schedule.installment_total().unwrap().amount(),
            schedule.repayment_total.amount()
        );
    }

    #[test]
    fn test_borrower_payments_layout() {
        let loan_id = LoanId::generate();
        let schedule = standard().schedule(&idr(dec!(10_000_000)), start()).unwrap();
        let payments = schedule.borrower_payments(&loan_id, start());

        assert_eq!(payments.len(), 13);
        assert_eq!(payments[0].amount, dec!(-10_000_000));
        assert_eq!(payments[0].due, start());
        assert_eq!(payments[0].details, "factory expansion");
        assert_eq!(payments[1].details, format!("Payment #1 of 12 for loan [{}]", loan_id));
        assert_eq!(payments[12].details, format!("Payment #12 of 12 for loan [{}]", loan_id));
        assert!(payments[1..].iter().all(|p| p.amount > Decimal::ZERO));
    }

    #[test]
    fn test_unknown_currency_rejected() {
        let principal = MoneyValue::new("ZZZ", dec!(100), start(), "");
        assert!(matches!(
            standard().schedule(&principal, start()),
            Err(LoanError::UnknownCurrency { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn installments_sum_to_repayment_total(
                cents in 1i64..100_000_000_000i64,
                count in 1u32..=60,
                interest_bps in 0u32..=5_000,
                fee_bps in 0u32..=2_000,
            ) {
                let scheduler = InstallmentScheduler::new(
                    Rate::from_bps(interest_bps),
                    Rate::from_bps(fee_bps),
                    count,
                );
                let schedule = scheduler.schedule(&idr(Decimal::new(cents, 2)), start()).unwrap();
                prop_assert_eq!(schedule.installments.len(), count as usize);
                prop_assert_eq!(
                    schedule.installment_total().unwrap().amount(),
                    schedule.repayment_total.amount()
                );
            }
        }
    }
}
