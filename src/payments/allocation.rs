use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LoanConfig;
use crate::decimal::Rate;
use crate::errors::{LoanError, Result};
use crate::money::MoneyValue;
use crate::payments::schedule::add_months;
use crate::state::{LoanParty, Payment};
use crate::types::{LoanId, PartyRole, UserId};

/// what happens to offers still in the list once the principal is covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveredOfferPolicy {
    /// first come, first served: later offers are neither used nor reported as unused
    #[default]
    Drop,
    /// later offers are reported back as unused
    MarkUnused,
}

/// money offered by a lender towards a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderOffer {
    pub lender_id: UserId,
    #[serde(default)]
    pub contract: Option<String>,
    pub payment: MoneyValue,
}

/// the part of an offer consumed by the loan, with what the lender is owed back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedInvestment {
    pub lender_id: UserId,
    pub contract: Option<String>,
    pub investment: MoneyValue,
    /// negative: owed to the lender
    pub repayment: MoneyValue,
}

/// outcome of allocating offers against a principal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Allocation {
    pub used: Vec<UsedInvestment>,
    pub unused: Vec<LenderOffer>,
}

impl Allocation {
    /// new lender parties, one per used offer: investment inflow then repayment obligation
    pub fn lender_parties(&self) -> Vec<LoanParty> {
        self.used
            .iter()
            .map(|used| {
                LoanParty::new(
                    used.lender_id.clone(),
                    PartyRole::Lender,
                    vec![Payment::from_money(&used.investment), Payment::from_money(&used.repayment)],
                )
            })
            .collect()
    }

    pub fn used_total(&self, currency: &str, at: DateTime<Utc>) -> Result<MoneyValue> {
        MoneyValue::zero(currency, at).sum(self.used.iter().map(|u| &u.investment))
    }
}

/// distributes lender offers across an outstanding principal
#[derive(Debug, Clone)]
pub struct InvestmentAllocator {
    min_investment_rate: Rate,
    lender_interest_rate: Rate,
    installment_count: u32,
    policy: CoveredOfferPolicy,
}

impl InvestmentAllocator {
    pub fn new(
        min_investment_rate: Rate,
        lender_interest_rate: Rate,
        installment_count: u32,
        policy: CoveredOfferPolicy,
    ) -> Self {
        Self {
            min_investment_rate,
            lender_interest_rate,
            installment_count,
            policy,
        }
    }

    pub fn from_config(config: &LoanConfig) -> Self {
        Self::new(
            config.investment.min_investment_rate,
            config.pricing.lender_interest_rate,
            config.schedule.installment_count,
            config.investment.covered_offer_policy,
        )
    }

    /// Allocate `offers` in order against `principal`.
    ///
    /// A partial offer is accepted only when it lies within `[r * P, (1 - r) * P]`; an
    /// offer equal to or larger than what remains closes the allocation, the excess of a
    /// larger offer coming back as unused. The principal and each offer are rounded to
    /// the currency's minor unit first. Fails without a partial result on a currency
    /// mismatch or when the offers do not cover the principal.
    pub fn allocate(
        &self,
        loan_id: &LoanId,
        principal: &MoneyValue,
        offers: &[LenderOffer],
        now: DateTime<Utc>,
    ) -> Result<Allocation> {
        let principal = principal.validate()?.value;
        let bounds = principal.take(self.min_investment_rate)?;
        let (min_amount, max_amount) = (bounds.taken.amount(), bounds.remainder.amount());
        let repayment_due = add_months(now, self.installment_count)?;

        let mut allocation = Allocation::default();
        let mut remaining = principal.clone();
        let mut covered = false;

        for (index, offer) in offers.iter().enumerate() {
            if covered {
                let rest = &offers[index..];
                match self.policy {
                    CoveredOfferPolicy::Drop => {
                        warn!(loan_id = %loan_id, dropped = rest.len(), "principal covered, dropping remaining offers");
                    }
                    CoveredOfferPolicy::MarkUnused => {
                        allocation.unused.extend(rest.iter().cloned());
                    }
                }
                break;
            }

            if offer.payment.currency() != principal.currency() {
                return Err(LoanError::CurrencyMismatch {
                    expected: principal.currency().to_string(),
                    found: offer.payment.currency().to_string(),
                });
            }
            let offer = &LenderOffer {
                payment: offer.payment.validate()?.value,
                ..offer.clone()
            };

            let amount = offer.payment.amount();
            let outstanding = remaining.amount();

            if amount == outstanding {
                debug!(loan_id = %loan_id, lender = %offer.lender_id, %amount, "offer covers remaining exactly");
                allocation.used.push(self.use_offer(loan_id, offer, offer.payment.clone(), repayment_due)?);
                remaining = remaining.minus(&offer.payment)?;
                covered = true;
            } else if amount > outstanding {
                let portion = Rate::ratio(outstanding, amount)
                    .ok_or_else(|| LoanError::validation("offer amount is zero"))?;
                let split = offer.payment.take(portion)?;
                if split.taken.amount() != outstanding {
                    return Err(LoanError::validation(format!(
                        "splitting offer {} from {} took {} instead of {}",
                        amount,
                        offer.lender_id,
                        split.taken.amount(),
                        outstanding
                    )));
                }
                debug!(
                    loan_id = %loan_id,
                    lender = %offer.lender_id,
                    used = %split.taken.amount(),
                    unused = %split.remainder.amount(),
                    "offer exceeds remaining, splitting"
                );

                remaining = remaining.minus(&split.taken)?;
                allocation.used.push(self.use_offer(loan_id, offer, split.taken, repayment_due)?);
                allocation.unused.push(LenderOffer {
                    payment: split.remainder,
                    ..offer.clone()
                });
                covered = true;
            } else if amount >= min_amount && amount <= max_amount {
                debug!(loan_id = %loan_id, lender = %offer.lender_id, %amount, "partial offer accepted");
                allocation.used.push(self.use_offer(loan_id, offer, offer.payment.clone(), repayment_due)?);
                remaining = remaining.minus(&offer.payment)?;
                covered = remaining.is_zero();
            } else {
                debug!(
                    loan_id = %loan_id,
                    lender = %offer.lender_id,
                    %amount,
                    %min_amount,
                    %max_amount,
                    "offer outside accepted range"
                );
                allocation.unused.push(offer.clone());
            }
        }

        if !covered {
            return Err(LoanError::Coverage { missing: remaining });
        }

        Ok(allocation)
    }

    fn use_offer(
        &self,
        loan_id: &LoanId,
        offer: &LenderOffer,
        investment: MoneyValue,
        repayment_due: DateTime<Utc>,
    ) -> Result<UsedInvestment> {
        let interest = investment.take(self.lender_interest_rate)?.taken;
        let repayment = investment
            .sum([&interest])?
            .negate()
            .with_timestamp(repayment_due)
            .with_details(format!("Repayment for loan [{}]", loan_id));

        Ok(UsedInvestment {
            lender_id: offer.lender_id.clone(),
            contract: offer.contract.clone(),
            investment,
            repayment,
        })
    }
}
