use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{LoanError, Result};
use crate::payments::CoveredOfferPolicy;

/// loan product configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanConfig {
    pub pricing: PricingTerms,
    pub schedule: ScheduleTerms,
    pub investment: InvestmentTerms,
}

/// rates charged to the borrower and paid to lenders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTerms {
    /// interest on the principal owed by the borrower
    pub interest_rate: Rate,
    /// service fee on the principal owed by the borrower
    pub service_fee_rate: Rate,
    /// return paid to each lender on the amount they fund
    pub lender_interest_rate: Rate,
}

/// installment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTerms {
    pub installment_count: u32,
}

/// investment acceptance rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTerms {
    /// smallest accepted partial offer as a share of principal; the largest is its complement
    pub min_investment_rate: Rate,
    #[serde(default)]
    pub covered_offer_policy: CoveredOfferPolicy,
}

impl LoanConfig {
    /// standard product: 10% interest, 5% service fee, 1% to lenders, 12 monthly installments
    pub fn standard() -> Self {
        Self {
            pricing: PricingTerms {
                interest_rate: Rate::from_percentage(10),
                service_fee_rate: Rate::from_percentage(5),
                lender_interest_rate: Rate::from_percentage(1),
            },
            schedule: ScheduleTerms {
                installment_count: 12,
            },
            investment: InvestmentTerms {
                min_investment_rate: Rate::from_percentage(5),
                covered_offer_policy: CoveredOfferPolicy::Drop,
            },
        }
    }

    /// parse and validate a json configuration
    pub fn from_json(s: &str) -> Result<Self> {
        let config: LoanConfig = serde_json::from_str(s).map_err(|e| LoanError::InvalidConfiguration {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("interest_rate", self.pricing.interest_rate),
            ("service_fee_rate", self.pricing.service_fee_rate),
            ("lender_interest_rate", self.pricing.lender_interest_rate),
            ("min_investment_rate", self.investment.min_investment_rate),
        ];
        for (name, rate) in rates {
            if !rate.is_portion() {
                return Err(LoanError::InvalidConfiguration {
                    message: format!("{} {} outside [0, 1]", name, rate),
                });
            }
        }

        if self.schedule.installment_count == 0 {
            return Err(LoanError::InvalidConfiguration {
                message: "installment_count must be at least 1".to_string(),
            });
        }

        // min bound above max bound would reject every partial offer
        if self.investment.min_investment_rate.as_decimal() > dec!(0.5) {
            return Err(LoanError::InvalidConfiguration {
                message: format!(
                    "min_investment_rate {} exceeds 50%",
                    self.investment.min_investment_rate
                ),
            });
        }

        Ok(())
    }
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_config_is_valid() {
        assert!(LoanConfig::standard().validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "pricing": {
                "interest_rate": "0.10",
                "service_fee_rate": "0.05",
                "lender_interest_rate": "0.01"
            },
            "schedule": { "installment_count": 6 },
            "investment": { "min_investment_rate": "0.05" }
        }"#;
        let config = LoanConfig::from_json(json).unwrap();
        assert_eq!(config.schedule.installment_count, 6);
        assert_eq!(config.pricing.interest_rate, Rate::from_percentage(10));
        assert_eq!(config.investment.covered_offer_policy, CoveredOfferPolicy::Drop);
    }

    #[test]
    fn test_rejects_zero_installments() {
        let mut config = LoanConfig::standard();
        config.schedule.installment_count = 0;
        assert!(matches!(config.validate(), Err(LoanError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_rates() {
        let mut config = LoanConfig::standard();
        config.pricing.service_fee_rate = Rate::from_percentage(150);
        assert!(config.validate().is_err());

        let mut config = LoanConfig::standard();
        config.investment.min_investment_rate = Rate::from_percentage(60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            LoanConfig::from_json("{"),
            Err(LoanError::InvalidConfiguration { .. })
        ));
    }
}
