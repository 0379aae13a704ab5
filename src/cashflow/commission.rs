use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};

/// commission percentages agreed at origination
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CommissionRates {
    /// percent of total amount paid to the route, if one is attached
    pub intermediary_percentage: Option<Decimal>,
    /// percent of total amount paid to the creditor, if one is attached
    pub creditor_percentage: Option<Decimal>,
}

impl CommissionRates {
    pub fn new(intermediary: Option<Decimal>, creditor: Option<Decimal>) -> Self {
        Self {
            intermediary_percentage: intermediary,
            creditor_percentage: creditor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for rate in [self.intermediary_percentage, self.creditor_percentage]
            .into_iter()
            .flatten()
        {
            if rate < Decimal::ZERO {
                return Err(LedgerError::validation(format!(
                    "commission percentage {} cannot be negative",
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// what happens when intermediary and creditor shares exceed the loan rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualPolicy {
    /// manager share floored at zero
    #[default]
    Clamp,
    /// refuse the split
    Reject,
}

/// interest allocation among intermediary, creditor and capital manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub base_amount: Money,
    pub interest_percentage: Decimal,
    pub intermediary_percentage: Decimal,
    pub creditor_percentage: Decimal,
    pub manager_percentage: Decimal,
    pub intermediary_amount: Money,
    pub creditor_amount: Money,
    pub manager_amount: Money,
}

impl CommissionSplit {
    pub fn total(&self) -> Money {
        self.intermediary_amount + self.creditor_amount + self.manager_amount
    }
}

/// split `total_amount` by percentages; parties that are not attached get nothing
pub fn split_commission(
    total_amount: Money,
    interest_rate: Rate,
    rates: &CommissionRates,
    has_route: bool,
    has_creditor: bool,
    policy: ResidualPolicy,
) -> Result<CommissionSplit> {
    rates.validate()?;

    let intermediary = if has_route {
        rates.intermediary_percentage.unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };
    let creditor = if has_creditor {
        rates.creditor_percentage.unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let interest = interest_rate.as_percentage();
    let residual = interest - intermediary - creditor;
    let manager = if residual < Decimal::ZERO {
        match policy {
            ResidualPolicy::Clamp => Decimal::ZERO,
            ResidualPolicy::Reject => {
                return Err(LedgerError::validation(format!(
                    "commissions {}% + {}% exceed the loan rate of {}%",
                    intermediary.normalize(),
                    creditor.normalize(),
                    interest.normalize()
                )));
            }
        }
    } else {
        residual
    };

    Ok(CommissionSplit {
        base_amount: total_amount,
        interest_percentage: interest,
        intermediary_percentage: intermediary,
        creditor_percentage: creditor,
        manager_percentage: manager,
        intermediary_amount: total_amount.percentage(intermediary).round_cents(),
        creditor_amount: total_amount.percentage(creditor).round_cents(),
        manager_amount: total_amount.percentage(manager).round_cents(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_residual_goes_to_manager() {
        let rates = CommissionRates::new(Some(dec!(3)), Some(dec!(5)));
        let split = split_commission(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            &rates,
            true,
            true,
            ResidualPolicy::Clamp,
        )
        .unwrap();

        assert_eq!(split.manager_percentage, dec!(2));
        assert_eq!(split.intermediary_amount, Money::from_major(30));
        assert_eq!(split.creditor_amount, Money::from_major(50));
        assert_eq!(split.manager_amount, Money::from_major(20));
        assert_eq!(split.total(), Money::from_major(100));
    }

    #[test]
    fn test_absent_parties_get_nothing() {
        let rates = CommissionRates::new(Some(dec!(3)), Some(dec!(5)));
        let split = split_commission(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            &rates,
            false,
            true,
            ResidualPolicy::Clamp,
        )
        .unwrap();

        assert_eq!(split.intermediary_amount, Money::ZERO);
        assert_eq!(split.manager_percentage, dec!(5));
    }

    #[test]
    fn test_negative_residual_policies() {
        let rates = CommissionRates::new(Some(dec!(6)), Some(dec!(6)));
        let clamped = split_commission(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            &rates,
            true,
            true,
            ResidualPolicy::Clamp,
        )
        .unwrap();
        assert_eq!(clamped.manager_percentage, Decimal::ZERO);
        assert_eq!(clamped.manager_amount, Money::ZERO);

        let rejected = split_commission(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            &rates,
            true,
            true,
            ResidualPolicy::Reject,
        );
        assert!(rejected.is_err());
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let rates = CommissionRates::new(Some(dec!(-1)), None);
        assert!(split_commission(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            &rates,
            true,
            false,
            ResidualPolicy::Clamp,
        )
        .is_err());
    }
}
