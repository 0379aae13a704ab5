use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};

/// late-payment fine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineConfig {
    /// one-off late fee, percent of the installment amount
    pub late_fee_percentage: Decimal,
    /// late interest per day overdue, percent of the installment amount
    pub daily_interest_percentage: Decimal,
    /// days after the due date before anything is charged
    pub grace_period_days: u32,
    /// floor applied once a fine is due
    pub minimum_fine: Money,
}

impl Default for FineConfig {
    /// 2% fee plus 1% a month pro rata
    fn default() -> Self {
        Self {
            late_fee_percentage: dec!(2),
            daily_interest_percentage: dec!(0.0333),
            grace_period_days: 0,
            minimum_fine: Money::ZERO,
        }
    }
}

impl FineConfig {
    pub fn new(late_fee_percentage: Decimal, daily_interest_percentage: Decimal) -> Self {
        Self {
            late_fee_percentage,
            daily_interest_percentage,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.late_fee_percentage < Decimal::ZERO || self.daily_interest_percentage < Decimal::ZERO {
            return Err(LedgerError::configuration("fine percentages cannot be negative"));
        }
        if self.minimum_fine.is_negative() {
            return Err(LedgerError::configuration("minimum fine cannot be negative"));
        }
        Ok(())
    }
}

/// computes suggested fines for overdue installments
pub struct FineEngine {
    pub config: FineConfig,
}

impl FineEngine {
    pub fn new(config: FineConfig) -> Self {
        Self { config }
    }

    /// fine owed on `base` after `days_overdue` days
    pub fn assess(&self, base: Money, days_overdue: u32) -> FineAssessment {
        if days_overdue == 0 || days_overdue <= self.config.grace_period_days {
            return FineAssessment {
                fine_amount: Money::ZERO,
                late_fee: Money::ZERO,
                late_interest: Money::ZERO,
                days_charged: 0,
                base,
                grace_applied: days_overdue > 0,
            };
        }

        let days_charged = days_overdue - self.config.grace_period_days;
        let late_fee = base.percentage(self.config.late_fee_percentage).round_cents();
        let late_interest = (base.percentage(self.config.daily_interest_percentage)
            * Decimal::from(days_charged))
        .round_cents();

        FineAssessment {
            fine_amount: (late_fee + late_interest).max(self.config.minimum_fine),
            late_fee,
            late_interest,
            days_charged,
            base,
            grace_applied: false,
        }
    }
}

/// fine calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineAssessment {
    pub fine_amount: Money,
    pub late_fee: Money,
    pub late_interest: Money,
    pub days_charged: u32,
    pub base: Money,
    pub grace_applied: bool,
}
