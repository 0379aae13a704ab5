pub mod amortization;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::InstallmentId;

pub use amortization::{annuity_payment, AmortizationCalculator, ScheduledInstallment, Simulation};

/// request to mark an installment as paid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub installment_id: InstallmentId,
    pub amount: Money,
    /// full fine figure to store, not an increment
    pub fine_amount: Money,
    pub payment_date: NaiveDate,
    /// optimistic concurrency check against the installment's version
    #[serde(default)]
    pub expected_version: Option<u32>,
}

impl PaymentRequest {
    pub fn new(installment_id: InstallmentId, amount: Money, payment_date: NaiveDate) -> Self {
        Self {
            installment_id,
            amount,
            fine_amount: Money::ZERO,
            payment_date,
            expected_version: None,
        }
    }

    pub fn with_fine(mut self, fine_amount: Money) -> Self {
        self.fine_amount = fine_amount;
        self
    }

    pub fn expecting_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// how a payment that differs from the scheduled amount is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPaymentStrategy {
    /// record any positive amount as the paid figure
    #[default]
    ApplyAsIs,
    /// reject amounts below the scheduled amount
    RejectShortfall,
    /// accept only the scheduled amount
    RequireExact,
}

impl PartialPaymentStrategy {
    /// check a payment amount against the scheduled amount
    pub fn validate(&self, scheduled: Money, provided: Money) -> Result<()> {
        if !provided.is_positive() {
            return Err(LedgerError::InvalidAmount { amount: provided });
        }

        let acceptable = match self {
            PartialPaymentStrategy::ApplyAsIs => true,
            PartialPaymentStrategy::RejectShortfall => provided >= scheduled,
            PartialPaymentStrategy::RequireExact => provided == scheduled,
        };

        if acceptable {
            Ok(())
        } else {
            Err(LedgerError::PaymentMismatch { scheduled, provided })
        }
    }
}
