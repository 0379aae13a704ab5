use std::path::Path;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cashflow::ResidualPolicy;
use crate::errors::Result;
use crate::interest::FineConfig;
use crate::payments::PartialPaymentStrategy;
use crate::types::CreditorId;

/// engine-wide business rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// how payments differing from the scheduled amount are treated
    pub partial_payment: PartialPaymentStrategy,
    /// what to do when commissions exceed the loan rate
    pub commission_residual: ResidualPolicy,
    /// suggested fine terms for overdue installments
    pub fine: FineConfig,
    /// account credited with the capital manager's commission
    pub manager_account: Option<CreditorId>,
}

impl EngineConfig {
    /// exact payments only, no negative commission residual, one grace day
    pub fn strict() -> Self {
        Self {
            partial_payment: PartialPaymentStrategy::RequireExact,
            commission_residual: ResidualPolicy::Reject,
            fine: FineConfig {
                late_fee_percentage: dec!(2),
                daily_interest_percentage: dec!(0.0333),
                grace_period_days: 1,
                ..FineConfig::default()
            },
            manager_account: None,
        }
    }

    pub fn with_manager_account(mut self, account: CreditorId) -> Self {
        self.manager_account = Some(account);
        self
    }

    pub fn with_partial_payment(mut self, strategy: PartialPaymentStrategy) -> Self {
        self.partial_payment = strategy;
        self
    }

    pub fn with_fine(mut self, fine: FineConfig) -> Self {
        self.fine = fine;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.fine.validate()
    }

    /// parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
