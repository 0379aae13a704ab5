use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cashflow::CommissionRates;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::payments::Simulation;
use crate::schedule::Periodicity;
use crate::types::{AmortizationMethod, CreditorId, LoanId, LoanStatus, PeriodicityId, RouteId};

/// parameters for originating a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub customer_ref: String,
    pub periodicity_id: PeriodicityId,
    pub principal: Money,
    pub method: AmortizationMethod,
    /// nominal rate per period
    pub interest_rate: Rate,
    pub installment_count: u32,
    pub start_date: NaiveDate,
    /// first candidate due date handed to the scheduler
    pub first_due_date: NaiveDate,
    #[serde(default)]
    pub creditor_id: Option<CreditorId>,
    #[serde(default)]
    pub route_id: Option<RouteId>,
    #[serde(default)]
    pub commission: CommissionRates,
    /// post the commission split right after origination
    #[serde(default)]
    pub post_commissions: bool,
}

impl LoanRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_ref: impl Into<String>,
        periodicity_id: PeriodicityId,
        principal: Money,
        method: AmortizationMethod,
        interest_rate: Rate,
        installment_count: u32,
        start_date: NaiveDate,
        first_due_date: NaiveDate,
    ) -> Self {
        Self {
            customer_ref: customer_ref.into(),
            periodicity_id,
            principal,
            method,
            interest_rate,
            installment_count,
            start_date,
            first_due_date,
            creditor_id: None,
            route_id: None,
            commission: CommissionRates::default(),
            post_commissions: false,
        }
    }

    pub fn with_creditor(mut self, creditor_id: CreditorId) -> Self {
        self.creditor_id = Some(creditor_id);
        self
    }

    pub fn with_route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    pub fn with_commission(mut self, commission: CommissionRates) -> Self {
        self.commission = commission;
        self
    }

    pub fn posting_commissions(mut self) -> Self {
        self.post_commissions = true;
        self
    }

    /// checks that do not need the book
    pub fn validate(&self) -> Result<()> {
        if self.customer_ref.trim().is_empty() {
            return Err(LedgerError::validation("customer reference is required"));
        }
        if !self.principal.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: self.principal,
            });
        }
        if self.installment_count == 0 {
            return Err(LedgerError::validation("installment count must be at least 1"));
        }
        if self.interest_rate.is_negative() {
            return Err(LedgerError::InvalidInterestRate {
                rate: self.interest_rate,
            });
        }
        if self.first_due_date < self.start_date {
            return Err(LedgerError::validation(format!(
                "first due date {} precedes start date {}",
                self.first_due_date, self.start_date
            )));
        }
        self.commission.validate()
    }
}

/// an originated loan
///
/// `total_amount` and `installment_value` are fixed at origination. Appending
/// installments later does not recompute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub customer_ref: String,
    pub creditor_id: Option<CreditorId>,
    pub route_id: Option<RouteId>,
    pub periodicity_id: PeriodicityId,
    /// copy taken at origination
    pub periodicity: Periodicity,
    pub principal: Money,
    pub method: AmortizationMethod,
    pub interest_rate: Rate,
    pub installment_count: u32,
    pub start_date: NaiveDate,
    pub first_due_date: NaiveDate,
    pub total_amount: Money,
    pub installment_value: Money,
    pub total_interest: Money,
    pub commission: CommissionRates,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn originate(
        request: &LoanRequest,
        periodicity: Periodicity,
        simulation: &Simulation,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_ref: request.customer_ref.clone(),
            creditor_id: request.creditor_id,
            route_id: request.route_id,
            periodicity_id: request.periodicity_id,
            periodicity,
            principal: request.principal,
            method: request.method,
            interest_rate: request.interest_rate,
            installment_count: request.installment_count,
            start_date: request.start_date,
            first_due_date: request.first_due_date,
            total_amount: simulation.total_amount,
            installment_value: simulation.reference_installment_value(),
            total_interest: simulation.total_interest,
            commission: request.commission,
            status: LoanStatus::Active,
            created_at,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LedgerError::LoanNotActive {
                status: self.status,
            })
        }
    }

    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = LoanStatus::Completed;
        self.completed_at = Some(at);
    }

    /// back to active after a payment on a completed loan is reversed
    pub fn reopen(&mut self) {
        self.status = LoanStatus::Active;
        self.completed_at = None;
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = LoanStatus::Cancelled;
        self.cancelled_at = Some(at);
    }

    /// prefilled parameters for a follow-up loan
    pub fn renewal_draft(&self) -> Result<RenewalDraft> {
        if self.status != LoanStatus::Completed {
            return Err(LedgerError::validation(format!(
                "loan {} must be completed before renewal, status is {:?}",
                self.id, self.status
            )));
        }

        Ok(RenewalDraft {
            source_loan_id: self.id,
            customer_ref: self.customer_ref.clone(),
            periodicity_id: self.periodicity_id,
            principal: self.principal,
            method: self.method,
            interest_rate: self.interest_rate,
            installment_count: self.installment_count,
            installment_value: self.installment_value,
            creditor_id: self.creditor_id,
            route_id: self.route_id,
            commission: self.commission,
        })
    }
}

/// loan-creation parameters copied from a completed loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalDraft {
    pub source_loan_id: LoanId,
    pub customer_ref: String,
    pub periodicity_id: PeriodicityId,
    pub principal: Money,
    pub method: AmortizationMethod,
    pub interest_rate: Rate,
    pub installment_count: u32,
    pub installment_value: Money,
    pub creditor_id: Option<CreditorId>,
    pub route_id: Option<RouteId>,
    pub commission: CommissionRates,
}

impl RenewalDraft {
    /// turn the draft into a request for a brand-new loan
    pub fn into_request(self, start_date: NaiveDate, first_due_date: NaiveDate) -> LoanRequest {
        LoanRequest {
            customer_ref: self.customer_ref,
            periodicity_id: self.periodicity_id,
            principal: self.principal,
            method: self.method,
            interest_rate: self.interest_rate,
            installment_count: self.installment_count,
            start_date,
            first_due_date,
            creditor_id: self.creditor_id,
            route_id: self.route_id,
            commission: self.commission,
            post_commissions: false,
        }
    }
}

/// aggregate figures for one loan on a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub installment_count: u32,
    pub paid_count: u32,
    pub overdue_count: u32,
    pub paid_total: Money,
    pub fines_total: Money,
    /// scheduled amount plus fines of unpaid installments
    pub outstanding: Money,
    pub next_due_date: Option<NaiveDate>,
}
