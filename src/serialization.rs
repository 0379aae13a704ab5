//! serializable read models for dashboards
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::installment::Installment;
use crate::loan::{Loan, LoanSummary};
use crate::types::{
    AmortizationMethod, CreditorId, DisplayStatus, InstallmentId, LoanId, LoanStatus, RouteId,
};

/// loan with its installments as displayed on a given day
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub customer_ref: String,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub as_of: NaiveDate,
    pub terms: TermsView,
    pub parties: PartiesView,
    pub summary: LoanSummary,
    pub installments: Vec<InstallmentView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermsView {
    pub principal: Money,
    pub method: AmortizationMethod,
    pub interest_rate: Rate,
    pub installment_count: u32,
    pub installment_value: Money,
    pub total_amount: Money,
    pub total_interest: Money,
    pub periodicity: String,
    pub start_date: NaiveDate,
    pub first_due_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartiesView {
    pub creditor_id: Option<CreditorId>,
    pub route_id: Option<RouteId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub id: InstallmentId,
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub fine_amount: Money,
    pub paid_amount: Money,
    pub paid_at: Option<NaiveDate>,
    pub display_status: DisplayStatus,
    pub days_overdue: u32,
}

impl InstallmentView {
    pub fn from_installment(installment: &Installment, today: NaiveDate) -> Self {
        InstallmentView {
            id: installment.id,
            number: installment.number,
            due_date: installment.due_date,
            amount: installment.amount,
            fine_amount: installment.fine_amount,
            paid_amount: installment.paid_amount,
            paid_at: installment.paid_at,
            display_status: installment.display_status(today),
            days_overdue: installment.days_overdue(today),
        }
    }
}

impl LoanView {
    pub fn new(loan: &Loan, installments: &[&Installment], summary: LoanSummary, today: NaiveDate) -> Self {
        LoanView {
            id: loan.id,
            customer_ref: loan.customer_ref.clone(),
            status: loan.status,
            created_at: loan.created_at,
            completed_at: loan.completed_at,
            as_of: today,
            terms: TermsView {
                principal: loan.principal,
                method: loan.method,
                interest_rate: loan.interest_rate,
                installment_count: loan.installment_count,
                installment_value: loan.installment_value,
                total_amount: loan.total_amount,
                total_interest: loan.total_interest,
                periodicity: loan.periodicity.name.clone(),
                start_date: loan.start_date,
                first_due_date: loan.first_due_date,
            },
            parties: PartiesView {
                creditor_id: loan.creditor_id,
                route_id: loan.route_id,
            },
            summary,
            installments: installments
                .iter()
                .map(|i| InstallmentView::from_installment(i, today))
                .collect(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
