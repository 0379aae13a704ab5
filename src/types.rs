use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;
/// unique identifier for an installment
pub type InstallmentId = Uuid;
/// unique identifier for a creditor account
pub type CreditorId = Uuid;
/// unique identifier for an intermediary route
pub type RouteId = Uuid;
/// unique identifier for a periodicity configuration
pub type PeriodicityId = Uuid;
/// unique identifier for a cash-flow journal entry
pub type EntryId = Uuid;

/// interest model used to build the installment schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmortizationMethod {
    /// french system, constant installment
    Price,
    /// constant amortization, declining installment
    Sac,
    /// flat interest on the principal for the whole term
    SimpleInterest,
    /// full-principal interest charged again every period
    RecurringSimpleInterest,
    /// interest every period, principal as a balloon at the end
    InterestOnly,
}

impl AmortizationMethod {
    pub const ALL: [AmortizationMethod; 5] = [
        AmortizationMethod::Price,
        AmortizationMethod::Sac,
        AmortizationMethod::SimpleInterest,
        AmortizationMethod::RecurringSimpleInterest,
        AmortizationMethod::InterestOnly,
    ];

    /// true when every installment (save rounding on the last) has the same value
    pub fn is_level(&self) -> bool {
        matches!(
            self,
            AmortizationMethod::Price
                | AmortizationMethod::SimpleInterest
                | AmortizationMethod::RecurringSimpleInterest
        )
    }
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Completed,
    Cancelled,
}

/// persisted installment status; overdue is derived from the due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Paid,
}

/// status as displayed on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Pending,
    Paid,
    Overdue,
}

/// side of a cash-flow entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryDirection {
    Credit,
    Debit,
}

/// cash-flow entry category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Deposit,
    Withdrawal,
    CommissionToIntermediary,
    CommissionToCreditor,
    CommissionToManager,
    LoanDisbursement,
    LoanReturn,
}

impl EntryCategory {
    /// direction an entry of this category normally takes
    pub fn natural_direction(&self) -> EntryDirection {
        match self {
            EntryCategory::Withdrawal | EntryCategory::LoanDisbursement => EntryDirection::Debit,
            _ => EntryDirection::Credit,
        }
    }
}
