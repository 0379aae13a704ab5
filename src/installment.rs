use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{DisplayStatus, InstallmentId, InstallmentStatus, LoanId};

/// audit record of a fine increment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineRecord {
    pub amount: Money,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// one scheduled repayment of a loan
///
/// Persisted status is two-state. Overdue is a read-time view: pending with a due date
/// before today, see [`Installment::display_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// 1-based, unique within the loan
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub fine_amount: Money,
    pub paid_amount: Money,
    pub status: InstallmentStatus,
    pub paid_at: Option<NaiveDate>,
    pub fine_history: Vec<FineRecord>,
    /// bumped on every mutation
    pub version: u32,
}

impl Installment {
    pub fn new(loan_id: LoanId, number: u32, due_date: NaiveDate, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            number,
            due_date,
            amount,
            fine_amount: Money::ZERO,
            paid_amount: Money::ZERO,
            status: InstallmentStatus::Pending,
            paid_at: None,
            fine_history: Vec::new(),
            version: 0,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InstallmentStatus::Pending && self.due_date < today
    }

    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        match self.status {
            InstallmentStatus::Paid => DisplayStatus::Paid,
            InstallmentStatus::Pending if self.due_date < today => DisplayStatus::Overdue,
            InstallmentStatus::Pending => DisplayStatus::Pending,
        }
    }

    pub fn days_overdue(&self, today: NaiveDate) -> u32 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days() as u32
        } else {
            0
        }
    }

    /// scheduled amount plus assessed fine
    pub fn amount_due(&self) -> Money {
        self.amount + self.fine_amount
    }

    /// mark paid; `fine_amount` replaces the stored fine and may not lower it
    pub fn pay(&mut self, amount: Money, fine_amount: Money, payment_date: NaiveDate) -> Result<()> {
        if self.is_paid() {
            return Err(LedgerError::InstallmentAlreadyPaid { id: self.id });
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if fine_amount < self.fine_amount {
            return Err(LedgerError::validation(format!(
                "fine {} is below the {} already assessed on installment {}",
                fine_amount, self.fine_amount, self.number
            )));
        }

        self.paid_amount = amount;
        self.fine_amount = fine_amount;
        self.status = InstallmentStatus::Paid;
        self.paid_at = Some(payment_date);
        self.version += 1;
        Ok(())
    }

    /// add `delta` to the fine of an unpaid installment
    pub fn apply_fine(&mut self, delta: Money, reason: &str, recorded_at: DateTime<Utc>) -> Result<()> {
        if self.is_paid() {
            return Err(LedgerError::InstallmentAlreadyPaid { id: self.id });
        }
        if !delta.is_positive() {
            return Err(LedgerError::InvalidAmount { amount: delta });
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::validation("a fine needs a reason"));
        }

        self.fine_amount += delta;
        self.fine_history.push(FineRecord {
            amount: delta,
            reason: reason.to_string(),
            recorded_at,
        });
        self.version += 1;
        Ok(())
    }

    /// undo a payment; the assessed fine stays
    pub fn reverse(&mut self) -> Result<()> {
        if !self.is_paid() {
            return Err(LedgerError::InstallmentNotPaid { id: self.id });
        }

        self.status = InstallmentStatus::Pending;
        self.paid_amount = Money::ZERO;
        self.paid_at = None;
        self.version += 1;
        Ok(())
    }

    /// paid-state fields agree with the status
    pub fn is_consistent(&self) -> bool {
        let paid_fields = self.paid_amount.is_positive() && self.paid_at.is_some();
        let unpaid_fields = self.paid_amount.is_zero() && self.paid_at.is_none();
        match self.status {
            InstallmentStatus::Paid => paid_fields,
            InstallmentStatus::Pending => unpaid_fields,
        }
    }
}
