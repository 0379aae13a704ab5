use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{CreditorId, EntryCategory, EntryDirection, EntryId, LoanId, RouteId};

/// account whose balance funds loans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creditor {
    pub id: CreditorId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// intermediary that brings loans in; may be paid through a creditor-like account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub commission_account: Option<CreditorId>,
}

/// one append-only journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEntry {
    pub id: EntryId,
    pub creditor_id: CreditorId,
    pub loan_id: Option<LoanId>,
    pub direction: EntryDirection,
    pub category: EntryCategory,
    pub amount: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CashFlowEntry {
    pub fn new(
        creditor_id: CreditorId,
        direction: EntryDirection,
        category: EntryCategory,
        amount: Money,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            creditor_id,
            loan_id: None,
            direction,
            category,
            amount,
            description: description.into(),
            created_at,
        }
    }

    pub fn for_loan(mut self, loan_id: LoanId) -> Self {
        self.loan_id = Some(loan_id);
        self
    }

    /// amount with the sign it contributes to the balance
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            EntryDirection::Credit => self.amount,
            EntryDirection::Debit => -self.amount,
        }
    }
}

/// append-only cash-flow journal across all creditors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashFlowJournal {
    entries: Vec<CashFlowEntry>,
}

impl CashFlowJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// append an entry; entries are never edited or removed afterwards
    pub fn append(&mut self, entry: CashFlowEntry) -> Result<&CashFlowEntry> {
        if !entry.amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: entry.amount,
            });
        }
        self.entries.push(entry);
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    pub fn entries(&self) -> &[CashFlowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for(&self, creditor_id: CreditorId) -> impl Iterator<Item = &CashFlowEntry> {
        self.entries
            .iter()
            .filter(move |e| e.creditor_id == creditor_id)
    }

    pub fn entries_for_loan(&self, loan_id: LoanId) -> impl Iterator<Item = &CashFlowEntry> {
        self.entries
            .iter()
            .filter(move |e| e.loan_id == Some(loan_id))
    }

    /// sum of credits minus sum of debits, derived from the raw entries
    pub fn balance(&self, creditor_id: CreditorId) -> Money {
        self.entries_for(creditor_id).map(|e| e.signed_amount()).sum()
    }

    pub fn total(&self, creditor_id: CreditorId, direction: EntryDirection) -> Money {
        self.entries_for(creditor_id)
            .filter(|e| e.direction == direction)
            .map(|e| e.amount)
            .sum()
    }

    /// net amount posted for a loan under one category
    pub fn loan_total(&self, loan_id: LoanId, category: EntryCategory) -> Money {
        self.entries_for_loan(loan_id)
            .filter(|e| e.category == category)
            .map(|e| e.amount)
            .sum()
    }

    pub fn has_commissions(&self, loan_id: LoanId) -> bool {
        self.entries_for_loan(loan_id).any(|e| {
            matches!(
                e.category,
                EntryCategory::CommissionToCreditor
                    | EntryCategory::CommissionToIntermediary
                    | EntryCategory::CommissionToManager
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(creditor: CreditorId, direction: EntryDirection, amount: i64) -> CashFlowEntry {
        let category = match direction {
            EntryDirection::Credit => EntryCategory::Deposit,
            EntryDirection::Debit => EntryCategory::Withdrawal,
        };
        CashFlowEntry::new(
            creditor,
            direction,
            category,
            Money::from_major(amount),
            "test",
            Utc::now(),
        )
    }

    #[test]
    fn test_balance_matches_credits_minus_debits() {
        let mut journal = CashFlowJournal::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let postings = [
            (a, EntryDirection::Credit, 1_000),
            (a, EntryDirection::Debit, 250),
            (b, EntryDirection::Credit, 80),
            (a, EntryDirection::Credit, 40),
            (a, EntryDirection::Debit, 900),
            (b, EntryDirection::Debit, 10),
        ];
        for (creditor, direction, amount) in postings {
            journal.append(entry(creditor, direction, amount)).unwrap();
        }

        for creditor in [a, b] {
            let credits = journal.total(creditor, EntryDirection::Credit);
            let debits = journal.total(creditor, EntryDirection::Debit);
            assert_eq!(journal.balance(creditor), credits - debits);
        }
        // historical balances may dip below zero
        assert_eq!(journal.balance(a), Money::from_major(-110));
        assert_eq!(journal.balance(b), Money::from_major(70));
        assert_eq!(journal.len(), 6);
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let mut journal = CashFlowJournal::new();
        let creditor = Uuid::new_v4();
        assert!(journal.append(entry(creditor, EntryDirection::Credit, 0)).is_err());
        assert!(journal.append(entry(creditor, EntryDirection::Credit, -5)).is_err());
        assert!(journal.is_empty());
    }

    #[test]
    fn test_loan_totals() {
        let mut journal = CashFlowJournal::new();
        let creditor = Uuid::new_v4();
        let loan = Uuid::new_v4();

        journal
            .append(
                CashFlowEntry::new(
                    creditor,
                    EntryDirection::Debit,
                    EntryCategory::LoanDisbursement,
                    Money::from_major(600),
                    "disbursement",
                    Utc::now(),
                )
                .for_loan(loan),
            )
            .unwrap();

        assert_eq!(journal.loan_total(loan, EntryCategory::LoanDisbursement), Money::from_major(600));
        assert_eq!(journal.loan_total(loan, EntryCategory::LoanReturn), Money::ZERO);
        assert!(!journal.has_commissions(loan));
    }
}
