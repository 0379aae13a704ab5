use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cashflow::{CashFlowJournal, Creditor, Route};
use crate::errors::{LedgerError, Result};
use crate::installment::Installment;
use crate::loan::Loan;
use crate::schedule::Periodicity;
use crate::types::{CreditorId, InstallmentId, LoanId, PeriodicityId, RouteId};

/// persisted tables of the loan book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookState {
    pub periodicities: BTreeMap<PeriodicityId, Periodicity>,
    pub routes: BTreeMap<RouteId, Route>,
    pub creditors: BTreeMap<CreditorId, Creditor>,
    pub loans: BTreeMap<LoanId, Loan>,
    pub installments: BTreeMap<InstallmentId, Installment>,
    pub journal: CashFlowJournal,
}

impl BookState {
    pub fn loan(&self, id: LoanId) -> Result<&Loan> {
        self.loans.get(&id).ok_or(LedgerError::LoanNotFound { id })
    }

    pub fn loan_mut(&mut self, id: LoanId) -> Result<&mut Loan> {
        self.loans.get_mut(&id).ok_or(LedgerError::LoanNotFound { id })
    }

    pub fn installment(&self, id: InstallmentId) -> Result<&Installment> {
        self.installments
            .get(&id)
            .ok_or(LedgerError::InstallmentNotFound { id })
    }

    pub fn installment_mut(&mut self, id: InstallmentId) -> Result<&mut Installment> {
        self.installments
            .get_mut(&id)
            .ok_or(LedgerError::InstallmentNotFound { id })
    }

    pub fn creditor(&self, id: CreditorId) -> Result<&Creditor> {
        self.creditors
            .get(&id)
            .ok_or(LedgerError::CreditorNotFound { id })
    }

    pub fn route(&self, id: RouteId) -> Result<&Route> {
        self.routes.get(&id).ok_or(LedgerError::RouteNotFound { id })
    }

    pub fn periodicity(&self, id: PeriodicityId) -> Result<&Periodicity> {
        self.periodicities
            .get(&id)
            .ok_or(LedgerError::PeriodicityNotFound { id })
    }

    /// installments of a loan ordered by number
    pub fn installments_of(&self, loan_id: LoanId) -> Vec<&Installment> {
        let mut rows: Vec<&Installment> = self
            .installments
            .values()
            .filter(|i| i.loan_id == loan_id)
            .collect();
        rows.sort_by_key(|i| i.number);
        rows
    }

    pub fn max_installment_number(&self, loan_id: LoanId) -> u32 {
        self.installments
            .values()
            .filter(|i| i.loan_id == loan_id)
            .map(|i| i.number)
            .max()
            .unwrap_or(0)
    }

    /// referential and per-row invariants
    pub fn check_integrity(&self) -> Result<()> {
        for installment in self.installments.values() {
            if !self.loans.contains_key(&installment.loan_id) {
                return Err(LedgerError::consistency(format!(
                    "installment {} references missing loan {}",
                    installment.id, installment.loan_id
                )));
            }
            if !installment.is_consistent() {
                return Err(LedgerError::consistency(format!(
                    "installment {} has paid fields disagreeing with status {:?}",
                    installment.id, installment.status
                )));
            }
        }

        for loan in self.loans.values() {
            let numbers: Vec<u32> = self.installments_of(loan.id).iter().map(|i| i.number).collect();
            if numbers.windows(2).any(|w| w[0] == w[1]) {
                return Err(LedgerError::consistency(format!(
                    "loan {} has duplicate installment numbers",
                    loan.id
                )));
            }
            if let Some(creditor_id) = loan.creditor_id {
                self.creditor(creditor_id)?;
            }
            if let Some(route_id) = loan.route_id {
                self.route(route_id)?;
            }
        }

        for entry in self.journal.entries() {
            self.creditor(entry.creditor_id)?;
        }
        Ok(())
    }
}
