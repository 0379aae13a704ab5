use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AmortizationMethod, CreditorId, EntryCategory, EntryDirection, InstallmentId, LoanId};

/// all events emitted by the loan book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // loan lifecycle
    LoanOriginated {
        loan_id: LoanId,
        principal: Money,
        total_amount: Money,
        method: AmortizationMethod,
        installment_count: u32,
        creditor_id: Option<CreditorId>,
        timestamp: DateTime<Utc>,
    },
    LoanSettled {
        loan_id: LoanId,
        installments_paid: u32,
        amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    LoanCancelled {
        loan_id: LoanId,
        installments_removed: u32,
        returned_to_creditor: Money,
        timestamp: DateTime<Utc>,
    },
    InstallmentsAppended {
        loan_id: LoanId,
        first_number: u32,
        count: u32,
        value: Money,
        timestamp: DateTime<Utc>,
    },

    // installment ledger
    InstallmentPaid {
        loan_id: LoanId,
        installment_id: InstallmentId,
        number: u32,
        amount: Money,
        fine_amount: Money,
        payment_date: NaiveDate,
    },
    FineApplied {
        loan_id: LoanId,
        installment_id: InstallmentId,
        amount: Money,
        new_total: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PaymentReversed {
        loan_id: LoanId,
        installment_id: InstallmentId,
        reversed_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // cash flow
    CashFlowPosted {
        creditor_id: CreditorId,
        loan_id: Option<LoanId>,
        direction: EntryDirection,
        category: EntryCategory,
        amount: Money,
        new_balance: Money,
    },
    CommissionsPosted {
        loan_id: LoanId,
        intermediary: Money,
        creditor: Money,
        manager: Money,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// loan the event belongs to, if any
    pub fn loan_id(&self) -> Option<LoanId> {
        match self {
            Event::LoanOriginated { loan_id, .. }
            | Event::LoanSettled { loan_id, .. }
            | Event::LoanCancelled { loan_id, .. }
            | Event::InstallmentsAppended { loan_id, .. }
            | Event::InstallmentPaid { loan_id, .. }
            | Event::FineApplied { loan_id, .. }
            | Event::PaymentReversed { loan_id, .. }
            | Event::CommissionsPosted { loan_id, .. } => Some(*loan_id),
            Event::CashFlowPosted { loan_id, .. } => *loan_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
