pub mod book;
pub mod cashflow;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod installment;
pub mod interest;
pub mod loan;
pub mod payments;
pub mod schedule;
pub mod serialization;
pub mod state;
pub mod types;

// re-export key types
pub use book::{LoanBook, Settlement};
pub use cashflow::{
    split_commission, CashFlowEntry, CashFlowJournal, CommissionRates, CommissionSplit, Creditor,
    ResidualPolicy, Route,
};
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, LedgerError, Result};
pub use events::{Event, EventStore};
pub use installment::{FineRecord, Installment};
pub use interest::{FineAssessment, FineConfig, FineEngine};
pub use loan::{Loan, LoanRequest, LoanSummary, RenewalDraft};
pub use payments::{
    annuity_payment, AmortizationCalculator, PartialPaymentStrategy, PaymentRequest,
    ScheduledInstallment, Simulation,
};
pub use schedule::{generate_due_dates, DueDates, IntervalType, Periodicity};
pub use serialization::{InstallmentView, LoanView};
pub use state::BookState;
pub use types::{
    AmortizationMethod, CreditorId, DisplayStatus, EntryCategory, EntryDirection, EntryId,
    InstallmentId, InstallmentStatus, LoanId, LoanStatus, PeriodicityId, RouteId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
