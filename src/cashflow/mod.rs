pub mod commission;
pub mod journal;

pub use commission::{split_commission, CommissionRates, CommissionSplit, ResidualPolicy};
pub use journal::{CashFlowEntry, CashFlowJournal, Creditor, Route};
