use thiserror::Error;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::types::LoanStatus;

/// error categories surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed or out-of-range input, rejected synchronously
    Validation,
    /// creditor balance below the requested disbursement
    InsufficientBalance,
    /// state changed underneath an operation, whole operation aborted
    Consistency,
    NotFound,
    Persistence,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("installment {id} is already paid")]
    InstallmentAlreadyPaid {
        id: Uuid,
    },

    #[error("installment {id} is not paid")]
    InstallmentNotPaid {
        id: Uuid,
    },

    #[error("payment amount {provided} does not satisfy scheduled amount {scheduled}")]
    PaymentMismatch {
        scheduled: Money,
        provided: Money,
    },

    #[error("loan not active: current status is {status:?}")]
    LoanNotActive {
        status: LoanStatus,
    },

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Money,
        requested: Money,
    },

    #[error("consistency violation: {message}")]
    Consistency {
        message: String,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: Uuid,
    },

    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: Uuid,
    },

    #[error("creditor not found: {id}")]
    CreditorNotFound {
        id: Uuid,
    },

    #[error("route not found: {id}")]
    RouteNotFound {
        id: Uuid,
    },

    #[error("periodicity not found: {id}")]
    PeriodicityNotFound {
        id: Uuid,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        LedgerError::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        LedgerError::Consistency {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. }
            | LedgerError::InvalidConfiguration { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidInterestRate { .. }
            | LedgerError::InstallmentAlreadyPaid { .. }
            | LedgerError::InstallmentNotPaid { .. }
            | LedgerError::PaymentMismatch { .. }
            | LedgerError::LoanNotActive { .. } => ErrorKind::Validation,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::Consistency { .. } => ErrorKind::Consistency,
            LedgerError::LoanNotFound { .. }
            | LedgerError::InstallmentNotFound { .. }
            | LedgerError::CreditorNotFound { .. }
            | LedgerError::RouteNotFound { .. }
            | LedgerError::PeriodicityNotFound { .. } => ErrorKind::NotFound,
            LedgerError::Io(_) | LedgerError::Serialization(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
