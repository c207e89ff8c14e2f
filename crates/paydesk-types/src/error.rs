//! Error types for the Paydesk settlement engine.
//!
//! All errors use the `PD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Amount / input validation errors
//! - 2xx: Transaction errors
//! - 3xx: Ledger errors (overpayment, duplicates)
//! - 4xx: Concurrency errors
//! - 6xx: Reconciliation errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{PayerId, TransactionId};

/// Central error enum for all Paydesk operations.
///
/// This is the fixed vocabulary every transport layer translates from;
/// variants are never wrapped or re-typed on the way to the caller.
#[derive(Debug, Error)]
pub enum PaydeskError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Non-numeric, zero or negative amount. Raised before any storage access.
    #[error("PD_ERR_100: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Unknown payment method name.
    #[error("PD_ERR_101: Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    /// A checked decimal operation overflowed.
    #[error("PD_ERR_102: Arithmetic overflow in {op}")]
    ArithmeticOverflow { op: &'static str },

    // =================================================================
    // Transaction Errors (2xx)
    // =================================================================
    /// The transaction id is not known to the read model.
    #[error("PD_ERR_200: Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The upstream flow tried to register the same transaction twice.
    #[error("PD_ERR_201: Transaction already exists: {0}")]
    DuplicateTransaction(TransactionId),

    // =================================================================
    // Ledger Errors (3xx)
    // =================================================================
    /// The settlement would push `paid_amount` above `total_amount`.
    #[error(
        "PD_ERR_300: Overpayment rejected for {transaction_id}: requested {requested}, remaining balance is {remaining}"
    )]
    OverpaymentRejected {
        transaction_id: TransactionId,
        requested: Decimal,
        remaining: Decimal,
    },

    /// Same transaction, payer and amount already recorded in this time bucket.
    #[error(
        "PD_ERR_301: Duplicate settlement for {transaction_id}: payer {payer_id} already settled {amount} in bucket {bucket}"
    )]
    DuplicateSettlement {
        transaction_id: TransactionId,
        payer_id: PayerId,
        amount: Decimal,
        bucket: i64,
    },

    // =================================================================
    // Concurrency Errors (4xx)
    // =================================================================
    /// The per-transaction critical section was not acquired in time.
    #[error("PD_ERR_400: Settlement lock timeout for {transaction_id} after {waited_ms}ms")]
    SettlementLockTimeout {
        transaction_id: TransactionId,
        waited_ms: u64,
    },

    // =================================================================
    // Reconciliation Errors (6xx)
    // =================================================================
    /// Committed state broke a ledger invariant — a concurrency defect.
    #[error("PD_ERR_600: Reconciliation invariant violation: {reason}")]
    ReconciliationInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error (poisoned store, etc.).
    #[error("PD_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("PD_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, zero timeouts, etc.).
    #[error("PD_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl PaydeskError {
    /// Stable numeric code, matching the `PD_ERR_` prefix of the message.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } => 100,
            Self::InvalidPaymentMethod(_) => 101,
            Self::ArithmeticOverflow { .. } => 102,
            Self::TransactionNotFound(_) => 200,
            Self::DuplicateTransaction(_) => 201,
            Self::OverpaymentRejected { .. } => 300,
            Self::DuplicateSettlement { .. } => 301,
            Self::SettlementLockTimeout { .. } => 400,
            Self::ReconciliationInvariantViolation { .. } => 600,
            Self::Internal(_) => 900,
            Self::Serialization(_) => 901,
            Self::Configuration(_) => 902,
        }
    }

    /// Only lock timeouts may be retried (with backoff) by policy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SettlementLockTimeout { .. })
    }

    /// Errors that signal a defect and must alert rather than be handled.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReconciliationInvariantViolation { .. } | Self::Internal(_)
        )
    }

    pub(crate) fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PaydeskError>;

impl From<serde_json::Error> for PaydeskError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
