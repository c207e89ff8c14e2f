//! Transaction read model and its derived payment fields.
//!
//! A [`Transaction`] is created upstream with a fixed `total_amount` and
//! nothing paid. Its `paid_amount`, `balance_amount` and `payment_status`
//! are a projection of the settlement ledger: they change only by applying
//! a [`Reconciliation`].

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PaydeskError, Result, TransactionId, money};

/// Payment progress of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Nothing settled yet.
    Unpaid,
    /// Some, but not all, of the total has been settled.
    Partial,
    /// The full total has been settled.
    Paid,
}

impl PaymentStatus {
    /// Status as a pure function of `paid` against `total`.
    ///
    /// `paid <= 0` is unpaid, `paid >= total` is paid, anything between is
    /// partial.
    #[must_use]
    pub fn derive(paid: Decimal, total: Decimal) -> Self {
        if paid <= Decimal::ZERO {
            Self::Unpaid
        } else if paid >= total {
            Self::Paid
        } else {
            Self::Partial
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Partial => write!(f, "partial"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

/// The derived payment fields of one transaction, computed from its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Sum of all settlement amounts.
    pub paid_amount: Decimal,
    /// `total_amount - paid_amount`.
    pub balance_amount: Decimal,
    /// Status derived from paid vs total.
    pub payment_status: PaymentStatus,
}

/// The transaction read model this engine settles against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Fixed charge, rounded to currency precision. Never changes.
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    /// Time of the last applied reconciliation.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A fresh, unpaid transaction.
    ///
    /// # Errors
    /// Returns `InvalidAmount` unless `total_amount` is positive at
    /// currency precision.
    pub fn new(id: TransactionId, total_amount: Decimal) -> Result<Self> {
        let total_amount = money::normalize_amount(total_amount)?;
        let now = Utc::now();
        Ok(Self {
            id,
            total_amount,
            paid_amount: Decimal::ZERO,
            balance_amount: total_amount,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check that an upstream-supplied transaction is fresh: a positive
    /// total at currency precision, nothing paid, and the derived fields
    /// of an empty ledger.
    ///
    /// # Errors
    /// Returns `InvalidAmount` describing the first mismatch.
    pub fn ensure_unpaid(&self) -> Result<()> {
        let total = self.total_amount;
        if money::normalize_amount(total)? != total {
            return Err(PaydeskError::invalid_amount(format!(
                "total {total} of {} is not at currency precision",
                self.id
            )));
        }
        let fresh = Reconciliation {
            paid_amount: Decimal::ZERO,
            balance_amount: total,
            payment_status: PaymentStatus::Unpaid,
        };
        if self.reconciliation() != fresh {
            return Err(PaydeskError::invalid_amount(format!(
                "{} arrived with paid {}, balance {}, status {}; expected an unpaid transaction",
                self.id, self.paid_amount, self.balance_amount, self.payment_status
            )));
        }
        Ok(())
    }

    /// Overwrite the derived payment fields with a reconciliation result.
    ///
    /// Stores call this only while committing a settlement.
    pub fn apply(&mut self, reconciliation: &Reconciliation, at: DateTime<Utc>) {
        self.paid_amount = reconciliation.paid_amount;
        self.balance_amount = reconciliation.balance_amount;
        self.payment_status = reconciliation.payment_status;
        self.updated_at = at;
    }

    /// The derived fields currently stored on the transaction.
    #[must_use]
    pub fn reconciliation(&self) -> Reconciliation {
        Reconciliation {
            paid_amount: self.paid_amount,
            balance_amount: self.balance_amount,
            payment_status: self.payment_status,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}
