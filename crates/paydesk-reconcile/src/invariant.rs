//! Reconciliation invariant checker.
//!
//! Invariants enforced on every committed transaction:
//! ```text
//! paid_amount    == Σ(ledger amounts)
//! paid_amount    <= total_amount
//! balance_amount == total_amount - paid_amount
//! payment_status == derive(paid_amount, total_amount)
//! ```
//!
//! A violation means two writers got past the critical section together.
//! It is reported loudly and never clamped into a valid-looking state.

use std::sync::atomic::{AtomicU64, Ordering};

use paydesk_types::{
    PaydeskError, PaymentStatus, Reconciliation, Result, SettlementRecord, Transaction, money,
};
use rust_decimal::Decimal;

fn violation(reason: String) -> PaydeskError {
    PaydeskError::ReconciliationInvariantViolation { reason }
}

/// Check the derived fields of a transaction with `total_amount`.
///
/// # Errors
/// Returns [`PaydeskError::ReconciliationInvariantViolation`] if any
/// invariant other than the ledger sum fails.
pub fn verify(total_amount: Decimal, reconciliation: &Reconciliation) -> Result<()> {
    let Reconciliation {
        paid_amount,
        balance_amount,
        payment_status,
    } = *reconciliation;

    if paid_amount.is_sign_negative() && !paid_amount.is_zero() {
        return Err(violation(format!("paid_amount {paid_amount} is negative")));
    }
    if paid_amount > total_amount {
        return Err(violation(format!(
            "paid_amount {paid_amount} exceeds total_amount {total_amount}"
        )));
    }
    let expected_balance = money::subtract(total_amount, paid_amount)?;
    if balance_amount != expected_balance {
        return Err(violation(format!(
            "balance_amount {balance_amount} != total {total_amount} - paid {paid_amount}"
        )));
    }
    let expected_status = PaymentStatus::derive(paid_amount, total_amount);
    if payment_status != expected_status {
        return Err(violation(format!(
            "payment_status {payment_status} != derived {expected_status}"
        )));
    }
    Ok(())
}

/// [`verify`] plus `paid_amount == Σ(ledger)`.
pub fn verify_against_ledger(transaction: &Transaction, ledger: &[SettlementRecord]) -> Result<()> {
    verify(transaction.total_amount, &transaction.reconciliation())?;
    let ledger_sum = money::sum(ledger.iter().map(|r| r.amount))?;
    if transaction.paid_amount != ledger_sum {
        return Err(violation(format!(
            "{}: paid_amount {} != ledger sum {ledger_sum} over {} settlements",
            transaction.id,
            transaction.paid_amount,
            ledger.len()
        )));
    }
    Ok(())
}

/// Counts checked commits and violations across concurrent callers.
#[derive(Debug, Default)]
pub struct InvariantMonitor {
    checked: AtomicU64,
    violations: AtomicU64,
}

impl InvariantMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify a committed transaction against its ledger, logging any
    /// violation at error level.
    pub fn check(&self, transaction: &Transaction, ledger: &[SettlementRecord]) -> Result<()> {
        self.checked.fetch_add(1, Ordering::Relaxed);
        let outcome = verify_against_ledger(transaction, ledger);
        if let Err(err) = &outcome {
            self.violations.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                transaction = %transaction.id,
                total = %transaction.total_amount,
                paid = %transaction.paid_amount,
                error = %err,
                "Reconciliation invariant violated"
            );
        }
        outcome
    }

    /// Number of transactions checked so far.
    #[must_use]
    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Relaxed)
    }

    /// Number of violations seen so far. Anything but zero is a defect.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }
}
