//! Balance reconciliation: ledger in, derived payment fields out.

use paydesk_types::{PaymentStatus, Reconciliation, Result, SettlementRecord, money};
use rust_decimal::Decimal;

/// Derive `paid_amount`, `balance_amount` and `payment_status` for a
/// transaction of `total_amount` from its ledger.
///
/// Pure and idempotent. Does not clamp: a ledger that overpays yields a
/// negative balance, which [`crate::verify`] reports.
///
/// # Errors
/// `ArithmeticOverflow` if the ledger sum does not fit in a `Decimal`.
pub fn reconcile<'a, I>(total_amount: Decimal, ledger: I) -> Result<Reconciliation>
where
    I: IntoIterator<Item = &'a SettlementRecord>,
{
    let paid_amount = money::sum(ledger.into_iter().map(|r| r.amount))?;
    let balance_amount = money::subtract(total_amount, paid_amount)?;
    Ok(Reconciliation {
        paid_amount,
        balance_amount,
        payment_status: PaymentStatus::derive(paid_amount, total_amount),
    })
}

/// What is still owed: `total_amount - sum(ledger)`.
pub fn remaining_balance<'a, I>(total_amount: Decimal, ledger: I) -> Result<Decimal>
where
    I: IntoIterator<Item = &'a SettlementRecord>,
{
    Ok(reconcile(total_amount, ledger)?.balance_amount)
}
