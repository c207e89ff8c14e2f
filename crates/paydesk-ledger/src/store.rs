//! Storage ports for the settlement ledger and the transaction read model.

use paydesk_types::{
    Reconciliation, Result, SettlementRecord, Transaction, TransactionId, money,
};
use rust_decimal::Decimal;

/// Append-only, per-transaction record of settlement events.
pub trait LedgerStore: Send + Sync {
    /// Append one record to its transaction's ledger.
    ///
    /// Raw storage primitive. Atomic per transaction id. Enforces duplicate
    /// suppression and never lets the ledger sum exceed `total_amount`, but
    /// leaves the transaction's derived fields as they were. Anything that
    /// must keep the read model in step with the ledger goes through
    /// [`SettlementStore::commit`], which is the only path the settlement
    /// service writes by.
    ///
    /// # Errors
    /// `TransactionNotFound` for an unknown transaction,
    /// `OverpaymentRejected` when the record exceeds the remaining balance,
    /// `DuplicateSettlement` when the dedup key is already taken.
    fn append(&self, record: SettlementRecord) -> Result<SettlementRecord>;

    /// Committed records of one transaction in creation order.
    fn list(&self, transaction_id: TransactionId) -> Result<Vec<SettlementRecord>>;

    /// Sum of committed settlement amounts for one transaction.
    fn sum(&self, transaction_id: TransactionId) -> Result<Decimal> {
        money::sum(self.list(transaction_id)?.iter().map(|r| r.amount))
    }

    /// Every committed record, ordered by recording time. Reporting only.
    fn all(&self) -> Result<Vec<SettlementRecord>>;
}

/// The transaction read model supplied by the upstream creation flow.
pub trait TransactionStore: Send + Sync {
    /// Register a new transaction.
    ///
    /// Only fresh transactions are accepted: nothing paid, balance equal
    /// to a positive total at currency precision, status `unpaid`.
    ///
    /// # Errors
    /// `InvalidAmount` for a transaction that is not fresh,
    /// `DuplicateTransaction` if the id is already registered.
    fn insert(&self, transaction: Transaction) -> Result<()>;

    fn get(&self, transaction_id: TransactionId) -> Result<Option<Transaction>>;
}

/// A store that can commit a settlement and its reconciliation together.
pub trait SettlementStore: LedgerStore + TransactionStore {
    /// Append `record` and write `reconciliation` onto its transaction as a
    /// single all-or-nothing unit. Returns the updated transaction.
    ///
    /// Readers observe either both changes or neither. The transaction's
    /// `updated_at` takes the record's `recorded_at`.
    fn commit(
        &self,
        record: SettlementRecord,
        reconciliation: &Reconciliation,
    ) -> Result<Transaction>;
}
