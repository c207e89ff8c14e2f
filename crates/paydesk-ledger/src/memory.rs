//! In-memory settlement store.
//!
//! Transactions, ledgers and the duplicate index live behind one
//! `RwLock`, so a commit (append + derived-field write) is a single
//! write-locked step and readers only ever see committed state.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use paydesk_types::{
    PaydeskError, Reconciliation, Result, SettlementRecord, Transaction, TransactionId, constants,
    money,
};

use crate::dedup::DuplicateGuard;
use crate::store::{LedgerStore, SettlementStore, TransactionStore};

struct State {
    transactions: HashMap<TransactionId, Transaction>,
    /// Per-transaction ledgers in append order.
    ledgers: HashMap<TransactionId, Vec<SettlementRecord>>,
    dedup: DuplicateGuard,
}

impl State {
    /// Validate and push `record`. Every fallible check runs before the
    /// first mutation, so an error leaves the state untouched.
    fn append(&mut self, record: SettlementRecord) -> Result<()> {
        let transaction = self
            .transactions
            .get(&record.transaction_id)
            .ok_or(PaydeskError::TransactionNotFound(record.transaction_id))?;

        let ledger = self.ledgers.get(&record.transaction_id);
        let settled = money::sum(ledger.into_iter().flatten().map(|r| r.amount))?;
        let remaining = money::subtract(transaction.total_amount, settled)?;
        if record.amount > remaining {
            return Err(PaydeskError::OverpaymentRejected {
                transaction_id: record.transaction_id,
                requested: record.amount,
                remaining,
            });
        }

        let key = self.dedup.key_for(&record);
        if let Err(err) = self.dedup.check(&key) {
            tracing::warn!(
                transaction = %record.transaction_id,
                payer = %record.payer_id,
                amount = %record.amount,
                fingerprint = %key.fingerprint(),
                "Duplicate settlement rejected"
            );
            return Err(err);
        }

        self.dedup.insert(&key);
        self.ledgers
            .entry(record.transaction_id)
            .or_default()
            .push(record);
        Ok(())
    }
}

/// Thread-safe in-memory [`SettlementStore`].
///
/// Suitable for tests and single-process deployments.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Store with the default one-second dedup bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dedup_bucket(constants::DEFAULT_DEDUP_BUCKET_SECS)
    }

    /// Store with `bucket_secs`-wide dedup buckets.
    ///
    /// # Panics
    /// Panics if `bucket_secs` is not positive.
    #[must_use]
    pub fn with_dedup_bucket(bucket_secs: i64) -> Self {
        Self {
            state: RwLock::new(State {
                transactions: HashMap::new(),
                ledgers: HashMap::new(),
                dedup: DuplicateGuard::new(bucket_secs),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| PaydeskError::Internal("settlement store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| PaydeskError::Internal("settlement store lock poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for InMemoryStore {
    fn append(&self, record: SettlementRecord) -> Result<SettlementRecord> {
        let mut state = self.write()?;
        state.append(record.clone())?;
        tracing::debug!(
            transaction = %record.transaction_id,
            settlement = %record.id,
            amount = %record.amount,
            "Settlement appended"
        );
        Ok(record)
    }

    fn list(&self, transaction_id: TransactionId) -> Result<Vec<SettlementRecord>> {
        let state = self.read()?;
        Ok(state
            .ledgers
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    fn all(&self) -> Result<Vec<SettlementRecord>> {
        let state = self.read()?;
        let mut records: Vec<SettlementRecord> =
            state.ledgers.values().flatten().cloned().collect();
        records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

impl TransactionStore for InMemoryStore {
    fn insert(&self, transaction: Transaction) -> Result<()> {
        transaction.ensure_unpaid().inspect_err(|err| {
            tracing::warn!(transaction = %transaction.id, %err, "Transaction registration rejected");
        })?;
        let mut state = self.write()?;
        if state.transactions.contains_key(&transaction.id) {
            return Err(PaydeskError::DuplicateTransaction(transaction.id));
        }
        tracing::debug!(
            transaction = %transaction.id,
            total = %transaction.total_amount,
            "Transaction registered"
        );
        state.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    fn get(&self, transaction_id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.read()?;
        Ok(state.transactions.get(&transaction_id).cloned())
    }
}

impl SettlementStore for InMemoryStore {
    fn commit(
        &self,
        record: SettlementRecord,
        reconciliation: &Reconciliation,
    ) -> Result<Transaction> {
        let mut state = self.write()?;
        let transaction_id = record.transaction_id;
        let recorded_at = record.recorded_at;
        state.append(record)?;

        // `append` verified the transaction exists under this same lock.
        let transaction = state
            .transactions
            .get_mut(&transaction_id)
            .ok_or(PaydeskError::TransactionNotFound(transaction_id))?;
        transaction.apply(reconciliation, recorded_at);
        Ok(transaction.clone())
    }
}
