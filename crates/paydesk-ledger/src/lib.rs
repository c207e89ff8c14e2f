//! # paydesk-ledger
//!
//! **Storage boundary**: the append-only settlement ledger, the transaction
//! read model, and duplicate suppression.
//!
//! ## Architecture
//!
//! 1. **LedgerStore**: append / list / sum settlement records per transaction
//! 2. **TransactionStore**: the upstream-supplied transaction read model
//! 3. **SettlementStore**: `commit` = append + derived-field write as one unit
//! 4. **DuplicateGuard**: hard uniqueness on (transaction, payer, amount, time bucket)
//!
//! ```text
//! SettlementService ─commit(record, reconciliation)─▶ SettlementStore
//!                                                    ├─ DuplicateGuard.check()
//!                                                    ├─ ledger.push(record)
//!                                                    └─ transaction.apply(reconciliation)
//! ```
//!
//! Stores never compute derived fields themselves; they persist what the
//! reconciliation engine produced.

pub mod dedup;
pub mod memory;
pub mod store;

pub use dedup::{DedupKey, DuplicateGuard, Fingerprint};
pub use memory::InMemoryStore;
pub use store::{LedgerStore, SettlementStore, TransactionStore};
