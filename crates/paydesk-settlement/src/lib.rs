//! # paydesk-settlement
//!
//! **Settlement orchestration**: validation, per-transaction serialization,
//! commit, reconciliation and event emission.
//!
//! ## Architecture
//!
//! [`SettlementService::create_settlement`] runs, in order:
//! 1. Validate the amount (no storage access on failure)
//! 2. Resolve the transaction
//! 3. Provisional balance check against the committed ledger
//! 4. Acquire the transaction's critical section ([`TransactionLocks`])
//! 5. Re-check the balance inside the section
//! 6. Commit the settlement and its reconciliation as one unit
//! 7. Verify invariants on the committed state
//! 8. Publish events while still inside the section (commit order)
//!
//! Unrelated transactions never contend: there is no global lock.

pub mod clock;
pub mod lock;
pub mod publisher;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{TransactionLockGuard, TransactionLocks};
pub use publisher::{BroadcastPublisher, EventPublisher};
pub use service::{SettlementOutcome, SettlementService};
