//! # paydesk-reconcile
//!
//! **Pure derivation of payment state from the settlement ledger.**
//!
//! Everything here is a function of its inputs:
//!
//! - **Zero side effects**: no store access, no locks, no events
//! - **Idempotent**: the same ledger always reconciles to the same fields
//! - **Non-recursive**: reconciliation never triggers another reconciliation
//!
//! The settlement service calls [`reconcile`] exactly once per committed
//! settlement, checks the result with [`InvariantMonitor`], and persists it.
//! [`SettlementReport`] is the read-only aggregation surface for reporting.

pub mod invariant;
pub mod reconcile;
pub mod report;

pub use invariant::{InvariantMonitor, verify, verify_against_ledger};
pub use reconcile::{reconcile, remaining_balance};
pub use report::SettlementReport;
