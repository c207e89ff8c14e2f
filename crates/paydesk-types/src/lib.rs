//! # paydesk-types
//!
//! Shared types, money arithmetic, errors and configuration for the
//! **Paydesk** settlement engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TransactionId`], [`SettlementId`], [`PayerId`]
//! - **Money**: the [`money`] module, the only place currency arithmetic happens
//! - **Transaction model**: [`Transaction`], [`PaymentStatus`], [`Reconciliation`]
//! - **Settlement model**: [`SettlementRecord`], [`SettlementRequest`], [`PaymentMethod`]
//! - **Events**: [`SettlementEvent`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`PaydeskError`] with `PD_ERR_` prefix codes
//! - **Constants**: currency precision and engine defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod money;
pub mod settlement;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use paydesk_types::{Transaction, SettlementRecord, PaydeskError, ...};

pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use settlement::*;
pub use transaction::*;

// `money` and `constants` are accessed by path
// (`paydesk_types::money::add`) to keep their short names unambiguous.
