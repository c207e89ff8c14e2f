//! Shared fixtures for the settlement integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use paydesk_settlement::{ManualClock, SettlementService};
use paydesk_types::{
    EngineConfig, PayerId, PaymentMethod, SettlementRequest, Transaction, TransactionId,
};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary. `RUST_LOG`
/// controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn dec(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

pub struct Harness {
    pub service: Arc<SettlementService>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(start()));
        let service = SettlementService::in_memory(config)
            .unwrap()
            .with_clock(clock.clone());
        Self {
            service: Arc::new(service),
            clock,
        }
    }

    /// Register an unpaid transaction of `total` units.
    pub fn open(&self, total: i64) -> TransactionId {
        let tx = Transaction::new(TransactionId::new(), dec(total)).unwrap();
        let id = tx.id;
        self.service.register_transaction(tx).unwrap();
        id
    }
}

pub fn request(
    transaction_id: TransactionId,
    amount: i64,
    method: PaymentMethod,
) -> SettlementRequest {
    SettlementRequest::new(transaction_id, dec(amount), method, PayerId::new())
}
