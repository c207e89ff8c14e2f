//! Settlement orchestration.
//!
//! [`SettlementService`] is the only path by which settlements are created
//! and by which a transaction's derived payment fields change. Every
//! mutation of one transaction happens inside that transaction's critical
//! section, and nothing inside the section awaits, so a cancelled caller
//! either committed fully or not at all.

use std::sync::Arc;

use chrono::FixedOffset;
use paydesk_ledger::{InMemoryStore, SettlementStore};
use paydesk_reconcile::{InvariantMonitor, SettlementReport, reconcile, remaining_balance};
use paydesk_types::{
    EngineConfig, PaydeskError, PaymentStatus, Reconciliation, Result, SettlementEvent,
    SettlementRecord, SettlementRequest, Transaction, TransactionId, money,
};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::lock::TransactionLocks;
use crate::publisher::{BroadcastPublisher, EventPublisher};

/// Result of a committed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    /// Transaction snapshot as committed.
    pub transaction: Transaction,
    /// The settlement just recorded.
    pub settlement: SettlementRecord,
    /// Full ledger of the transaction, most recent first.
    pub settlements: Vec<SettlementRecord>,
}

/// Creates settlements and keeps transactions reconciled with their ledgers.
pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
    events: BroadcastPublisher,
    sinks: Vec<Arc<dyn EventPublisher>>,
    locks: TransactionLocks,
    monitor: InvariantMonitor,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl SettlementService {
    /// Service over `store` using the system clock.
    ///
    /// `store` is expected to enforce duplicate suppression with the same
    /// bucket width as `config.dedup_bucket_secs`.
    ///
    /// # Errors
    /// Returns [`PaydeskError::Configuration`] if `config` is invalid.
    pub fn new(store: Arc<dyn SettlementStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            events: BroadcastPublisher::new(config.event_channel_capacity),
            sinks: Vec::new(),
            locks: TransactionLocks::new(),
            monitor: InvariantMonitor::new(),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Service over a fresh [`InMemoryStore`] configured from `config`.
    ///
    /// # Errors
    /// Returns [`PaydeskError::Configuration`] if `config` is invalid.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(InMemoryStore::with_dedup_bucket(config.dedup_bucket_secs));
        Self::new(store, config)
    }

    /// Replace the time source used for `recorded_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Forward every event to `sink` in addition to the broadcast channel.
    #[must_use]
    pub fn with_publisher(mut self, sink: Arc<dyn EventPublisher>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn locks(&self) -> &TransactionLocks {
        &self.locks
    }

    #[must_use]
    pub fn monitor(&self) -> &InvariantMonitor {
        &self.monitor
    }

    /// Receive every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    /// Register a transaction supplied by the upstream flow.
    ///
    /// # Errors
    /// [`PaydeskError::InvalidAmount`] unless the transaction is fresh and
    /// unpaid, [`PaydeskError::DuplicateTransaction`] for a known id.
    pub fn register_transaction(&self, transaction: Transaction) -> Result<()> {
        self.store.insert(transaction)
    }

    /// Record a settlement against a transaction.
    ///
    /// # Errors
    /// - [`PaydeskError::InvalidAmount`] for a non-positive amount, before
    ///   any storage access
    /// - [`PaydeskError::TransactionNotFound`]
    /// - [`PaydeskError::OverpaymentRejected`] if the amount exceeds the
    ///   remaining balance
    /// - [`PaydeskError::SettlementLockTimeout`] (retryable)
    /// - [`PaydeskError::DuplicateSettlement`]
    /// - [`PaydeskError::ReconciliationInvariantViolation`] (fatal)
    pub async fn create_settlement(&self, request: SettlementRequest) -> Result<SettlementOutcome> {
        let transaction_id = request.transaction_id;
        let amount = money::normalize_amount(request.amount).inspect_err(|_| {
            tracing::warn!(
                transaction = %transaction_id,
                amount = %request.amount,
                "Settlement amount rejected"
            );
        })?;

        // Provisional check: cheap rejection without queueing on the lock.
        let transaction = self.require(transaction_id)?;
        let ledger = self.store.list(transaction_id)?;
        check_balance(&transaction, amount, remaining_balance(transaction.total_amount, &ledger)?)?;

        let _section = self
            .locks
            .acquire(transaction_id, self.config.lock_timeout())
            .await?;

        // No await points below this line.
        let transaction = self.require(transaction_id)?;
        let mut ledger = self.store.list(transaction_id)?;
        check_balance(&transaction, amount, remaining_balance(transaction.total_amount, &ledger)?)?;

        let record = SettlementRecord::from_request(&request, amount, self.clock.now());
        ledger.push(record.clone());
        let reconciliation = reconcile(transaction.total_amount, &ledger)?;
        let committed = self.store.commit(record.clone(), &reconciliation)?;

        let mut settlements = self.store.list(transaction_id)?;
        self.monitor.check(&committed, &settlements)?;

        tracing::info!(
            transaction = %transaction_id,
            settlement = %record.id,
            amount = %record.amount,
            method = %record.method,
            paid = %committed.paid_amount,
            balance = %committed.balance_amount,
            status = %committed.payment_status,
            "Settlement committed"
        );

        self.publish(transaction.payment_status, &committed, &record);

        settlements.reverse();
        Ok(SettlementOutcome {
            transaction: committed,
            settlement: record,
            settlements,
        })
    }

    /// Settlement history of a transaction, most recent first.
    ///
    /// # Errors
    /// Returns [`PaydeskError::TransactionNotFound`] for an unknown id.
    pub fn list_settlements(&self, transaction_id: TransactionId) -> Result<Vec<SettlementRecord>> {
        self.require(transaction_id)?;
        let mut settlements = self.store.list(transaction_id)?;
        settlements.reverse();
        Ok(settlements)
    }

    /// Current read model of a transaction.
    ///
    /// # Errors
    /// Returns [`PaydeskError::TransactionNotFound`] for an unknown id.
    pub fn transaction(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.require(transaction_id)
    }

    /// Re-derive a transaction's payment fields from its ledger and verify
    /// them against the stored read model. Writes nothing.
    ///
    /// Runs inside the critical section so the transaction and its ledger
    /// are read at the same commit point.
    ///
    /// # Errors
    /// [`PaydeskError::TransactionNotFound`],
    /// [`PaydeskError::SettlementLockTimeout`], or
    /// [`PaydeskError::ReconciliationInvariantViolation`] if the stored
    /// fields disagree with the ledger.
    pub async fn reconcile_transaction(&self, transaction_id: TransactionId) -> Result<Reconciliation> {
        let _section = self
            .locks
            .acquire(transaction_id, self.config.lock_timeout())
            .await?;

        let transaction = self.require(transaction_id)?;
        let ledger = self.store.list(transaction_id)?;
        let derived = reconcile(transaction.total_amount, &ledger)?;
        self.monitor.check(&transaction, &ledger)?;
        if derived != transaction.reconciliation() {
            tracing::error!(
                transaction = %transaction_id,
                stored = ?transaction.reconciliation(),
                derived = ?derived,
                "Stored payment fields diverge from ledger"
            );
            return Err(PaydeskError::ReconciliationInvariantViolation {
                reason: format!("stored fields of {transaction_id} diverge from ledger"),
            });
        }
        tracing::debug!(transaction = %transaction_id, paid = %derived.paid_amount, "Reconciled");
        Ok(derived)
    }

    /// Totals by UTC day and by payment method over every committed
    /// settlement.
    pub fn report(&self) -> Result<SettlementReport> {
        SettlementReport::from_records(&self.store.all()?)
    }

    /// Like [`report`](Self::report) with days taken in `offset`.
    pub fn report_at(&self, offset: FixedOffset) -> Result<SettlementReport> {
        SettlementReport::from_records_at(&self.store.all()?, offset)
    }

    fn require(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.store
            .get(transaction_id)?
            .ok_or(PaydeskError::TransactionNotFound(transaction_id))
    }

    /// Called with the critical section held, so per-transaction events go
    /// out in commit order.
    fn publish(&self, previous: PaymentStatus, committed: &Transaction, record: &SettlementRecord) {
        self.emit(&SettlementEvent::settlement_created(committed, record));
        if previous != committed.payment_status {
            self.emit(&SettlementEvent::PaymentStatusChanged {
                transaction_id: committed.id,
                from: previous,
                to: committed.payment_status,
            });
        }
    }

    fn emit(&self, event: &SettlementEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone());
        }
        self.events.publish(event.clone());
    }
}

fn check_balance(transaction: &Transaction, requested: Decimal, remaining: Decimal) -> Result<()> {
    if requested > remaining {
        tracing::warn!(
            transaction = %transaction.id,
            requested = %requested,
            remaining = %remaining,
            "Overpayment rejected"
        );
        return Err(PaydeskError::OverpaymentRejected {
            transaction_id: transaction.id,
            requested,
            remaining,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use paydesk_types::{PayerId, PaymentMethod};

    use super::*;
    use crate::clock::ManualClock;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SettlementEvent>>);

    impl EventPublisher for Recorder {
        fn publish(&self, event: SettlementEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn service() -> (SettlementService, TransactionId) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap());
        let service = SettlementService::in_memory(EngineConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock));
        let tx = Transaction::new(TransactionId::new(), Decimal::new(1000, 0)).unwrap();
        let id = tx.id;
        service.register_transaction(tx).unwrap();
        (service, id)
    }

    fn request(tx: TransactionId, amount: Decimal) -> SettlementRequest {
        SettlementRequest::new(tx, amount, PaymentMethod::Cash, PayerId::new())
    }

    #[tokio::test]
    async fn settlement_commits_and_reconciles() {
        let (service, id) = service();
        let outcome = service
            .create_settlement(request(id, Decimal::new(400, 0)))
            .await
            .unwrap();
        assert_eq!(outcome.transaction.paid_amount, Decimal::new(400, 0));
        assert_eq!(outcome.transaction.balance_amount, Decimal::new(600, 0));
        assert_eq!(outcome.transaction.payment_status, PaymentStatus::Partial);
        assert_eq!(outcome.settlements, vec![outcome.settlement.clone()]);
        assert_eq!(outcome.transaction.updated_at, outcome.settlement.recorded_at);
        assert_eq!(service.transaction(id).unwrap(), outcome.transaction);
        assert_eq!(service.monitor().checked(), 1);
        assert_eq!(service.locks().active(), 0);
    }

    #[tokio::test]
    async fn amount_is_rounded_before_recording() {
        let (service, id) = service();
        let outcome = service
            .create_settlement(request(id, Decimal::new(100_005, 3)))
            .await
            .unwrap();
        assert_eq!(outcome.settlement.amount, Decimal::new(10001, 2));
    }

    #[tokio::test]
    async fn invalid_amount_checked_before_lookup() {
        let (service, _) = service();
        let unknown = TransactionId::new();
        for amount in [Decimal::ZERO, Decimal::new(-5, 0), Decimal::new(4, 3)] {
            let err = service.create_settlement(request(unknown, amount)).await.unwrap_err();
            assert!(matches!(err, PaydeskError::InvalidAmount { .. }), "{amount}: {err}");
        }
    }

    #[tokio::test]
    async fn unknown_transaction() {
        let (service, _) = service();
        let unknown = TransactionId::new();
        let err = service
            .create_settlement(request(unknown, Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, PaydeskError::TransactionNotFound(id) if id == unknown));
        assert!(matches!(
            service.list_settlements(unknown),
            Err(PaydeskError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn overpayment_reports_remaining_balance() {
        let (service, id) = service();
        service
            .create_settlement(request(id, Decimal::new(750, 0)))
            .await
            .unwrap();
        let err = service
            .create_settlement(request(id, Decimal::new(300, 0)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("remaining balance is 250"), "{err}");
        assert_eq!(service.transaction(id).unwrap().paid_amount, Decimal::new(750, 0));
    }

    #[tokio::test]
    async fn extra_sinks_see_every_event() {
        let recorder = Arc::new(Recorder::default());
        let (service, id) = service();
        let service = service.with_publisher(recorder.clone());

        service
            .create_settlement(request(id, Decimal::new(1000, 0)))
            .await
            .unwrap();

        let events = recorder.0.lock().unwrap();
        let kinds: Vec<_> = events.iter().map(SettlementEvent::kind).collect();
        assert_eq!(kinds, vec!["settlement_created", "payment_status_changed"]);
        assert!(matches!(
            events[1],
            SettlementEvent::PaymentStatusChanged {
                from: PaymentStatus::Unpaid,
                to: PaymentStatus::Paid,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn reconcile_transaction_matches_stored_fields() {
        let (service, id) = service();
        assert_eq!(
            service.reconcile_transaction(id).await.unwrap(),
            service.transaction(id).unwrap().reconciliation()
        );
        service
            .create_settlement(request(id, Decimal::new(250, 0)))
            .await
            .unwrap();
        let derived = service.reconcile_transaction(id).await.unwrap();
        assert_eq!(derived.paid_amount, Decimal::new(250, 0));
        assert_eq!(derived, service.reconcile_transaction(id).await.unwrap());
    }

    #[tokio::test]
    async fn prepaid_registration_rejected() {
        let (service, _) = service();
        let mut tx = Transaction::new(TransactionId::new(), Decimal::new(1000, 0)).unwrap();
        tx.paid_amount = Decimal::new(1000, 0);
        tx.balance_amount = Decimal::ZERO;
        tx.payment_status = PaymentStatus::Paid;
        let id = tx.id;

        let err = service.register_transaction(tx).unwrap_err();
        assert!(matches!(err, PaydeskError::InvalidAmount { .. }), "{err}");
        assert!(matches!(
            service.transaction(id),
            Err(PaydeskError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            lock_timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            SettlementService::in_memory(config),
            Err(PaydeskError::Configuration(_))
        ));
    }
}
