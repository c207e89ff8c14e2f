//! Per-transaction critical sections.
//!
//! Settlement of one transaction is serialized by a mutex keyed on its
//! [`TransactionId`]. Different transactions never share a mutex, so they
//! proceed in parallel. Acquisition is bounded by a timeout and returns a
//! guard that releases on drop, on every exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use paydesk_types::{PaydeskError, Result, TransactionId};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = Arc<StdMutex<HashMap<TransactionId, Arc<Mutex<()>>>>>;

/// Keyed async mutex over transaction ids.
///
/// Entries exist only while some task holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct TransactionLocks {
    slots: Slots,
}

impl TransactionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the critical section of `transaction_id`, waiting at most
    /// `timeout`.
    ///
    /// # Errors
    /// Returns [`PaydeskError::SettlementLockTimeout`] if the section was
    /// not acquired in time. Nothing is held in that case.
    pub async fn acquire(
        &self,
        transaction_id: TransactionId,
        timeout: Duration,
    ) -> Result<TransactionLockGuard> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(transaction_id).or_default())
        };

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(transaction = %transaction_id, "Critical section entered");
                Ok(TransactionLockGuard {
                    transaction_id,
                    guard: Some(guard),
                    slots: Arc::clone(&self.slots),
                })
            }
            Err(_) => {
                prune(&self.slots, transaction_id);
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    transaction = %transaction_id,
                    waited_ms,
                    "Settlement lock timeout"
                );
                Err(PaydeskError::SettlementLockTimeout {
                    transaction_id,
                    waited_ms,
                })
            }
        }
    }

    /// Number of transaction ids currently held or waited on.
    #[must_use]
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Drop the slot for `transaction_id` if no task references it any more.
///
/// Clones are only taken under the map lock, so a count of one here means
/// the map holds the last reference.
fn prune(slots: &Slots, transaction_id: TransactionId) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    let idle = slots
        .get(&transaction_id)
        .is_some_and(|slot| Arc::strong_count(slot) == 1);
    if idle {
        slots.remove(&transaction_id);
    }
}

/// Proof of holding a transaction's critical section. Releases on drop.
#[derive(Debug)]
pub struct TransactionLockGuard {
    transaction_id: TransactionId,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl TransactionLockGuard {
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}

impl Drop for TransactionLockGuard {
    fn drop(&mut self) {
        // Release the mutex first so our reference no longer counts.
        drop(self.guard.take());
        prune(&self.slots, self.transaction_id);
        tracing::trace!(transaction = %self.transaction_id, "Critical section released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn acquire_and_release() {
        let locks = TransactionLocks::new();
        let id = TransactionId::new();
        let guard = locks.acquire(id, WAIT).await.unwrap();
        assert_eq!(guard.transaction_id(), id);
        assert_eq!(locks.active(), 1);
        drop(guard);
        assert_eq!(locks.active(), 0);

        // Re-acquirable after release.
        assert!(locks.acquire(id, WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn held_section_times_out() {
        let locks = TransactionLocks::new();
        let id = TransactionId::new();
        let _held = locks.acquire(id, WAIT).await.unwrap();

        let err = locks.acquire(id, WAIT).await.unwrap_err();
        assert!(matches!(
            err,
            PaydeskError::SettlementLockTimeout { transaction_id, waited_ms: 50 } if transaction_id == id
        ));
        assert!(err.is_retryable());
        // The timed-out waiter left nothing behind besides the holder.
        assert_eq!(locks.active(), 1);
    }

    #[tokio::test]
    async fn different_transactions_do_not_contend() {
        let locks = TransactionLocks::new();
        let _a = locks.acquire(TransactionId::new(), WAIT).await.unwrap();
        let _b = locks.acquire(TransactionId::new(), WAIT).await.unwrap();
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn waiter_gets_section_after_release() {
        let locks = TransactionLocks::new();
        let id = TransactionId::new();
        let held = locks.acquire(id, WAIT).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(id, Duration::from_secs(5)).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn guard_released_on_error_path() {
        async fn failing(locks: &TransactionLocks, id: TransactionId) -> Result<()> {
            let _guard = locks.acquire(id, WAIT).await?;
            Err(PaydeskError::Internal("boom".into()))
        }

        let locks = TransactionLocks::new();
        let id = TransactionId::new();
        assert!(failing(&locks, id).await.is_err());
        assert_eq!(locks.active(), 0);
        assert!(locks.acquire(id, WAIT).await.is_ok());
    }
}
