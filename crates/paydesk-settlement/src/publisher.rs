//! Fire-and-forget event publishing.

use paydesk_types::SettlementEvent;
use tokio::sync::broadcast;

/// Delivers settlement events to subscribers.
///
/// `publish` never fails and never blocks: settlement correctness must not
/// depend on delivery.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SettlementEvent);
}

/// Publisher backed by a tokio broadcast channel.
///
/// Subscribers that lag more than the channel capacity miss the oldest
/// events (`RecvError::Lagged`); nothing is persisted or replayed.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<SettlementEvent>,
}

impl BroadcastPublisher {
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: SettlementEvent) {
        let transaction = event.transaction_id();
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(%transaction, kind, receivers, "Event published");
            }
            Err(_) => {
                tracing::debug!(%transaction, kind, "Event dropped: no subscribers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use paydesk_types::{
        PayerId, PaymentMethod, PaymentStatus, SettlementRecord, SettlementRequest, Transaction,
        TransactionId,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn event() -> SettlementEvent {
        let tx = Transaction::new(TransactionId::new(), Decimal::new(1000, 0)).unwrap();
        let request =
            SettlementRequest::new(tx.id, Decimal::new(10, 0), PaymentMethod::Cash, PayerId::new());
        let record = SettlementRecord::from_request(&request, request.amount, Utc::now());
        SettlementEvent::settlement_created(&tx, &record)
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let publisher = BroadcastPublisher::new(4);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(event());
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let first = event();
        let second = SettlementEvent::PaymentStatusChanged {
            transaction_id: first.transaction_id(),
            from: PaymentStatus::Unpaid,
            to: PaymentStatus::Partial,
        };
        publisher.publish(first.clone());
        publisher.publish(second.clone());

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn lagging_subscriber_loses_oldest() {
        let publisher = BroadcastPublisher::new(1);
        let mut rx = publisher.subscribe();
        publisher.publish(event());
        publisher.publish(event());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
