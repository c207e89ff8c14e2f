//! Events emitted to live dashboards and status displays.
//!
//! Events are fire-and-forget notifications of committed state. They are
//! never the source of truth: a lost event never affects settlement state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PaymentStatus, Result, SettlementRecord, Transaction, TransactionId};

/// A settlement-side state change, tagged by `event` when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// A settlement was committed and the transaction re-derived.
    SettlementCreated {
        transaction_id: TransactionId,
        payment_status: PaymentStatus,
        paid_amount: Decimal,
        balance_amount: Decimal,
        total_amount: Decimal,
        settlement: SettlementRecord,
    },
    /// The committed settlement moved the transaction to a new status.
    PaymentStatusChanged {
        transaction_id: TransactionId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl SettlementEvent {
    /// Snapshot event for a freshly committed settlement.
    #[must_use]
    pub fn settlement_created(transaction: &Transaction, settlement: &SettlementRecord) -> Self {
        Self::SettlementCreated {
            transaction_id: transaction.id,
            payment_status: transaction.payment_status,
            paid_amount: transaction.paid_amount,
            balance_amount: transaction.balance_amount,
            total_amount: transaction.total_amount,
            settlement: settlement.clone(),
        }
    }

    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Self::SettlementCreated { transaction_id, .. }
            | Self::PaymentStatusChanged { transaction_id, .. } => *transaction_id,
        }
    }

    /// Wire name of the event, identical to the serialized `event` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SettlementCreated { .. } => "settlement_created",
            Self::PaymentStatusChanged { .. } => "payment_status_changed",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{PayerId, PaymentMethod, SettlementRequest};

    fn committed() -> (Transaction, SettlementRecord) {
        let mut tx = Transaction::new(TransactionId::new(), Decimal::new(1000, 0)).unwrap();
        let request = SettlementRequest::new(
            tx.id,
            Decimal::new(400, 0),
            PaymentMethod::Cash,
            PayerId::new(),
        );
        let record = SettlementRecord::from_request(&request, request.amount, Utc::now());
        tx.paid_amount = Decimal::new(400, 0);
        tx.balance_amount = Decimal::new(600, 0);
        tx.payment_status = PaymentStatus::Partial;
        (tx, record)
    }

    #[test]
    fn settlement_created_snapshot() {
        let (tx, record) = committed();
        let event = SettlementEvent::settlement_created(&tx, &record);
        assert_eq!(event.transaction_id(), tx.id);
        assert_eq!(event.kind(), "settlement_created");
        match event {
            SettlementEvent::SettlementCreated {
                payment_status,
                paid_amount,
                balance_amount,
                settlement,
                ..
            } => {
                assert_eq!(payment_status, PaymentStatus::Partial);
                assert_eq!(paid_amount, Decimal::new(400, 0));
                assert_eq!(balance_amount, Decimal::new(600, 0));
                assert_eq!(settlement, record);
            }
            SettlementEvent::PaymentStatusChanged { .. } => panic!("wrong variant"),
        }
    }

    #[test]
    fn json_carries_event_tag() {
        let (tx, record) = committed();
        let json = SettlementEvent::settlement_created(&tx, &record).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "settlement_created");
        assert_eq!(value["payment_status"], "partial");
        assert_eq!(value["paid_amount"], "400");

        let changed = SettlementEvent::PaymentStatusChanged {
            transaction_id: tx.id,
            from: PaymentStatus::Unpaid,
            to: PaymentStatus::Partial,
        };
        let value: serde_json::Value = serde_json::from_str(&changed.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], changed.kind());
        assert_eq!(value["from"], "unpaid");
    }
}
