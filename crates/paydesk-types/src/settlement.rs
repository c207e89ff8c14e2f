//! Settlement records and requests.
//!
//! A [`SettlementRecord`] is the immutable ledger entry for one payment
//! event against a transaction. Records are only ever appended.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PayerId, PaydeskError, SettlementId, TransactionId};

/// How a settlement was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Wallet,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [Self; 4] = [Self::Cash, Self::Wallet, Self::Card, Self::Transfer];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Wallet => "wallet",
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaydeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PaydeskError::InvalidPaymentMethod(s.to_string()))
    }
}

/// Caller input for recording one settlement.
///
/// `amount` must already be a [`Decimal`]; raw strings are converted with
/// [`crate::money::parse_amount`] before a request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payer_id: PayerId,
    pub notes: Option<String>,
}

impl SettlementRequest {
    #[must_use]
    pub fn new(
        transaction_id: TransactionId,
        amount: Decimal,
        method: PaymentMethod,
        payer_id: PayerId,
    ) -> Self {
        Self {
            transaction_id,
            amount,
            method,
            payer_id,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// One committed settlement in a transaction's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub id: SettlementId,
    pub transaction_id: TransactionId,
    /// Positive, rounded to currency precision.
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payer_id: PayerId,
    pub recorded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl SettlementRecord {
    /// Build the record for a validated request. `amount` is the normalized
    /// request amount.
    #[must_use]
    pub fn from_request(
        request: &SettlementRequest,
        amount: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SettlementId::new(),
            transaction_id: request.transaction_id,
            amount,
            method: request.method,
            payer_id: request.payer_id,
            recorded_at,
            notes: request.notes.clone(),
        }
    }
}
