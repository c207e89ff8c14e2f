//! Duplicate-settlement suppression.
//!
//! A settlement duplicates another when both hit the same transaction, from
//! the same payer, for the same amount, within the same recording bucket
//! (one second by default). The guard is a unique index keyed by the
//! SHA-256 fingerprint of those four parts. Collisions are rejected with
//! [`PaydeskError::DuplicateSettlement`]; nothing is merged.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use paydesk_types::{PayerId, PaydeskError, Result, SettlementRecord, TransactionId};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// The parts that make two settlements "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub transaction_id: TransactionId,
    pub payer_id: PayerId,
    /// Normalized so that `400` and `400.00` collide.
    pub amount: Decimal,
    /// Start of the recording bucket, seconds since the UNIX epoch.
    pub bucket: i64,
}

impl DedupKey {
    /// Key for `record` with buckets `bucket_secs` wide.
    #[must_use]
    pub fn for_record(record: &SettlementRecord, bucket_secs: i64) -> Self {
        Self {
            transaction_id: record.transaction_id,
            payer_id: record.payer_id,
            amount: record.amount.normalize(),
            bucket: bucket_start(record.recorded_at, bucket_secs),
        }
    }

    /// `SHA-256(domain_sep || transaction || payer || amount || bucket)`.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(b"paydesk:dedup:v1:");
        hasher.update(self.transaction_id.0.as_bytes());
        hasher.update(self.payer_id.0.as_bytes());
        hasher.update(self.amount.to_string().as_bytes());
        hasher.update(self.bucket.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Fingerprint(out)
    }
}

/// Unique-index entry for a [`DedupKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

fn bucket_start(at: DateTime<Utc>, bucket_secs: i64) -> i64 {
    let ts = at.timestamp();
    ts - ts.rem_euclid(bucket_secs)
}

/// Unique index over settlement fingerprints.
///
/// Entries are never evicted: an old bucket can no longer collide with new
/// settlements, so the index grows with the ledger and no faster.
#[derive(Debug)]
pub struct DuplicateGuard {
    /// Fingerprints of every committed settlement.
    seen: HashSet<Fingerprint>,
    /// Recording bucket width in seconds.
    bucket_secs: i64,
}

impl DuplicateGuard {
    /// Create a guard with `bucket_secs`-wide recording buckets.
    ///
    /// # Panics
    /// Panics if `bucket_secs` is not positive.
    #[must_use]
    pub fn new(bucket_secs: i64) -> Self {
        assert!(bucket_secs > 0, "DuplicateGuard bucket_secs must be > 0");
        Self {
            seen: HashSet::new(),
            bucket_secs,
        }
    }

    #[must_use]
    pub fn key_for(&self, record: &SettlementRecord) -> DedupKey {
        DedupKey::for_record(record, self.bucket_secs)
    }

    /// Fail if `key` is already taken. Does not reserve it.
    ///
    /// # Errors
    /// Returns [`PaydeskError::DuplicateSettlement`] on collision.
    pub fn check(&self, key: &DedupKey) -> Result<()> {
        if self.seen.contains(&key.fingerprint()) {
            return Err(PaydeskError::DuplicateSettlement {
                transaction_id: key.transaction_id,
                payer_id: key.payer_id,
                amount: key.amount,
                bucket: key.bucket,
            });
        }
        Ok(())
    }

    /// Reserve `key`. Call only after [`check`](Self::check) passed and the
    /// record was written.
    pub fn insert(&mut self, key: &DedupKey) {
        self.seen.insert(key.fingerprint());
    }
}
