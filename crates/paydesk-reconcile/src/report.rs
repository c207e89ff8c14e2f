//! Read-only settlement aggregation for reporting jobs.
//!
//! Sums by day and by payment method, derived from committed ledger
//! records. Nothing here feeds back into the settlement write path.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{FixedOffset, NaiveDate};
use paydesk_types::{PaymentMethod, Result, SettlementRecord, money};
use rust_decimal::Decimal;
use serde::Serialize;

/// Totals over a set of settlement records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    /// Settled amount per local calendar day.
    pub by_day: BTreeMap<NaiveDate, Decimal>,
    /// Settled amount per payment method.
    pub by_method: BTreeMap<PaymentMethod, Decimal>,
    /// Settled amount overall.
    pub total: Decimal,
    /// Number of records aggregated.
    pub count: usize,
}

impl SettlementReport {
    /// Aggregate with days cut at UTC midnight.
    pub fn from_records<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SettlementRecord>,
    {
        Self::aggregate(records, |r| r.recorded_at.date_naive())
    }

    /// Aggregate with days cut at midnight in `offset` (the shop's local time).
    pub fn from_records_at<'a, I>(records: I, offset: FixedOffset) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SettlementRecord>,
    {
        Self::aggregate(records, |r| r.recorded_at.with_timezone(&offset).date_naive())
    }

    fn aggregate<'a, I, F>(records: I, day_of: F) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SettlementRecord>,
        F: Fn(&SettlementRecord) -> NaiveDate,
    {
        let mut report = Self::default();
        for record in records {
            let day_total = report.by_day.entry(day_of(record)).or_insert(Decimal::ZERO);
            *day_total = money::add(*day_total, record.amount)?;
            let method_total = report.by_method.entry(record.method).or_insert(Decimal::ZERO);
            *method_total = money::add(*method_total, record.amount)?;
            report.total = money::add(report.total, record.amount)?;
            report.count += 1;
        }
        Ok(report)
    }

    #[must_use]
    pub fn day_total(&self, day: NaiveDate) -> Decimal {
        self.by_day.get(&day).copied().unwrap_or(Decimal::ZERO)
    }

    #[must_use]
    pub fn method_total(&self, method: PaymentMethod) -> Decimal {
        self.by_method.get(&method).copied().unwrap_or(Decimal::ZERO)
    }

    /// Plain-text rendering with amounts formatted for display.
    #[must_use]
    pub fn render(&self, symbol: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "settlements: {}", self.count);
        let _ = writeln!(out, "total: {}", money::format_currency(self.total, symbol));
        for (day, amount) in &self.by_day {
            let _ = writeln!(out, "{day}: {}", money::format_currency(*amount, symbol));
        }
        for (method, amount) in &self.by_method {
            let _ = writeln!(out, "{method}: {}", money::format_currency(*amount, symbol));
        }
        out
    }
}
