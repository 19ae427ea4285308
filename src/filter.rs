// 🔎 Range Filter
// Selects transactions by date range, either in a caller's time zone or in
// each transaction's own local time.
//
// Output is always ordered by the STORED transaction_date, even when the
// filter compared converted times.

use crate::db::Transaction;
use crate::error::{Result, TransactionError};
use crate::timezone::{convert_local_time, resolve_stored_zone, resolve_zone};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// DATE RANGE
// ============================================================================

/// Inclusive `[start, end]` range of naive timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// Fails when `start > end`. An equal pair is a valid single-instant range.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(TransactionError::validation(format!(
                "startDate ({}) must not be after endDate ({})",
                start, end
            )));
        }
        Ok(DateRange { start, end })
    }

    /// Whole calendar month, through the last nanosecond of its last day.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let invalid = || TransactionError::validation(format!("Invalid month {}-{:02}", year, month));

        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;

        let start = first.and_time(chrono::NaiveTime::MIN);
        let end = next_first.and_time(chrono::NaiveTime::MIN) - Duration::nanoseconds(1);

        DateRange::new(start, end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, value: &NaiveDateTime) -> bool {
        *value >= self.start && *value <= self.end
    }
}

// ============================================================================
// FILTERS
// ============================================================================

fn sort_by_stored_date(transactions: &mut [Transaction]) {
    // Stable: equal timestamps keep their input order
    transactions.sort_by(|a, b| a.transaction_date.cmp(&b.transaction_date));
}

/// Keep transactions whose local time, converted into `target_zone`, falls
/// in `range` (itself expressed in `target_zone`).
///
/// The target zone is resolved before any record is looked at, so a bad
/// zone fails even on an empty collection.
pub fn filter_in_timezone<I>(transactions: I, range: &DateRange, target_zone: &str) -> Result<Vec<Transaction>>
where
    I: IntoIterator<Item = Transaction>,
{
    let target = resolve_zone(target_zone)?;

    let mut selected = Vec::new();
    let mut examined = 0usize;

    for tx in transactions {
        examined += 1;
        let source = resolve_stored_zone(&tx.timezone)?;
        let converted = convert_local_time(tx.transaction_date, &source, &target);

        if range.contains(&converted) {
            selected.push(tx);
        }
    }

    sort_by_stored_date(&mut selected);
    debug!(examined, selected = selected.len(), target_zone, "time zone range filter");

    Ok(selected)
}

/// Zone-agnostic variant: compares the stored local time directly.
pub fn filter_in_local_time<I>(transactions: I, range: &DateRange) -> Vec<Transaction>
where
    I: IntoIterator<Item = Transaction>,
{
    let mut selected: Vec<Transaction> = transactions
        .into_iter()
        .filter(|tx| range.contains(&tx.transaction_date))
        .collect();

    sort_by_stored_date(&mut selected);
    selected
}
