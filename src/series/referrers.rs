use crate::models::{CellValue, ReferrerEntry, ReferrerRecord};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Columns written per referrer row: date, referrer, count, uniques.
pub const REFERRER_BLOCK_WIDTH: u32 = 4;

/// Snapshot of one run's referrers, ready to be written at the run date's anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferrerBlock {
    pub date: NaiveDate,
    pub records: Vec<ReferrerRecord>,
}

impl ReferrerBlock {
    pub fn rows(&self) -> Vec<Vec<CellValue>> {
        self.records.iter().map(ReferrerRecord::to_row).collect()
    }

    pub fn width(&self) -> u32 {
        REFERRER_BLOCK_WIDTH
    }
}

/// Tags every referrer with the run date. Returns `None` when there is nothing
/// to write, in which case earlier snapshots are left alone.
///
/// Blank labels are dropped and only the first entry per label is kept, so
/// `(date, referrer)` is unique within a block.
pub fn reconcile(entries: Vec<ReferrerEntry>, run_date: NaiveDate) -> Option<ReferrerBlock> {
    let mut seen = HashSet::with_capacity(entries.len());
    let records = entries
        .into_iter()
        .filter(|entry| {
            if entry.referrer.trim().is_empty() {
                tracing::warn!(
                    count = entry.count,
                    uniques = entry.uniques,
                    "dropping referrer without a label"
                );
                return false;
            }
            if !seen.insert(entry.referrer.clone()) {
                tracing::warn!(
                    referrer = %entry.referrer,
                    count = entry.count,
                    "dropping duplicate referrer"
                );
                return false;
            }
            true
        })
        .map(|entry| ReferrerRecord {
            date: run_date,
            referrer: entry.referrer,
            count: entry.count,
            uniques: entry.uniques,
        })
        .collect::<Vec<_>>();

    if records.is_empty() {
        return None;
    }
    Some(ReferrerBlock { date: run_date, records })
}
