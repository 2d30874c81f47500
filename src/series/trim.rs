use crate::models::{MetricRecord, DATE_FORMAT};
use chrono::{Days, NaiveDate};

/// GitHub under-reports the oldest days of its 14-day traffic window.
pub const DEFAULT_RETENTION_DAYS: u32 = 10;

/// Keeps the `retention_days` most recent days of a window, today included.
///
/// A record survives when its date is after `today - retention_days`; the
/// days dropped here are picked up by a later run once they are no longer at
/// the old edge of the window.
pub fn trim(
    records: Vec<MetricRecord>,
    today: NaiveDate,
    retention_days: u32,
) -> Vec<MetricRecord> {
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN);

    records
        .into_iter()
        .filter(|record| {
            let retained = record.date > cutoff;
            if !retained {
                tracing::info!(
                    date = %record.date.format(DATE_FORMAT),
                    count = record.count,
                    uniques = record.uniques,
                    "dropping record from unreliable edge of traffic window"
                );
            }
            retained
        })
        .collect()
}
