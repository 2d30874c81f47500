use crate::models::MetricRecord;
use chrono::NaiveDate;

/// One placeholder per day from `earliest` up to, but not including, `today`.
///
/// Today is excluded because the upstream bucket for it is still filling.
pub fn fill_gaps(earliest: NaiveDate, today: NaiveDate) -> Vec<MetricRecord> {
    earliest
        .iter_days()
        .take_while(|date| *date < today)
        .map(MetricRecord::placeholder)
        .collect()
}
