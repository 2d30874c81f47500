use crate::models::MetricRecord;
use crate::series::gaps::fill_gaps;
use chrono::NaiveDate;
use std::collections::HashMap;

/// One record per placeholder date, taking the authoritative reading when there is one.
///
/// The placeholder sequence fixes the output range and order; authoritative
/// records outside it are dropped. When the authoritative set holds two
/// readings for the same day the first is kept.
pub fn merge(authoritative: &[MetricRecord], placeholders: Vec<MetricRecord>) -> Vec<MetricRecord> {
    let mut by_date: HashMap<NaiveDate, MetricRecord> = HashMap::with_capacity(authoritative.len());
    for record in authoritative {
        by_date.entry(record.date).or_insert(*record);
    }

    placeholders
        .into_iter()
        .map(|placeholder| by_date.get(&placeholder.date).copied().unwrap_or(placeholder))
        .collect()
}

/// Contiguous series from the earliest reading (or `floor`, if earlier) to yesterday.
///
/// `floor` is the first day missing from the persisted series; passing it
/// fills the stretch between what is stored and what upstream still reports.
pub fn complete_series(
    records: &[MetricRecord],
    today: NaiveDate,
    floor: Option<NaiveDate>,
) -> Vec<MetricRecord> {
    let earliest = records.iter().map(|record| record.date).chain(floor).min();
    let Some(earliest) = earliest else {
        return Vec::new();
    };
    merge(records, fill_gaps(earliest, today))
}

#[cfg(test)]
mod tests {
    use super::{complete_series, merge};
    use crate::models::MetricRecord;
    use crate::series::gaps::fill_gaps;
    use chrono::{Days, NaiveDate};
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).expect("valid date")
    }

    fn ago(days: u64) -> NaiveDate {
        today() - Days::new(days)
    }

    #[test]
    fn authoritative_readings_replace_placeholders() {
        let authoritative = vec![MetricRecord::new(ago(5), 3, 1), MetricRecord::new(ago(3), 7, 4)];
        let merged = merge(&authoritative, fill_gaps(ago(5), today()));

        let dates = merged.iter().map(|record| record.date).collect::<Vec<_>>();
        assert_eq!(dates, (1..=5).rev().map(ago).collect::<Vec<_>>());
        let counts = merged.iter().map(|record| record.count).collect::<Vec<_>>();
        let uniques = merged.iter().map(|record| record.uniques).collect::<Vec<_>>();
        assert_eq!(counts, vec![3, 0, 7, 0, 0]);
        assert_eq!(uniques, vec![1, 0, 4, 0, 0]);
    }

    #[test]
    fn readings_outside_placeholder_range_are_dropped() {
        let authoritative = vec![
            MetricRecord::new(ago(9), 50, 5),
            MetricRecord::new(ago(2), 8, 2),
            MetricRecord::new(today(), 99, 9),
        ];
        let merged = merge(&authoritative, fill_gaps(ago(3), today()));
        assert_eq!(
            merged,
            vec![
                MetricRecord::placeholder(ago(3)),
                MetricRecord::new(ago(2), 8, 2),
                MetricRecord::placeholder(ago(1)),
            ]
        );
    }

    #[test]
    fn first_duplicate_reading_wins() {
        let authoritative = vec![MetricRecord::new(ago(1), 4, 1), MetricRecord::new(ago(1), 6, 3)];
        let merged = merge(&authoritative, fill_gaps(ago(1), today()));
        assert_eq!(merged, vec![MetricRecord::new(ago(1), 4, 1)]);
    }

    #[test]
    fn complete_series_is_contiguous_and_excludes_today() {
        let records = vec![
            MetricRecord::new(ago(2), 1, 1),
            MetricRecord::new(ago(7), 2, 1),
            MetricRecord::new(today(), 5, 5),
        ];
        let series = complete_series(&records, today(), None);

        assert_eq!(series.first().map(|record| record.date), Some(ago(7)));
        assert_eq!(series.last().map(|record| record.date), Some(ago(1)));
        for pair in series.windows(2) {
            assert_eq!(pair[1].date, pair[0].date + Days::new(1));
        }
    }

    #[test]
    fn floor_extends_series_backwards() {
        let records = vec![MetricRecord::new(ago(3), 2, 2)];
        let series = complete_series(&records, today(), Some(ago(6)));
        assert_eq!(series.len(), 6);
        assert_eq!(series[0], MetricRecord::placeholder(ago(6)));
        assert_eq!(series[3], MetricRecord::new(ago(3), 2, 2));

        let later_floor = complete_series(&records, today(), Some(ago(1)));
        assert_eq!(later_floor.len(), 3);
        assert_eq!(later_floor[0].date, ago(3));
    }

    #[test]
    fn nothing_to_complete_without_readings_or_floor() {
        assert!(complete_series(&[], today(), None).is_empty());
    }
}
