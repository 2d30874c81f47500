use crate::models::CellValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Where a write starts when the target date is not already in the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorFallback {
    /// First blank cell from the top, or one past the end when there is none.
    #[default]
    FirstEmptyRow,
    /// Row after the last non-blank cell, ignoring holes above it.
    AfterLastPopulated,
}

/// Zero-based row at which a block starting on `target` should be written.
///
/// A stored date equal to `target` always wins so that re-running a sync
/// overwrites rows it already wrote. Cells that are not dates never match.
pub fn resolve_anchor(column: &[CellValue], target: NaiveDate, fallback: AnchorFallback) -> usize {
    if let Some(index) = column.iter().position(|cell| cell.as_date() == Some(target)) {
        return index;
    }

    match fallback {
        AnchorFallback::FirstEmptyRow => column
            .iter()
            .position(CellValue::is_blank)
            .unwrap_or(column.len()),
        AnchorFallback::AfterLastPopulated => column
            .iter()
            .rposition(|cell| !cell.is_blank())
            .map_or(0, |index| index + 1),
    }
}

/// Newest date stored in the column, if any.
pub fn latest_date(column: &[CellValue]) -> Option<NaiveDate> {
    column.iter().filter_map(CellValue::as_date).max()
}

#[cfg(test)]
mod tests {
    use super::{latest_date, resolve_anchor, AnchorFallback};
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).expect("valid date")
    }

    #[test]
    fn empty_column_anchors_at_first_row() {
        assert_eq!(resolve_anchor(&[], day(3), AnchorFallback::FirstEmptyRow), 0);
        assert_eq!(resolve_anchor(&[], day(3), AnchorFallback::AfterLastPopulated), 0);
    }

    #[test]
    fn full_column_without_match_appends() {
        let column = vec![CellValue::Date(day(1)), CellValue::Date(day(2))];
        assert_eq!(resolve_anchor(&column, day(3), AnchorFallback::FirstEmptyRow), 2);
    }

    #[test]
    fn blank_cell_is_used_when_no_date_matches() {
        let column = vec![CellValue::Date(day(1)), CellValue::Empty, CellValue::Date(day(2))];
        assert_eq!(resolve_anchor(&column, day(9), AnchorFallback::FirstEmptyRow), 1);
        assert_eq!(resolve_anchor(&column, day(9), AnchorFallback::AfterLastPopulated), 3);
    }

    #[test]
    fn matching_date_beats_blank_rows_above_it() {
        let column = vec![
            CellValue::text("Date"),
            CellValue::text(""),
            CellValue::Date(day(1)),
            CellValue::Date(day(2)),
        ];
        assert_eq!(resolve_anchor(&column, day(2), AnchorFallback::FirstEmptyRow), 3);
    }

    #[test]
    fn non_date_values_never_match() {
        let column = vec![
            CellValue::text("2024-07-01"),
            CellValue::Number(20_240_701),
            CellValue::text("Views"),
        ];
        assert_eq!(resolve_anchor(&column, day(1), AnchorFallback::FirstEmptyRow), 3);
    }

    #[test]
    fn latest_date_ignores_other_cells() {
        let column = vec![
            CellValue::text("Date"),
            CellValue::Date(day(5)),
            CellValue::Date(day(2)),
            CellValue::Number(99),
        ];
        assert_eq!(latest_date(&column), Some(day(5)));
        assert_eq!(latest_date(&[CellValue::text("Date")]), None);
    }
}
