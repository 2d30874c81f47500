use crate::errors::{AppError, AppResult};
use crate::models::{CellRef, CellValue};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

static CELL_REF_RE: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r"^([A-Za-z]{1,3})([1-9][0-9]{0,6})$").expect("valid cell reference regex")
    });

/// Rectangular cell storage addressed by sheet name and one-based coordinates.
///
/// Implementations are used by a single sync run at a time; methods take
/// `&self` and guard their state internally.
pub trait RangeStore {
    /// Values of `column` from row 1 down to the column's last populated row.
    /// Missing cells read as [`CellValue::Empty`]; an unknown sheet reads as empty.
    fn read_column(&self, sheet: &str, column: u32) -> AppResult<Vec<CellValue>>;

    /// Writes `rows` with its first value at `top_left`.
    fn write_block(&self, sheet: &str, top_left: CellRef, rows: &[Vec<CellValue>]) -> AppResult<()>;

    /// Clears `num_cols` columns starting at `top_left`; `None` rows clears to the bottom.
    fn clear_block(
        &self,
        sheet: &str,
        top_left: CellRef,
        num_rows: Option<u32>,
        num_cols: u32,
    ) -> AppResult<()>;

    /// Whole sheet as a dense grid from `A1` to the last populated row and column.
    fn read_sheet(&self, sheet: &str) -> AppResult<Vec<Vec<CellValue>>>;
}

/// `"A"` -> 1, `"Z"` -> 26, `"AA"` -> 27.
pub fn column_to_index(letters: &str) -> AppResult<u32> {
    if letters.is_empty() {
        return Err(AppError::Config("Column letters cannot be empty".to_string()));
    }
    letters.chars().try_fold(0u32, |acc, ch| {
        if !ch.is_ascii_alphabetic() {
            return Err(AppError::Config(format!("Invalid column letters: {}", letters)));
        }
        let digit = u32::from(ch.to_ascii_uppercase()) - u32::from('A') + 1;
        acc.checked_mul(26)
            .and_then(|value| value.checked_add(digit))
            .ok_or_else(|| AppError::Config(format!("Column out of range: {}", letters)))
    })
}

/// 1 -> `"A"`, 28 -> `"AB"`. Zero has no column name and yields an empty string.
pub fn index_to_column(index: u32) -> String {
    let mut remaining = index;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        letters.push(char::from(b'A' + (remaining % 26) as u8));
        remaining /= 26;
    }
    letters.iter().rev().collect()
}

pub fn parse_cell_ref(reference: &str) -> AppResult<CellRef> {
    let caps = CELL_REF_RE
        .captures(reference.trim())
        .ok_or_else(|| AppError::Config(format!("Invalid cell reference: {}", reference)))?;
    let column = column_to_index(&caps[1])?;
    let row = caps[2]
        .parse::<u32>()
        .map_err(|error| AppError::Config(format!("Invalid row in {}: {}", reference, error)))?;
    Ok(CellRef::new(column, row))
}

pub fn a1_notation(cell: CellRef) -> String {
    format!("{}{}", index_to_column(cell.column), cell.row)
}

/// `A21:B40` style notation for logging a block.
pub fn range_notation(top_left: CellRef, num_rows: u32, num_cols: u32) -> String {
    let bottom_right = CellRef::new(
        top_left.column + num_cols.saturating_sub(1),
        top_left.row + num_rows.saturating_sub(1),
    );
    format!("{}:{}", a1_notation(top_left), a1_notation(bottom_right))
}

type SheetCells = BTreeMap<(u32, u32), CellValue>;

/// In-memory [`RangeStore`], used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryRangeStore {
    sheets: Mutex<HashMap<String, SheetCells>>,
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a sheet from a dense grid such as [`RangeStore::read_sheet`] returns.
    pub fn load_sheet(&self, sheet: &str, grid: &[Vec<CellValue>]) -> AppResult<()> {
        self.write_block(sheet, CellRef::new(1, 1), grid)
    }

    /// Sparse copy of every non-empty cell, for before/after comparisons.
    pub fn snapshot(&self) -> AppResult<BTreeMap<String, SheetCells>> {
        let sheets = self.lock()?;
        Ok(sheets
            .iter()
            .filter(|(_, cells)| !cells.is_empty())
            .map(|(name, cells)| (name.clone(), cells.clone()))
            .collect())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, SheetCells>>> {
        self.sheets
            .lock()
            .map_err(|_| AppError::Internal("range store mutex poisoned".to_string()))
    }
}

impl RangeStore for MemoryRangeStore {
    fn read_column(&self, sheet: &str, column: u32) -> AppResult<Vec<CellValue>> {
        let sheets = self.lock()?;
        let Some(cells) = sheets.get(sheet) else {
            return Ok(Vec::new());
        };
        let populated = cells
            .iter()
            .filter(|((_, col), _)| *col == column)
            .map(|((row, _), value)| (*row, value.clone()))
            .collect::<BTreeMap<_, _>>();
        let last_row = populated.keys().next_back().copied().unwrap_or(0);
        Ok((1..=last_row)
            .map(|row| populated.get(&row).cloned().unwrap_or_default())
            .collect())
    }

    fn write_block(
        &self,
        sheet: &str,
        top_left: CellRef,
        rows: &[Vec<CellValue>],
    ) -> AppResult<()> {
        let mut sheets = self.lock()?;
        let cells = sheets.entry(sheet.to_string()).or_default();
        for (row_offset, row) in rows.iter().enumerate() {
            for (col_offset, value) in row.iter().enumerate() {
                let key = (top_left.row + row_offset as u32, top_left.column + col_offset as u32);
                if value == &CellValue::Empty {
                    cells.remove(&key);
                } else {
                    cells.insert(key, value.clone());
                }
            }
        }
        Ok(())
    }

    fn clear_block(
        &self,
        sheet: &str,
        top_left: CellRef,
        num_rows: Option<u32>,
        num_cols: u32,
    ) -> AppResult<()> {
        let mut sheets = self.lock()?;
        let Some(cells) = sheets.get_mut(sheet) else {
            return Ok(());
        };
        let last_row = num_rows.map(|rows| top_left.row.saturating_add(rows).saturating_sub(1));
        let last_col = top_left.column.saturating_add(num_cols).saturating_sub(1);
        cells.retain(|(row, col), _| {
            let in_rows = *row >= top_left.row && last_row.map_or(true, |last| *row <= last);
            let in_cols = *col >= top_left.column && *col <= last_col;
            !(in_rows && in_cols)
        });
        Ok(())
    }

    fn read_sheet(&self, sheet: &str) -> AppResult<Vec<Vec<CellValue>>> {
        let sheets = self.lock()?;
        let Some(cells) = sheets.get(sheet) else {
            return Ok(Vec::new());
        };
        Ok(dense_grid(cells.iter().map(|(key, value)| (*key, value.clone()))))
    }
}

/// Expands sparse `((row, col), value)` cells into rows anchored at `A1`.
pub(crate) fn dense_grid(
    cells: impl IntoIterator<Item = ((u32, u32), CellValue)>,
) -> Vec<Vec<CellValue>> {
    let cells = cells.into_iter().collect::<Vec<_>>();
    let max_row = cells.iter().map(|((row, _), _)| *row).max().unwrap_or(0);
    let max_col = cells.iter().map(|((_, col), _)| *col).max().unwrap_or(0);
    let mut grid = vec![vec![CellValue::Empty; max_col as usize]; max_row as usize];
    for ((row, col), value) in cells {
        grid[(row - 1) as usize][(col - 1) as usize] = value;
    }
    grid
}
