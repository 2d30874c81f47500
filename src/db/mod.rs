use crate::errors::{AppError, AppResult};
use crate::models::{CellRef, CellValue, DATE_FORMAT};
use crate::range_store::{dense_grid, RangeStore};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite-backed sheet storage. Each non-empty cell is one row in `cells`.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

impl RangeStore for Database {
    fn read_column(&self, sheet: &str, column: u32) -> AppResult<Vec<CellValue>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT row_index, kind, value FROM cells
             WHERE sheet = ?1 AND col_index = ?2
             ORDER BY row_index ASC",
        )?;
        let rows = stmt.query_map(params![sheet, column], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut values = Vec::new();
        for row in rows {
            let (row_index, kind, raw) = row?;
            let slot = (row_index - 1) as usize;
            if values.len() <= slot {
                values.resize(slot + 1, CellValue::Empty);
            }
            values[slot] = decode_cell(&kind, &raw)?;
        }
        Ok(values)
    }

    fn write_block(
        &self,
        sheet: &str,
        top_left: CellRef,
        rows: &[Vec<CellValue>],
    ) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                "INSERT INTO cells (sheet, row_index, col_index, kind, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(sheet, row_index, col_index) DO UPDATE SET
                   kind = excluded.kind, value = excluded.value, updated_at = excluded.updated_at",
            )?;
            let mut delete = tx.prepare(
                "DELETE FROM cells WHERE sheet = ?1 AND row_index = ?2 AND col_index = ?3",
            )?;

            for (row_offset, row) in rows.iter().enumerate() {
                let row_index = top_left.row + row_offset as u32;
                for (col_offset, value) in row.iter().enumerate() {
                    let col_index = top_left.column + col_offset as u32;
                    match encode_cell(value) {
                        Some((kind, raw)) => {
                            upsert.execute(params![sheet, row_index, col_index, kind, raw, now])?;
                        }
                        None => {
                            delete.execute(params![sheet, row_index, col_index])?;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_block(
        &self,
        sheet: &str,
        top_left: CellRef,
        num_rows: Option<u32>,
        num_cols: u32,
    ) -> AppResult<()> {
        if num_cols == 0 {
            return Ok(());
        }
        let last_col = top_left.column + num_cols - 1;
        let last_row = num_rows
            .map(|rows| i64::from(top_left.row) + i64::from(rows) - 1)
            .unwrap_or(i64::MAX);

        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM cells
             WHERE sheet = ?1
               AND row_index >= ?2 AND row_index <= ?3
               AND col_index >= ?4 AND col_index <= ?5",
            params![sheet, top_left.row, last_row, top_left.column, last_col],
        )?;
        Ok(())
    }

    fn read_sheet(&self, sheet: &str) -> AppResult<Vec<Vec<CellValue>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT row_index, col_index, kind, value FROM cells
             WHERE sheet = ?1
             ORDER BY row_index ASC, col_index ASC",
        )?;
        let rows = stmt.query_map(params![sheet], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut cells = Vec::new();
        for row in rows {
            let (row_index, col_index, kind, raw) = row?;
            cells.push(((row_index, col_index), decode_cell(&kind, &raw)?));
        }
        Ok(dense_grid(cells))
    }
}

fn encode_cell(value: &CellValue) -> Option<(&'static str, String)> {
    match value {
        CellValue::Empty => None,
        CellValue::Date(date) => Some(("date", date.format(DATE_FORMAT).to_string())),
        CellValue::Number(number) => Some(("number", number.to_string())),
        CellValue::Text(text) => Some(("text", text.clone())),
    }
}

fn decode_cell(kind: &str, raw: &str) -> AppResult<CellValue> {
    match kind {
        "date" => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(CellValue::Date)
            .map_err(|error| AppError::Store(format!("Malformed date cell '{}': {}", raw, error))),
        "number" => raw
            .parse::<i64>()
            .map(CellValue::Number)
            .map_err(|error| {
                AppError::Store(format!("Malformed number cell '{}': {}", raw, error))
            }),
        "text" => Ok(CellValue::Text(raw.to_string())),
        other => Err(AppError::Store(format!("Unknown cell kind: {}", other))),
    }
}
