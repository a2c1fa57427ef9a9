use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::a1::GridRange;
use super::sheets::{
    CellUpdate, MajorDimension, SheetsError, SheetsGateway, ValueGrid, ValueRender, Worksheet,
};
use super::{cell_text, is_blank};

const DEFAULT_ROWS: u32 = 1000;
const DEFAULT_COLUMNS: u32 = 26;

/// Spreadsheet held in memory. Backs demo mode and the store tests.
///
/// Reads trim trailing blank cells and rows the way the Sheets API does, and
/// writes outside the grid are rejected until the sheet is grown.
#[derive(Debug, Default)]
pub struct InMemorySheets {
    sheets: Mutex<Vec<MemorySheet>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_resize: AtomicBool,
}

#[derive(Debug, Clone)]
struct MemorySheet {
    sheet_id: i32,
    title: String,
    rows: Vec<Vec<Value>>,
    row_count: u32,
    column_count: u32,
}

impl MemorySheet {
    fn worksheet(&self) -> Worksheet {
        Worksheet {
            sheet_id: self.sheet_id,
            title: self.title.clone(),
            row_count: self.row_count,
            column_count: self.column_count,
        }
    }

    fn used_rows(&self) -> usize {
        self.rows
            .iter()
            .rposition(|row| row.iter().any(|value| !is_blank(value)))
            .map_or(0, |idx| idx + 1)
    }

    fn write(&mut self, row: u32, column: u32, value: Value) {
        let (row, column) = (row as usize - 1, column as usize - 1);
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, Value::String(String::new()));
        }
        cells[column] = value;
    }
}

impl InMemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tab whose first row holds `header`.
    pub fn with_sheet(self, title: &str, header: &[&str]) -> Self {
        self.add_sheet(title, header);
        self
    }

    pub fn add_sheet(&self, title: &str, header: &[&str]) {
        let mut sheets = self.lock();
        let sheet_id = i32::try_from(sheets.len()).unwrap_or(i32::MAX);
        let header: Vec<Value> = header.iter().map(|name| Value::from(*name)).collect();
        let column_count = DEFAULT_COLUMNS.max(header.len() as u32);
        let rows = if header.is_empty() { Vec::new() } else { vec![header] };
        sheets.push(MemorySheet {
            sheet_id,
            title: title.to_string(),
            rows,
            row_count: DEFAULT_ROWS,
            column_count,
        });
    }

    /// Appends a row without counting it as an API call.
    pub fn seed_row(&self, title: &str, row: Vec<Value>) {
        let mut sheets = self.lock();
        if let Some(sheet) = sheets.iter_mut().find(|sheet| sheet.title == title) {
            let position = sheet.used_rows();
            sheet.rows.truncate(position);
            sheet.rows.push(row);
            sheet.row_count = sheet.row_count.max(sheet.rows.len() as u32);
        }
    }

    pub fn set_grid_size(&self, title: &str, rows: u32, columns: u32) {
        let mut sheets = self.lock();
        if let Some(sheet) = sheets.iter_mut().find(|sheet| sheet.title == title) {
            sheet.row_count = rows;
            sheet.column_count = columns;
        }
    }

    pub fn rows(&self, title: &str) -> Vec<Vec<Value>> {
        self.lock()
            .iter()
            .find(|sheet| sheet.title == title)
            .map(|sheet| sheet.rows[..sheet.used_rows()].to_vec())
            .unwrap_or_default()
    }

    pub fn grid_size(&self, title: &str) -> Option<(u32, u32)> {
        self.lock()
            .iter()
            .find(|sheet| sheet.title == title)
            .map(|sheet| (sheet.row_count, sheet.column_count))
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_resize(&self, fail: bool) {
        self.fail_resize.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MemorySheet>> {
        self.sheets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), SheetsError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SheetsError::Backend("write rejected".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn locate<'a>(
    sheets: &'a [MemorySheet],
    range: &GridRange,
    raw: &str,
) -> Result<(usize, &'a MemorySheet), SheetsError> {
    let found = match &range.sheet {
        Some(title) => sheets
            .iter()
            .enumerate()
            .find(|(_, sheet)| &sheet.title == title),
        // Unqualified ranges land on the first tab.
        None => sheets.iter().enumerate().next(),
    };
    found.ok_or_else(|| {
        SheetsError::WorksheetNotFound(range.sheet.clone().unwrap_or_else(|| raw.to_string()))
    })
}

fn extract(
    sheet: &MemorySheet,
    range: &GridRange,
    major: MajorDimension,
    render: ValueRender,
) -> ValueGrid {
    let height = sheet.used_rows() as u32;
    let width = sheet.rows.iter().map(Vec::len).max().unwrap_or(0) as u32;

    let row_start = range.start_row.unwrap_or(1).max(1);
    let row_end = range.end_row.unwrap_or(height).min(height);
    let column_start = range.start_column.unwrap_or(1).max(1);
    let column_end = range.end_column.unwrap_or(width).min(width);

    let rendered = |row: u32, column: u32| {
        let value = sheet
            .rows
            .get(row as usize - 1)
            .and_then(|cells| cells.get(column as usize - 1))
            .cloned()
            .unwrap_or(Value::Null);
        match (render, value) {
            (_, Value::Null) => Value::String(String::new()),
            (ValueRender::Unformatted, value) => value,
            (ValueRender::Formatted, value) => Value::String(cell_text(&value)),
        }
    };

    let mut grid: ValueGrid = match major {
        MajorDimension::Rows => (row_start..=row_end)
            .map(|row| {
                (column_start..=column_end)
                    .map(|column| rendered(row, column))
                    .collect()
            })
            .collect(),
        MajorDimension::Columns => (column_start..=column_end)
            .map(|column| (row_start..=row_end).map(|row| rendered(row, column)).collect())
            .collect(),
    };

    for line in &mut grid {
        while line.last().is_some_and(is_blank) {
            line.pop();
        }
    }
    while grid.last().is_some_and(Vec::is_empty) {
        grid.pop();
    }
    grid
}

impl SheetsGateway for InMemorySheets {
    fn worksheet(&self, title: &str) -> Result<Worksheet, SheetsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .iter()
            .find(|sheet| sheet.title == title)
            .map(MemorySheet::worksheet)
            .ok_or_else(|| SheetsError::WorksheetNotFound(title.to_string()))
    }

    fn read_ranges(
        &self,
        ranges: &[String],
        major: MajorDimension,
        render: ValueRender,
    ) -> Result<Vec<ValueGrid>, SheetsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let sheets = self.lock();
        ranges
            .iter()
            .map(|raw| {
                let range = GridRange::parse(raw)?;
                let (_, sheet) = locate(&sheets, &range, raw)?;
                Ok(extract(sheet, &range, major, render))
            })
            .collect()
    }

    fn append_row(&self, sheet_title: &str, row: Vec<Value>) -> Result<(), SheetsError> {
        self.check_writable()?;
        let mut sheets = self.lock();
        let sheet = sheets
            .iter_mut()
            .find(|sheet| sheet.title == sheet_title)
            .ok_or_else(|| SheetsError::WorksheetNotFound(sheet_title.to_string()))?;

        let position = sheet.used_rows();
        sheet.rows.truncate(position);
        sheet.column_count = sheet.column_count.max(row.len() as u32);
        sheet.rows.push(row);
        sheet.row_count = sheet.row_count.max(sheet.rows.len() as u32);
        Ok(())
    }

    fn batch_update(&self, updates: Vec<CellUpdate>) -> Result<(), SheetsError> {
        self.check_writable()?;
        let mut sheets = self.lock();

        let mut planned = Vec::with_capacity(updates.len());
        for update in updates {
            let range = GridRange::parse(&update.range)?;
            let (index, sheet) = locate(&sheets, &range, &update.range)?;
            let (Some(row), Some(column)) = (range.start_row, range.start_column) else {
                return Err(SheetsError::Backend(format!(
                    "range {} has no anchor cell",
                    update.range
                )));
            };

            let height = update.values.len() as u32;
            let width = update.values.iter().map(Vec::len).max().unwrap_or(0) as u32;
            let last_row = row + height.saturating_sub(1);
            let last_column = column + width.saturating_sub(1);
            if last_row > sheet.row_count || last_column > sheet.column_count {
                return Err(SheetsError::Backend(format!(
                    "range {} exceeds grid limits ({} rows, {} columns)",
                    update.range, sheet.row_count, sheet.column_count
                )));
            }
            planned.push((index, row, column, update.values));
        }

        for (index, row, column, values) in planned {
            let sheet = &mut sheets[index];
            for (row_offset, line) in values.into_iter().enumerate() {
                for (column_offset, value) in line.into_iter().enumerate() {
                    sheet.write(row + row_offset as u32, column + column_offset as u32, value);
                }
            }
        }
        Ok(())
    }

    fn grow(
        &self,
        sheet: &Worksheet,
        extra_rows: u32,
        extra_columns: u32,
    ) -> Result<(), SheetsError> {
        if self.fail_resize.load(Ordering::SeqCst) {
            return Err(SheetsError::Backend("resize rejected".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut sheets = self.lock();
        let target = sheets
            .iter_mut()
            .find(|candidate| candidate.sheet_id == sheet.sheet_id)
            .ok_or_else(|| SheetsError::WorksheetNotFound(sheet.title.clone()))?;
        target.row_count += extra_rows;
        target.column_count += extra_columns;
        Ok(())
    }
}
