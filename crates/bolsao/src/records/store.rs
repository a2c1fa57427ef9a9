use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use serde_json::Value;

use super::a1::{cell, column_range, qualify_range, row_range};
use super::sheets::{
    CellUpdate, MajorDimension, SheetsError, SheetsGateway, ValueGrid, ValueRender, Worksheet,
};
use super::cell_text;

const HEADER_CACHE_CAPACITY: u64 = 32;
const SNAPSHOT_CACHE_CAPACITY: u64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error("sheet '{sheet}' is missing required columns: {}", .columns.join(", "))]
    MissingColumns { sheet: String, columns: Vec<String> },
    #[error("record {0} not found")]
    RecordNotFound(String),
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub snapshot_ttl: Duration,
    pub min_rows: u32,
    pub min_columns: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(300),
            min_rows: 2000,
            min_columns: 40,
        }
    }
}

/// Header name → 1-based column for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    columns: BTreeMap<String, u32>,
}

impl HeaderMap {
    /// Builds the map from the header row. Names are trimmed, blanks skipped
    /// and the first occurrence of a repeated name wins.
    pub fn from_row(row: &[Value]) -> Self {
        let mut columns = BTreeMap::new();
        for (idx, value) in row.iter().enumerate() {
            let name = cell_text(value).trim().to_string();
            if !name.is_empty() {
                columns.entry(name).or_insert(idx as u32 + 1);
            }
        }
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<u32> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Names ordered by column, with the position of the last named column.
    pub fn ordered(&self) -> (Vec<Option<&str>>, u32) {
        let width = self.columns.values().copied().max().unwrap_or(0);
        let mut ordered = vec![None; width as usize];
        for (name, column) in &self.columns {
            ordered[*column as usize - 1] = Some(name.as_str());
        }
        (ordered, width)
    }

    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }
}

/// One data row of a snapshot, keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub row_number: u32,
    pub values: BTreeMap<String, String>,
}

impl SnapshotRow {
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map_or("", String::as_str)
    }
}

/// Column-aligned copy of a sheet taken with one batched read.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sheet: String,
    pub columns: Vec<String>,
    rows: Vec<SnapshotRow>,
    id_column: Option<String>,
    index: HashMap<String, u32>,
}

impl Snapshot {
    fn build(sheet: &str, columns: &[&str], id_column: Option<&str>, grids: Vec<ValueGrid>) -> Self {
        let data: Vec<Vec<Value>> = grids
            .into_iter()
            .map(|grid| grid.into_iter().next().unwrap_or_default())
            .collect();
        let height = data.iter().map(Vec::len).max().unwrap_or(0);

        let mut rows = Vec::with_capacity(height);
        let mut index = HashMap::new();
        for offset in 0..height {
            let row_number = offset as u32 + 2;
            let values: BTreeMap<String, String> = columns
                .iter()
                .zip(&data)
                .map(|(name, column)| {
                    let text = column.get(offset).map(cell_text).unwrap_or_default();
                    ((*name).to_string(), text)
                })
                .collect();

            if let Some(id) = id_column.and_then(|column| values.get(column)) {
                let id = id.trim();
                if !id.is_empty() {
                    index.entry(id.to_string()).or_insert(row_number);
                }
            }
            rows.push(SnapshotRow { row_number, values });
        }

        Self {
            sheet: sheet.to_string(),
            columns: columns.iter().map(|name| (*name).to_string()).collect(),
            rows,
            id_column: id_column.map(str::to_string),
            index,
        }
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn row_number(&self, id: &str) -> Option<u32> {
        self.index.get(id.trim()).copied()
    }

    pub fn find(&self, id: &str) -> Option<&SnapshotRow> {
        let row_number = self.row_number(id)?;
        self.rows.get(row_number as usize - 2)
    }

    /// Rows whose `column` equals `value`, ignoring surrounding spaces.
    pub fn filter_eq<'a>(&'a self, column: &'a str, value: &'a str) -> impl Iterator<Item = &'a SnapshotRow> + 'a {
        let value = value.trim();
        self.rows.iter().filter(move |row| row.get(column).trim() == value)
    }

    /// Distinct, sorted, non-empty values of `column` among `rows`.
    pub fn distinct<'a>(rows: impl IntoIterator<Item = &'a SnapshotRow>, column: &str) -> Vec<String> {
        rows.into_iter()
            .map(|row| row.get(column).trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Selectable `"Name (id)"` labels for rows that carry an id.
    pub fn options<'a>(
        &self,
        rows: impl IntoIterator<Item = &'a SnapshotRow>,
        name_column: &str,
    ) -> Vec<String> {
        let Some(id_column) = self.id_column.as_deref() else {
            return Vec::new();
        };
        rows.into_iter()
            .filter(|row| !row.get(id_column).trim().is_empty())
            .map(|row| format!("{} ({})", row.get(name_column).trim(), row.get(id_column).trim()))
            .collect()
    }
}

/// Sheet title, requested columns and id column.
type SnapshotKey = (String, Vec<String>, Option<String>);

/// Record store over a spreadsheet gateway.
pub struct RecordStore {
    gateway: Arc<dyn SheetsGateway>,
    settings: StoreSettings,
    headers: Cache<String, Arc<HeaderMap>>,
    worksheets: Cache<String, Worksheet>,
    snapshots: Cache<SnapshotKey, Arc<Snapshot>>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("gateway", &self.gateway)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    pub fn new(gateway: Arc<dyn SheetsGateway>, settings: StoreSettings) -> Self {
        let snapshots = Cache::builder()
            .max_capacity(SNAPSHOT_CACHE_CAPACITY)
            .time_to_live(settings.snapshot_ttl)
            .build();
        Self {
            gateway,
            headers: Cache::new(HEADER_CACHE_CAPACITY),
            worksheets: Cache::new(HEADER_CACHE_CAPACITY),
            snapshots,
            settings,
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn worksheet(&self, title: &str) -> Result<Worksheet, StoreError> {
        if let Some(sheet) = self.worksheets.get(title) {
            return Ok(sheet);
        }
        let sheet = self.gateway.worksheet(title)?;
        self.worksheets.insert(title.to_string(), sheet.clone());
        Ok(sheet)
    }

    pub fn header_map(&self, title: &str) -> Result<Arc<HeaderMap>, StoreError> {
        if let Some(headers) = self.headers.get(title) {
            return Ok(headers);
        }
        let grids = self.gateway.read_ranges(
            &[row_range(title, 1)],
            MajorDimension::Rows,
            ValueRender::Unformatted,
        )?;
        let header_row = grids
            .into_iter()
            .next()
            .and_then(|grid| grid.into_iter().next())
            .unwrap_or_default();
        let headers = Arc::new(HeaderMap::from_row(&header_row));
        tracing::debug!(sheet = title, columns = headers.len(), "resolved header map");
        self.headers.insert(title.to_string(), Arc::clone(&headers));
        Ok(headers)
    }

    /// Header map that is known to contain every `required` column.
    pub fn require_columns(
        &self,
        title: &str,
        required: &[&str],
    ) -> Result<Arc<HeaderMap>, StoreError> {
        let headers = self.header_map(title)?;
        let missing = headers.missing(required);
        if missing.is_empty() {
            Ok(headers)
        } else {
            Err(StoreError::MissingColumns {
                sheet: title.to_string(),
                columns: missing.into_iter().map(str::to_string).collect(),
            })
        }
    }

    /// Row number holding `id` in `id_column`, scanning one column read.
    pub fn find_row_by_id(
        &self,
        title: &str,
        id_column: &str,
        id: &str,
    ) -> Result<Option<u32>, StoreError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        let headers = self.require_columns(title, &[id_column])?;
        let Some(column) = headers.column(id_column) else {
            return Ok(None);
        };

        let grids = self.gateway.read_ranges(
            &[column_range(title, column, 2)],
            MajorDimension::Columns,
            ValueRender::Unformatted,
        )?;
        let ids = grids
            .into_iter()
            .next()
            .and_then(|grid| grid.into_iter().next())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .position(|value| cell_text(value).trim() == id)
            .map(|offset| offset as u32 + 2))
    }

    /// Sends every update in one call. Bare ranges are qualified with the
    /// sheet title; updates with an empty range are dropped.
    pub fn batch_update(&self, title: &str, updates: Vec<CellUpdate>) -> Result<(), StoreError> {
        let updates: Vec<CellUpdate> = updates
            .into_iter()
            .filter(|update| !update.range.trim().is_empty())
            .map(|update| CellUpdate {
                range: qualify_range(title, update.range.trim()),
                values: update.values,
            })
            .collect();
        if updates.is_empty() {
            return Ok(());
        }

        let count = updates.len();
        self.gateway.batch_update(updates)?;
        tracing::debug!(sheet = title, ranges = count, "batch update applied");
        Ok(())
    }

    /// Writes named values into one row. Names missing from the header are
    /// skipped; returns how many cells were written.
    pub fn update_row(
        &self,
        title: &str,
        row: u32,
        values: &BTreeMap<String, Value>,
    ) -> Result<usize, StoreError> {
        let headers = self.header_map(title)?;
        let updates: Vec<CellUpdate> = values
            .iter()
            .filter_map(|(name, value)| {
                let column = headers.column(name)?;
                Some(CellUpdate::single(cell(row, column), value.clone()))
            })
            .collect();
        let written = updates.len();
        self.batch_update(title, updates)?;
        Ok(written)
    }

    /// Grows the sheet to at least the configured rows and columns. Failures
    /// are logged and swallowed.
    pub fn ensure_size(&self, title: &str) {
        let (min_rows, min_columns) = (self.settings.min_rows, self.settings.min_columns);
        let sheet = match self.worksheet(title) {
            Ok(sheet) => sheet,
            Err(err) => {
                tracing::warn!(sheet = title, error = %err, "could not read sheet size");
                return;
            }
        };

        let extra_rows = min_rows.saturating_sub(sheet.row_count);
        let extra_columns = min_columns.saturating_sub(sheet.column_count);
        if extra_rows == 0 && extra_columns == 0 {
            return;
        }

        match self.gateway.grow(&sheet, extra_rows, extra_columns) {
            Ok(()) => {
                self.worksheets.invalidate(title);
                tracing::info!(sheet = title, extra_rows, extra_columns, "grew sheet");
            }
            Err(err) => {
                tracing::warn!(sheet = title, error = %err, "could not grow sheet");
            }
        }
    }

    /// Appends one row ordered by the header; unknown headers get `""`.
    pub fn append_record(
        &self,
        title: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        let headers = self.header_map(title)?;
        let (ordered, _) = headers.ordered();
        let row: Vec<Value> = ordered
            .into_iter()
            .map(|name| {
                name.and_then(|name| values.get(name))
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()))
            })
            .collect();

        self.gateway.append_row(title, row)?;
        tracing::info!(sheet = title, "appended record");
        Ok(())
    }

    /// Column vectors from `from_row` down, in the order asked for.
    pub fn read_columns(
        &self,
        title: &str,
        columns: &[u32],
        from_row: u32,
        render: ValueRender,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let ranges: Vec<String> = columns
            .iter()
            .map(|column| column_range(title, *column, from_row))
            .collect();
        let grids = self
            .gateway
            .read_ranges(&ranges, MajorDimension::Columns, render)?;
        Ok(grids
            .into_iter()
            .map(|grid| grid.into_iter().next().unwrap_or_default())
            .collect())
    }

    /// Cached snapshot of `columns`; see [`RecordStore::load_snapshot`].
    pub fn snapshot(
        &self,
        title: &str,
        columns: &[&str],
        id_column: Option<&str>,
    ) -> Result<Arc<Snapshot>, StoreError> {
        let key: SnapshotKey = (
            title.to_string(),
            columns.iter().map(|name| (*name).to_string()).collect(),
            id_column.map(str::to_string),
        );
        if let Some(snapshot) = self.snapshots.get(&key) {
            return Ok(snapshot);
        }
        let snapshot = Arc::new(self.load_snapshot(title, columns, id_column)?);
        self.snapshots.insert(key, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Reads all `columns` in one batched call and rebuilds the rows. Cells
    /// come back as the sheet displays them, so dates and percentages keep
    /// their text.
    pub fn load_snapshot(
        &self,
        title: &str,
        columns: &[&str],
        id_column: Option<&str>,
    ) -> Result<Snapshot, StoreError> {
        let mut required: Vec<&str> = columns.to_vec();
        if let Some(id_column) = id_column {
            if !required.contains(&id_column) {
                required.push(id_column);
            }
        }
        let headers = self.require_columns(title, &required)?;
        let positions: Vec<u32> = required
            .iter()
            .filter_map(|name| headers.column(name))
            .collect();

        let ranges: Vec<String> = positions
            .iter()
            .map(|column| column_range(title, *column, 2))
            .collect();
        let grids = self.gateway.read_ranges(
            &ranges,
            MajorDimension::Columns,
            ValueRender::Formatted,
        )?;

        let snapshot = Snapshot::build(title, &required, id_column, grids);
        tracing::debug!(sheet = title, rows = snapshot.rows.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Drops every cached snapshot.
    pub fn invalidate_snapshots(&self) {
        self.snapshots.invalidate_all();
    }

    /// Forgets snapshots and header maps so the next read sees sheet edits,
    /// including renamed or added columns.
    pub fn refresh(&self) {
        self.snapshots.invalidate_all();
        self.headers.invalidate_all();
        self.worksheets.invalidate_all();
        tracing::info!("record caches cleared");
    }
}
