//! Spreadsheet-backed award records.
//!
//! The store talks to a [`SheetsGateway`] and keeps the round trips down:
//! header maps and worksheet metadata are resolved once, reads and writes are
//! batched, and whole-sheet snapshots live for a bounded time.

pub mod a1;
pub mod award;
pub mod candidates;
mod memory;
mod sheets;
mod store;

use serde_json::Value;

pub use memory::InMemorySheets;
pub use sheets::{
    connect_service_account, CellUpdate, GoogleSheetsClient, HttpsConnector, MajorDimension,
    ServiceAccountSource, SheetsError, SheetsGateway, ValueGrid, ValueRender, Worksheet,
};
pub use store::{
    HeaderMap, RecordStore, Snapshot, SnapshotRow, StoreError, StoreSettings,
};

/// Text of a cell as the user would read it. Whole numbers lose their `.0`.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => if *flag { "TRUE" } else { "FALSE" }.to_string(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
