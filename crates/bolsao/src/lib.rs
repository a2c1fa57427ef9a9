//! Scholarship exam ("bolsão") award desk.
//!
//! Prices scholarships from exam scores, checks negotiated installments
//! against each campus's ceiling, renders award letters and keeps the award
//! records in a Google Sheets spreadsheet.

pub mod config;
pub mod desk;
pub mod error;
pub mod forms;
pub mod letter;
pub mod negotiation;
pub mod pricing;
pub mod records;
pub mod telemetry;

pub use desk::{AwardDesk, DeskError, DeskSettings, LetterRequest, RecordFilter};
