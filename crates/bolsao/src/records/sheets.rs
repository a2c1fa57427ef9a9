use std::fmt::Debug;
use std::path::PathBuf;

use google_sheets4::api::{
    AppendDimensionRequest, BatchUpdateSpreadsheetRequest, BatchUpdateValuesRequest, Request,
    Scope, ValueRange,
};
use google_sheets4::{hyper_rustls, hyper_util, yup_oauth2, Sheets};
use serde_json::Value;
use tokio::runtime::Runtime;

use super::a1::{quote_sheet_title, RangeParseError};

/// Rows or columns of cells as returned by a range read.
pub type ValueGrid = Vec<Vec<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorDimension {
    Rows,
    Columns,
}

impl MajorDimension {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rows => "ROWS",
            Self::Columns => "COLUMNS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRender {
    /// Raw numbers and strings.
    Unformatted,
    /// Cell text as displayed, e.g. dates as `dd/mm/YYYY`.
    Formatted,
}

impl ValueRender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unformatted => "UNFORMATTED_VALUE",
            Self::Formatted => "FORMATTED_VALUE",
        }
    }
}

/// Tab metadata needed to address and resize a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub sheet_id: i32,
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub range: String,
    pub values: ValueGrid,
}

impl CellUpdate {
    pub fn single(range: impl Into<String>, value: Value) -> Self {
        Self {
            range: range.into(),
            values: vec![vec![value]],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),
    #[error("spreadsheet credentials rejected: {0}")]
    Auth(String),
    #[error("spreadsheet operation failed: {0}")]
    Backend(String),
    #[error("spreadsheet runtime unavailable: {0}")]
    Runtime(String),
    #[error(transparent)]
    Range(#[from] RangeParseError),
}

/// Where the service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAccountSource {
    /// Key JSON held in the environment.
    Inline(String),
    File(PathBuf),
}

/// Minimal set of spreadsheet calls the record store is built on.
pub trait SheetsGateway: Debug + Send + Sync {
    fn worksheet(&self, title: &str) -> Result<Worksheet, SheetsError>;

    /// Reads several ranges in one request, one grid per range, in order.
    fn read_ranges(
        &self,
        ranges: &[String],
        major: MajorDimension,
        render: ValueRender,
    ) -> Result<Vec<ValueGrid>, SheetsError>;

    fn append_row(&self, sheet_title: &str, row: Vec<Value>) -> Result<(), SheetsError>;

    /// Writes every update in a single request. Ranges must be qualified.
    fn batch_update(&self, updates: Vec<CellUpdate>) -> Result<(), SheetsError>;

    fn grow(&self, sheet: &Worksheet, extra_rows: u32, extra_columns: u32)
        -> Result<(), SheetsError>;
}

/// Connector used by [`connect_service_account`].
pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Wraps the generated google-sheets4 hub so the synchronous record store can
/// call it without exposing async details.
pub struct GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    hub: Sheets<C>,
    spreadsheet_id: String,
    runtime: Runtime,
}

impl<C> GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: Sheets<C>, spreadsheet_id: impl Into<String>, runtime: Runtime) -> Self {
        Self {
            hub,
            spreadsheet_id: spreadsheet_id.into(),
            runtime,
        }
    }

    pub fn with_runtime(
        hub: Sheets<C>,
        spreadsheet_id: impl Into<String>,
    ) -> Result<Self, SheetsError> {
        let runtime = Runtime::new().map_err(|err| SheetsError::Runtime(err.to_string()))?;
        Ok(Self::new(hub, spreadsheet_id, runtime))
    }

    fn map_error<E: std::fmt::Display>(err: E) -> SheetsError {
        SheetsError::Backend(err.to_string())
    }
}

/// Authenticates with a service-account key and opens the spreadsheet.
pub fn connect_service_account(
    spreadsheet_id: &str,
    source: &ServiceAccountSource,
) -> Result<GoogleSheetsClient<HttpsConnector>, SheetsError> {
    let runtime = Runtime::new().map_err(|err| SheetsError::Runtime(err.to_string()))?;

    let hub = runtime.block_on(async {
        let key = match source {
            ServiceAccountSource::Inline(raw) => yup_oauth2::parse_service_account_key(raw),
            ServiceAccountSource::File(path) => yup_oauth2::read_service_account_key(path).await,
        }
        .map_err(|err| SheetsError::Auth(err.to_string()))?;

        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| SheetsError::Auth(err.to_string()))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|err| SheetsError::Runtime(err.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);

        Ok::<_, SheetsError>(Sheets::new(client, auth))
    })?;

    tracing::info!(spreadsheet_id, "connected to spreadsheet");
    Ok(GoogleSheetsClient::new(hub, spreadsheet_id, runtime))
}

impl<C> std::fmt::Debug for GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsClient")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

impl<C> SheetsGateway for GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    fn worksheet(&self, title: &str) -> Result<Worksheet, SheetsError> {
        let result = self.runtime.block_on(async {
            self.hub
                .spreadsheets()
                .get(&self.spreadsheet_id)
                .param("fields", "sheets.properties")
                .add_scope(Scope::Spreadsheet)
                .doit()
                .await
        });

        let (_, spreadsheet) = result.map_err(GoogleSheetsClient::<C>::map_error)?;
        spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .find(|properties| properties.title.as_deref() == Some(title))
            .map(|properties| {
                let grid = properties.grid_properties.unwrap_or_default();
                Worksheet {
                    sheet_id: properties.sheet_id.unwrap_or_default(),
                    title: title.to_string(),
                    row_count: grid.row_count.unwrap_or_default().max(0) as u32,
                    column_count: grid.column_count.unwrap_or_default().max(0) as u32,
                }
            })
            .ok_or_else(|| SheetsError::WorksheetNotFound(title.to_string()))
    }

    fn read_ranges(
        &self,
        ranges: &[String],
        major: MajorDimension,
        render: ValueRender,
    ) -> Result<Vec<ValueGrid>, SheetsError> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }

        let result = self.runtime.block_on(async {
            let mut call = self
                .hub
                .spreadsheets()
                .values_batch_get(&self.spreadsheet_id)
                .major_dimension(major.as_str())
                .value_render_option(render.as_str());
            for range in ranges {
                call = call.add_ranges(range);
            }
            call.add_scope(Scope::Spreadsheet).doit().await
        });

        let (_, response) = result.map_err(GoogleSheetsClient::<C>::map_error)?;
        let mut grids: Vec<ValueGrid> = response
            .value_ranges
            .unwrap_or_default()
            .into_iter()
            .map(|range| range.values.unwrap_or_default())
            .collect();
        grids.resize(ranges.len(), Vec::new());
        Ok(grids)
    }

    fn append_row(&self, sheet_title: &str, row: Vec<Value>) -> Result<(), SheetsError> {
        let request = ValueRange {
            values: Some(vec![row]),
            ..ValueRange::default()
        };
        let range = quote_sheet_title(sheet_title);

        let result = self.runtime.block_on(async {
            self.hub
                .spreadsheets()
                .values_append(request, &self.spreadsheet_id, &range)
                .value_input_option("USER_ENTERED")
                .insert_data_option("INSERT_ROWS")
                .add_scope(Scope::Spreadsheet)
                .doit()
                .await
        });

        result.map_err(GoogleSheetsClient::<C>::map_error)?;
        Ok(())
    }

    fn batch_update(&self, updates: Vec<CellUpdate>) -> Result<(), SheetsError> {
        let request = BatchUpdateValuesRequest {
            data: Some(
                updates
                    .into_iter()
                    .map(|update| ValueRange {
                        range: Some(update.range),
                        values: Some(update.values),
                        ..ValueRange::default()
                    })
                    .collect(),
            ),
            value_input_option: Some("USER_ENTERED".to_string()),
            ..BatchUpdateValuesRequest::default()
        };

        let result = self.runtime.block_on(async {
            self.hub
                .spreadsheets()
                .values_batch_update(request, &self.spreadsheet_id)
                .add_scope(Scope::Spreadsheet)
                .doit()
                .await
        });

        result.map_err(GoogleSheetsClient::<C>::map_error)?;
        Ok(())
    }

    fn grow(
        &self,
        sheet: &Worksheet,
        extra_rows: u32,
        extra_columns: u32,
    ) -> Result<(), SheetsError> {
        let mut requests = Vec::new();
        for (dimension, length) in [("ROWS", extra_rows), ("COLUMNS", extra_columns)] {
            if length == 0 {
                continue;
            }
            requests.push(Request {
                append_dimension: Some(AppendDimensionRequest {
                    sheet_id: Some(sheet.sheet_id),
                    dimension: Some(dimension.to_string()),
                    length: Some(i32::try_from(length).unwrap_or(i32::MAX)),
                }),
                ..Request::default()
            });
        }
        if requests.is_empty() {
            return Ok(());
        }

        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(requests),
            ..BatchUpdateSpreadsheetRequest::default()
        };

        let result = self.runtime.block_on(async {
            self.hub
                .spreadsheets()
                .batch_update(request, &self.spreadsheet_id)
                .add_scope(Scope::Spreadsheet)
                .doit()
                .await
        });

        result.map_err(GoogleSheetsClient::<C>::map_error)?;
        Ok(())
    }
}
