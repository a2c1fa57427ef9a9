use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::desk::DeskError;
use crate::pricing::CatalogError;
use crate::records::{SheetsError, StoreError};
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Catalog(CatalogError),
    Sheets(SheetsError),
    Desk(DeskError),
    /// A request the caller can fix, e.g. a malformed field.
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Desk(err) => match err {
                DeskError::MissingStudent
                | DeskError::UnknownCampus(_)
                | DeskError::UnknownClass(_)
                | DeskError::Score(_) => StatusCode::BAD_REQUEST,
                DeskError::StoreDisabled => StatusCode::SERVICE_UNAVAILABLE,
                DeskError::Store(StoreError::RecordNotFound(_)) => StatusCode::NOT_FOUND,
                DeskError::Store(StoreError::MissingColumns { .. }) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DeskError::Store(StoreError::Sheets(_)) | DeskError::Letter(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Catalog(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Sheets(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Sheets(err) => write!(f, "spreadsheet error: {}", err),
            AppError::Desk(err) => write!(f, "{}", err),
            AppError::BadRequest(message) => write!(f, "bad request: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Sheets(err) => Some(err),
            AppError::Desk(err) => Some(err),
            AppError::BadRequest(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<SheetsError> for AppError {
    fn from(value: SheetsError) -> Self {
        Self::Sheets(value)
    }
}

impl From<DeskError> for AppError {
    fn from(value: DeskError) -> Self {
        Self::Desk(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Desk(DeskError::Store(value))
    }
}
