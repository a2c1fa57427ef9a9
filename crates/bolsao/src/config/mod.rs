use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::records::ServiceAccountSource;

const DEFAULT_TEMPLATE_PATH: &str = "crates/bolsao/templates/carta.html";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    /// `None` runs against the in-memory spreadsheet.
    pub sheets: Option<SheetsConfig>,
    pub records: RecordsConfig,
    pub letter: LetterConfig,
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            sheets: SheetsConfig::from_env()?,
            records: RecordsConfig::from_env()?,
            letter: LetterConfig::from_env(),
            catalog_path: non_empty_var("BOLSAO_CATALOG_PATH").map(PathBuf::from),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Spreadsheet holding the award records and the service account to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub credentials: ServiceAccountSource,
}

impl SheetsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(spreadsheet_id) = non_empty_var("BOLSAO_SPREADSHEET_ID") else {
            return Ok(None);
        };

        let credentials = match (
            non_empty_var("GOOGLE_SERVICE_ACCOUNT_JSON"),
            non_empty_var("GOOGLE_SERVICE_ACCOUNT_FILE"),
        ) {
            (Some(raw), _) => ServiceAccountSource::Inline(raw),
            (None, Some(path)) => ServiceAccountSource::File(PathBuf::from(path)),
            (None, None) => return Err(ConfigError::MissingCredentials),
        };

        Ok(Some(Self {
            spreadsheet_id,
            credentials,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsConfig {
    pub snapshot_ttl: Duration,
    pub candidate_ttl: Duration,
}

impl RecordsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            snapshot_ttl: seconds_var("BOLSAO_SNAPSHOT_TTL_SECS", 300)?,
            candidate_ttl: seconds_var("BOLSAO_CANDIDATE_TTL_SECS", 600)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterConfig {
    pub template_path: PathBuf,
    pub stylesheet: String,
    pub pdf_command: String,
}

impl LetterConfig {
    fn from_env() -> Self {
        Self {
            template_path: non_empty_var("BOLSAO_TEMPLATE_PATH").map_or_else(
                || PathBuf::from(DEFAULT_TEMPLATE_PATH),
                PathBuf::from,
            ),
            stylesheet: non_empty_var("BOLSAO_STYLESHEET").unwrap_or_else(|| "style.css".to_string()),
            pdf_command: non_empty_var("BOLSAO_PDF_COMMAND")
                .unwrap_or_else(|| "weasyprint".to_string()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn seconds_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidNumber { var: name }),
        None => Ok(Duration::from_secs(default)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
    MissingCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a whole number of seconds")
            }
            ConfigError::MissingCredentials => write!(
                f,
                "BOLSAO_SPREADSHEET_ID is set but neither GOOGLE_SERVICE_ACCOUNT_JSON nor GOOGLE_SERVICE_ACCOUNT_FILE is"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::MissingCredentials => None,
        }
    }
}
