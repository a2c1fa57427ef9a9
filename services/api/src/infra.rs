use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bolsao::config::AppConfig;
use bolsao::error::AppError;
use bolsao::letter::{CommandConverter, LetterRenderer, LetterTemplate};
use bolsao::pricing::PricingCatalog;
use bolsao::records::award::columns;
use bolsao::records::{
    candidates, connect_service_account, InMemorySheets, RecordStore, SheetsGateway,
    StoreSettings,
};
use bolsao::{AwardDesk, DeskError, DeskSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{error, info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) desk: Arc<AwardDesk>,
}

/// Runs desk work on the blocking pool; the spreadsheet client blocks on its
/// own runtime.
pub(crate) async fn blocking<T, F>(desk: &Arc<AwardDesk>, work: F) -> Result<T, AppError>
where
    F: FnOnce(&AwardDesk) -> Result<T, DeskError> + Send + 'static,
    T: Send + 'static,
{
    let desk = Arc::clone(desk);
    tokio::task::spawn_blocking(move || work(&desk))
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
        .map_err(AppError::from)
}

/// Pricing program named directly or through a class of interest.
pub(crate) fn resolve_program(
    catalog: &PricingCatalog,
    class_of_interest: Option<&str>,
    program: Option<&str>,
) -> Result<String, AppError> {
    if let Some(program) = program.map(str::trim).filter(|name| !name.is_empty()) {
        return match catalog.program(program) {
            Some(_) => Ok(program.to_string()),
            None => Err(AppError::BadRequest(format!("unknown program '{program}'"))),
        };
    }
    match class_of_interest.map(str::trim).filter(|name| !name.is_empty()) {
        Some(class) => catalog
            .program_for_class(class)
            .map(str::to_string)
            .ok_or_else(|| DeskError::UnknownClass(class.to_string()).into()),
        None => Err(AppError::BadRequest(
            "a class of interest or a program is required".to_string(),
        )),
    }
}

pub(crate) fn load_catalog(config: &AppConfig) -> Result<PricingCatalog, AppError> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = PricingCatalog::from_path(path)?;
            info!(path = %path.display(), version = %catalog.version, "loaded pricing catalog");
            Ok(catalog)
        }
        None => Ok(PricingCatalog::builtin()),
    }
}

/// Builds the desk from configuration. Must run outside any Tokio runtime
/// because the spreadsheet client owns one.
pub(crate) fn build_desk(config: &AppConfig) -> Result<AwardDesk, AppError> {
    let catalog = load_catalog(config)?;

    let template = LetterTemplate::new(
        config.letter.template_path.clone(),
        Some(config.letter.stylesheet.clone()),
    );
    let converter = CommandConverter::weasyprint(config.letter.pdf_command.clone());
    let renderer = LetterRenderer::new(template, Box::new(converter));

    let gateway: Option<Arc<dyn SheetsGateway>> = match &config.sheets {
        Some(sheets) => match connect_service_account(&sheets.spreadsheet_id, &sheets.credentials)
        {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                error!(error = %err, "spreadsheet unavailable; record features disabled");
                None
            }
        },
        None => {
            warn!("BOLSAO_SPREADSHEET_ID not set; records are kept in memory only");
            Some(Arc::new(demo_spreadsheet()))
        }
    };

    let store = gateway.map(|gateway| {
        RecordStore::new(
            gateway,
            StoreSettings {
                snapshot_ttl: config.records.snapshot_ttl,
                ..StoreSettings::default()
            },
        )
    });

    let settings = DeskSettings {
        candidate_ttl: config.records.candidate_ttl,
        ..DeskSettings::default()
    };
    Ok(AwardDesk::new(Arc::new(catalog), renderer, store, settings))
}

/// Empty spreadsheet with the tabs and headers the desk expects.
pub(crate) fn demo_spreadsheet() -> InMemorySheets {
    let settings = DeskSettings::default();
    InMemorySheets::new()
        .with_sheet(
            &settings.results_sheet,
            &[
                columns::ID,
                columns::TIMESTAMP,
                columns::STUDENT,
                columns::CAMPUS,
                columns::CLASS,
                columns::MATH,
                columns::PORTUGUESE,
                columns::TOTAL,
                columns::DISCOUNT,
                columns::PROGRAM,
                columns::UPFRONT,
                columns::FIRST_INSTALLMENT,
                columns::MONTHLY,
                columns::USER,
                columns::COHORT,
                columns::SCHOOL,
                columns::NEGOTIATED,
                columns::GUARDIAN,
                columns::PHONE,
                columns::ENROLLED,
                columns::NOTES,
                columns::EXPECTED_MONTHLY,
            ],
        )
        .with_sheet(&settings.cohort_sheet, &["Data", "Dia", "Nome"])
        .with_sheet(&settings.candidates_sheet, &candidates::REQUIRED_COLUMNS)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::Path;

    /// Desk over the demo spreadsheet whose "PDF" is the filled HTML.
    pub(crate) fn desk(with_store: bool) -> AwardDesk {
        let template = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../crates/bolsao/templates/carta.html");
        let renderer = LetterRenderer::new(
            LetterTemplate::new(template, Some("style.css".to_string())),
            Box::new(CommandConverter::new("cat", Vec::new())),
        );
        let store = with_store.then(|| {
            let gateway: Arc<dyn SheetsGateway> = Arc::new(demo_spreadsheet());
            RecordStore::new(gateway, StoreSettings::default())
        });
        AwardDesk::new(
            Arc::new(PricingCatalog::builtin()),
            renderer,
            store,
            DeskSettings::default(),
        )
    }
}
