use crate::infra::{blocking, resolve_program, AppState};
use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use bolsao::desk::{brasilia_now, FollowUpReceipt, RecordListing};
use bolsao::error::AppError;
use bolsao::negotiation::{NegotiationMode, NegotiationOutcome};
use bolsao::pricing::{format_brl, PriceListEntry, Quote};
use bolsao::records::award::FollowUpForm;
use bolsao::records::candidates::Candidate;
use bolsao::{DeskError, LetterRequest, RecordFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;

const RECORD_ID_HEADER: HeaderName = HeaderName::from_static("x-record-id");
const RECORD_WARNING_HEADER: HeaderName = HeaderName::from_static("x-record-warning");

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequest {
    #[serde(default)]
    pub(crate) class_of_interest: Option<String>,
    #[serde(default)]
    pub(crate) program: Option<String>,
    pub(crate) math: u8,
    pub(crate) portuguese: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuoteResponse {
    #[serde(flatten)]
    pub(crate) quote: Quote,
    pub(crate) discount_percent: String,
    pub(crate) formatted: FormattedQuote,
}

/// Money values as printed on the letter.
#[derive(Debug, Serialize)]
pub(crate) struct FormattedQuote {
    pub(crate) first_installment: String,
    pub(crate) monthly_installment: String,
    pub(crate) upfront_annual: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NegotiationRequest {
    pub(crate) campus: String,
    #[serde(default)]
    pub(crate) class_of_interest: Option<String>,
    #[serde(default)]
    pub(crate) program: Option<String>,
    #[serde(default)]
    pub(crate) percentage: Option<f64>,
    #[serde(default)]
    pub(crate) installment: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NegotiationResponse {
    #[serde(flatten)]
    pub(crate) outcome: NegotiationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) warning: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PriceQuery {
    #[serde(default)]
    pub(crate) course: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PriceListResponse {
    pub(crate) version: String,
    pub(crate) courses: Vec<String>,
    pub(crate) entries: Vec<PriceListEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateQuery {
    pub(crate) campus: String,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/quotes", post(quote_endpoint))
        .route("/api/v1/negotiations", post(negotiation_endpoint))
        .route("/api/v1/letters", post(letter_endpoint))
        .route("/api/v1/records", get(records_endpoint))
        .route("/api/v1/records/refresh", post(refresh_endpoint))
        .route("/api/v1/records/:id", patch(follow_up_endpoint))
        .route("/api/v1/prices", get(prices_endpoint))
        .route("/api/v1/candidates", get(candidates_endpoint))
        .layer(Extension(state))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "records": state.desk.store_enabled() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn quote_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let program = resolve_program(
        state.desk.catalog(),
        payload.class_of_interest.as_deref(),
        payload.program.as_deref(),
    )?;
    let quote = state
        .desk
        .quote(&program, payload.math, payload.portuguese)?;

    let formatted = FormattedQuote {
        first_installment: format_brl(quote.discounted.first_installment),
        monthly_installment: format_brl(quote.discounted.monthly_installment),
        upfront_annual: format_brl(quote.upfront_annual),
    };
    Ok(Json(QuoteResponse {
        discount_percent: quote.discount_percent(),
        quote,
        formatted,
    }))
}

pub(crate) async fn negotiation_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NegotiationRequest>,
) -> Result<Json<NegotiationResponse>, AppError> {
    let campus = payload.campus.trim();
    if state.desk.catalog().campus(campus).is_none() {
        return Err(DeskError::UnknownCampus(campus.to_string()).into());
    }
    let program = resolve_program(
        state.desk.catalog(),
        payload.class_of_interest.as_deref(),
        payload.program.as_deref(),
    )?;
    let mode = match (payload.percentage, payload.installment) {
        (Some(percentage), None) => NegotiationMode::Percentage(percentage),
        (None, Some(installment)) => NegotiationMode::Installment(installment),
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of percentage or installment is required".to_string(),
            ))
        }
    };

    let outcome = state.desk.negotiate(campus, &program, mode);
    Ok(Json(NegotiationResponse {
        warning: outcome.warning(),
        outcome,
    }))
}

/// Returns the PDF itself; the record id and any save failure travel in
/// headers.
pub(crate) async fn letter_endpoint(
    Extension(state): Extension<AppState>,
    Json(request): Json<LetterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let issued = blocking(&state.desk, move |desk| {
        desk.generate_letter(&request, brasilia_now())
    })
    .await?;

    let mut headers = HeaderMap::new();
    if let Ok(mime) = HeaderValue::from_str(issued.letter.mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, mime);
    }
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment(&issued.letter.file_name),
    );
    if let Ok(id) = HeaderValue::from_str(&issued.record.id) {
        headers.insert(RECORD_ID_HEADER, id);
    }
    if let Some(err) = &issued.persist_error {
        if let Ok(warning) = HeaderValue::from_str(&ascii_only(err)) {
            headers.insert(RECORD_WARNING_HEADER, warning);
        }
    }

    Ok((StatusCode::OK, headers, issued.letter.bytes))
}

pub(crate) async fn records_endpoint(
    Extension(state): Extension<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<RecordListing>, AppError> {
    let listing = blocking(&state.desk, move |desk| desk.records(&filter)).await?;
    Ok(Json(listing))
}

pub(crate) async fn follow_up_endpoint(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    Json(form): Json<FollowUpForm>,
) -> Result<Json<FollowUpReceipt>, AppError> {
    let receipt = blocking(&state.desk, move |desk| desk.update_follow_up(&id, &form)).await?;
    Ok(Json(receipt))
}

pub(crate) async fn refresh_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<serde_json::Value> {
    state.desk.refresh();
    Json(json!({ "status": "refreshed" }))
}

pub(crate) async fn prices_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<PriceQuery>,
) -> Json<PriceListResponse> {
    let catalog = state.desk.catalog();
    Json(PriceListResponse {
        version: catalog.version.clone(),
        courses: catalog
            .price_list_courses()
            .into_iter()
            .map(str::to_string)
            .collect(),
        entries: catalog
            .price_list(query.course.as_deref())
            .into_iter()
            .cloned()
            .collect(),
    })
}

pub(crate) async fn candidates_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let candidates = blocking(&state.desk, move |desk| desk.candidates(&query.campus)).await?;
    Ok(Json(candidates))
}

fn attachment(file_name: &str) -> HeaderValue {
    let value = format!("attachment; filename=\"{}\"", ascii_only(file_name).replace('"', "_"));
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Header values must be visible ASCII.
fn ascii_only(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_ascii_graphic() || ch == ' ' { ch } else { '_' })
        .collect()
}
