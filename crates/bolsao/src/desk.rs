//! The award desk: quote, render and record scholarship letters, and keep the
//! follow-up fields of each record up to date.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};

use crate::forms::title_case;
use crate::letter::{
    campus_list_html, material_tables_html, LetterContext, LetterError, LetterRenderer,
    RenderedLetter,
};
use crate::negotiation::{NegotiationChecker, NegotiationMode, NegotiationOutcome};
use crate::pricing::{
    format_brl, Campus, PricingCatalog, PricingEngine, Quote, ScoreEntry, ScoreError,
};
use crate::records::award::{
    columns, expected_monthly_column, follow_up_columns, new_record_id, AwardRecord,
    FollowUpForm, RecordSummary,
};
use crate::records::candidates::{self, Candidate};
use crate::records::{cell_text, RecordStore, Snapshot, SnapshotRow, StoreError, ValueRender};

/// Brasília has not observed daylight saving since 2019.
const BRASILIA_UTC_OFFSET_SECS: i32 = 3 * 3600;
const LETTER_VALIDITY_DAYS: i64 = 7;
const CANDIDATE_CACHE_CAPACITY: u64 = 4;

pub fn brasilia_offset() -> FixedOffset {
    FixedOffset::west_opt(BRASILIA_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn brasilia_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&brasilia_offset())
}

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("student name is required")]
    MissingStudent,
    #[error("unknown campus '{0}'")]
    UnknownCampus(String),
    #[error("unknown class of interest '{0}'")]
    UnknownClass(String),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("record store is not configured")]
    StoreDisabled,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Letter(#[from] LetterError),
}

#[derive(Debug, Clone)]
pub struct DeskSettings {
    pub results_sheet: String,
    pub cohort_sheet: String,
    pub candidates_sheet: String,
    pub candidate_ttl: Duration,
    pub fallback_cohort: String,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            results_sheet: "Resultados_Bolsao".to_string(),
            cohort_sheet: "Bolsão".to_string(),
            candidates_sheet: "Hubspot".to_string(),
            candidate_ttl: Duration::from_secs(600),
            fallback_cohort: "Bolsão Avulso".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LetterRequest {
    pub student: String,
    /// Campus short name, e.g. `BANGU`.
    pub campus: String,
    pub class_of_interest: String,
    pub math: u8,
    pub portuguese: u8,
    #[serde(default)]
    pub user: Option<String>,
}

/// A rendered letter and the record written for it.
#[derive(Debug, Clone)]
pub struct IssuedLetter {
    pub letter: RenderedLetter,
    pub record: AwardRecord,
    pub quote: Quote,
    /// Set when the letter rendered but the record could not be saved.
    pub persist_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpReceipt {
    pub id: String,
    pub row: u32,
    pub updated_columns: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
    /// Campus short name.
    #[serde(default)]
    pub campus: Option<String>,
    #[serde(default)]
    pub cohort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordListing {
    /// Cohorts present for the selected campus.
    pub cohorts: Vec<String>,
    /// `"Name (id)"` labels for the selected records.
    pub options: Vec<String>,
    pub records: Vec<RecordSummary>,
}

pub struct AwardDesk {
    pricing: PricingEngine,
    negotiation: NegotiationChecker,
    renderer: LetterRenderer,
    store: Option<RecordStore>,
    candidates: Cache<String, Arc<Snapshot>>,
    settings: DeskSettings,
}

impl std::fmt::Debug for AwardDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwardDesk")
            .field("catalog", &self.pricing.catalog().version)
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AwardDesk {
    pub fn new(
        catalog: Arc<PricingCatalog>,
        renderer: LetterRenderer,
        store: Option<RecordStore>,
        settings: DeskSettings,
    ) -> Self {
        let pricing = PricingEngine::new(catalog);
        let candidates = Cache::builder()
            .max_capacity(CANDIDATE_CACHE_CAPACITY)
            .time_to_live(settings.candidate_ttl)
            .build();
        Self {
            negotiation: NegotiationChecker::new(pricing.clone()),
            pricing,
            renderer,
            store,
            candidates,
            settings,
        }
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn catalog(&self) -> &PricingCatalog {
        self.pricing.catalog()
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    pub fn store_enabled(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&RecordStore, DeskError> {
        self.store.as_ref().ok_or(DeskError::StoreDisabled)
    }

    fn campus(&self, short_name: &str) -> Result<&Campus, DeskError> {
        let short_name = short_name.trim();
        self.catalog()
            .campus(short_name)
            .ok_or_else(|| DeskError::UnknownCampus(short_name.to_string()))
    }

    /// Pricing program for a class of interest.
    pub fn resolve_program(&self, class_of_interest: &str) -> Result<&str, DeskError> {
        let class_of_interest = class_of_interest.trim();
        self.catalog()
            .program_for_class(class_of_interest)
            .ok_or_else(|| DeskError::UnknownClass(class_of_interest.to_string()))
    }

    pub fn quote(&self, program: &str, math: u8, portuguese: u8) -> Result<Quote, DeskError> {
        let score = ScoreEntry::new(self.catalog(), program, math, portuguese)?;
        Ok(self.pricing.quote(program, score))
    }

    pub fn negotiate(
        &self,
        campus: &str,
        program: &str,
        mode: NegotiationMode,
    ) -> NegotiationOutcome {
        self.negotiation.simulate(campus.trim(), program, mode)
    }

    /// Name of the cohort scheduled for `date`, or the walk-in cohort when
    /// nothing matches or the schedule cannot be read.
    pub fn cohort_name_for(&self, date: NaiveDate) -> String {
        let Some(store) = &self.store else {
            return self.settings.fallback_cohort.clone();
        };
        match self.lookup_cohort(store, date) {
            Ok(Some(name)) => name,
            Ok(None) => self.settings.fallback_cohort.clone(),
            Err(err) => {
                tracing::warn!(error = %err, %date, "cohort schedule unavailable");
                self.settings.fallback_cohort.clone()
            }
        }
    }

    fn lookup_cohort(&self, store: &RecordStore, date: NaiveDate) -> Result<Option<String>, StoreError> {
        let mut columns = store
            .read_columns(&self.settings.cohort_sheet, &[1, 3], 2, ValueRender::Formatted)?
            .into_iter();
        let dates = columns.next().unwrap_or_default();
        let names = columns.next().unwrap_or_default();

        for (offset, raw_date) in dates.iter().enumerate() {
            let name = names.get(offset).map(cell_text).unwrap_or_default();
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match NaiveDate::parse_from_str(cell_text(raw_date).trim(), "%d/%m/%Y") {
                Ok(scheduled) if scheduled == date => return Ok(Some(name.to_string())),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Computes the award, renders the letter and records it. A failure to
    /// save the record after rendering is reported in
    /// [`IssuedLetter::persist_error`] instead of discarding the letter.
    pub fn generate_letter(
        &self,
        request: &LetterRequest,
        issued_at: DateTime<FixedOffset>,
    ) -> Result<IssuedLetter, DeskError> {
        let student = title_case(&request.student);
        if student.is_empty() {
            return Err(DeskError::MissingStudent);
        }
        let campus = self.campus(&request.campus)?;
        let class_of_interest = request.class_of_interest.trim();
        let program = self.resolve_program(class_of_interest)?.to_string();
        let quote = self.quote(&program, request.math, request.portuguese)?;

        let store = self.store()?;
        let results = self.settings.results_sheet.as_str();
        store.require_columns(results, &[columns::ID])?;

        let today = issued_at.date_naive();
        let cohort = self.cohort_name_for(today);
        let context = self.letter_context(campus, &student, class_of_interest, &quote, today);
        let letter = self.renderer.render(&student, &context)?;

        let user = request
            .user
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .unwrap_or("-");
        let record = AwardRecord {
            id: new_record_id(),
            created_at: issued_at.format("%d/%m/%Y %H:%M:%S").to_string(),
            student,
            campus: campus.full_name.clone(),
            class_of_interest: class_of_interest.to_string(),
            math: quote.score.math,
            portuguese: quote.score.portuguese,
            total: quote.total_correct,
            discount_percent: format!("{}%", quote.discount_percent()),
            program,
            upfront_annual: format_brl(quote.upfront_annual),
            first_installment: format_brl(quote.discounted.first_installment),
            monthly_installment: format_brl(quote.discounted.monthly_installment),
            user: user.to_string(),
            cohort,
        };

        let persist_error = match store.append_record(results, &record.to_cells()) {
            Ok(()) => {
                store.invalidate_snapshots();
                None
            }
            Err(err) => {
                tracing::warn!(record_id = %record.id, error = %err, "letter rendered but record not saved");
                Some(err.to_string())
            }
        };

        tracing::info!(
            record_id = %record.id,
            campus = %record.campus,
            discount = %record.discount_percent,
            "issued scholarship letter"
        );

        Ok(IssuedLetter {
            letter,
            record,
            quote,
            persist_error,
        })
    }

    fn letter_context(
        &self,
        campus: &Campus,
        student: &str,
        class_of_interest: &str,
        quote: &Quote,
        today: NaiveDate,
    ) -> LetterContext {
        let catalog = self.catalog();
        let deadline = today + chrono::Duration::days(LETTER_VALIDITY_DAYS);

        let mut context = LetterContext::new();
        context
            .text("ano", today.year())
            .text("unidade", format!("Colégio Matriz – {}", campus.short_name))
            .text("aluno", student)
            .text("bolsa_pct", quote.discount_percent())
            .text("acertos_mat", quote.score.math)
            .text("acertos_port", quote.score.portuguese)
            .text("turma", class_of_interest)
            .text("n_parcelas", catalog.formula.installments)
            .text("data_limite", deadline.format("%d/%m/%Y"))
            .text("anuidade_vista", format_brl(quote.upfront_annual))
            .text("primeira_cota", format_brl(quote.discounted.first_installment))
            .text("valor_parcela", format_brl(quote.discounted.monthly_installment))
            .markup("unidades_html", campus_list_html(catalog.campus_names()))
            .markup(
                "tabelas_material_didatico",
                material_tables_html(&catalog.course_materials, &campus.short_name),
            );
        context
    }

    /// Writes the fields present in `form` onto the record's row.
    pub fn update_follow_up(
        &self,
        id: &str,
        form: &FollowUpForm,
    ) -> Result<FollowUpReceipt, DeskError> {
        let store = self.store()?;
        let results = self.settings.results_sheet.as_str();
        let id = id.trim();

        let headers = store.require_columns(results, &[columns::ID])?;
        let row = store
            .find_row_by_id(results, columns::ID, id)?
            .ok_or_else(|| StoreError::RecordNotFound(id.to_string()))?;

        store.ensure_size(results);
        let cells = form.to_cells(expected_monthly_column(&headers));
        let updated_columns = store.update_row(results, row, &cells)?;
        store.invalidate_snapshots();

        tracing::info!(record_id = id, row, updated_columns, "follow-up saved");
        Ok(FollowUpReceipt {
            id: id.to_string(),
            row,
            updated_columns,
        })
    }

    /// Award records from the snapshot, filtered by campus and cohort.
    pub fn records(&self, filter: &RecordFilter) -> Result<RecordListing, DeskError> {
        let store = self.store()?;
        let results = self.settings.results_sheet.as_str();

        let headers = store.header_map(results)?;
        let expected = expected_monthly_column(&headers);
        let snapshot = store.snapshot(results, &follow_up_columns(expected), Some(columns::ID))?;

        let campus_rows: Vec<&SnapshotRow> = match filter.campus.as_deref() {
            Some(short_name) => {
                let campus = self.campus(short_name)?;
                snapshot
                    .filter_eq(columns::CAMPUS, &campus.full_name)
                    .collect()
            }
            None => snapshot.rows().iter().collect(),
        };
        let cohorts = Snapshot::distinct(campus_rows.iter().copied(), columns::COHORT);

        let selected: Vec<&SnapshotRow> = match filter.cohort.as_deref().map(str::trim) {
            Some(cohort) if !cohort.is_empty() => campus_rows
                .into_iter()
                .filter(|row| row.get(columns::COHORT).trim() == cohort)
                .collect(),
            _ => campus_rows,
        };

        Ok(RecordListing {
            cohorts,
            options: snapshot.options(selected.iter().copied(), columns::STUDENT),
            records: selected
                .into_iter()
                .filter(|row| !row.get(columns::ID).trim().is_empty())
                .map(|row| RecordSummary::from_row(row, expected))
                .collect(),
        })
    }

    /// CRM candidates registered for a campus, sorted by name.
    pub fn candidates(&self, campus: &str) -> Result<Vec<Candidate>, DeskError> {
        let store = self.store()?;
        let campus = self.campus(campus)?;
        let sheet = self.settings.candidates_sheet.as_str();

        let snapshot = match self.candidates.get(sheet) {
            Some(snapshot) => snapshot,
            None => {
                let snapshot =
                    Arc::new(store.load_snapshot(sheet, &candidates::REQUIRED_COLUMNS, None)?);
                self.candidates.insert(sheet.to_string(), Arc::clone(&snapshot));
                snapshot
            }
        };

        let catalog = self.catalog();
        let mut found: Vec<Candidate> = snapshot
            .filter_eq(candidates::CAMPUS, &campus.full_name)
            .map(|row| Candidate::from_row(row, catalog))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// Drops cached sheet data so the next read goes to the spreadsheet.
    pub fn refresh(&self) {
        if let Some(store) = &self.store {
            store.refresh();
        }
        self.candidates.invalidate_all();
    }
}
