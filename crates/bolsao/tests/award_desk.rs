use std::path::Path;
use std::sync::{Arc, Mutex};

use bolsao::desk::{brasilia_offset, AwardDesk, DeskError, DeskSettings, LetterRequest, RecordFilter};
use bolsao::letter::{DocumentConverter, LetterError, LetterRenderer, LetterTemplate};
use bolsao::pricing::{PricingCatalog, ScoreError};
use bolsao::records::award::{columns, Enrollment, FollowUpForm};
use bolsao::records::candidates;
use bolsao::records::{InMemorySheets, RecordStore, SheetsGateway, StoreError, StoreSettings};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde_json::json;

const RESULTS: &str = "Resultados_Bolsao";
const BANGU: &str = "COLEGIO E CURSO MATRIZ EDUCAÇÃO BANGU";
const TAQUARA: &str = "COLEGIO E CURSO MATRIZ EDUCAÇÃO TAQUARA";

#[derive(Debug, Default)]
struct RecordingConverter {
    documents: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl DocumentConverter for RecordingConverter {
    fn convert(&self, html: &str, base_dir: &Path) -> Result<Vec<u8>, LetterError> {
        if self.fail {
            return Err(LetterError::Conversion("renderer crashed".to_string()));
        }
        assert!(base_dir.join("style.css").is_file());
        self.documents
            .lock()
            .expect("documents mutex")
            .push(html.to_string());
        Ok(b"%PDF-1.7 fake".to_vec())
    }
}

fn results_header() -> Vec<&'static str> {
    vec![
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
        columns::EXPECTED_MONTHLY_FALLBACK,
    ]
}

fn spreadsheet() -> Arc<InMemorySheets> {
    let gateway = InMemorySheets::new()
        .with_sheet(RESULTS, &results_header())
        .with_sheet("Bolsão", &["Data", "Dia", "Nome"])
        .with_sheet("Hubspot", &candidates::REQUIRED_COLUMNS);

    gateway.seed_row(
        "Bolsão",
        vec![json!("12/10/2026"), json!("domingo"), json!("")],
    );
    gateway.seed_row(
        "Bolsão",
        vec![json!("19/10/2026"), json!("segunda"), json!("Bolsão Outubro")],
    );

    for (campus, name, program) in [
        (BANGU, "Rafael Costa", "ESA"),
        (TAQUARA, "Lia Martins", "Pré-Vestibular"),
        (BANGU, "Bruna Alves", "1º ao 5º Ano"),
    ] {
        gateway.seed_row(
            "Hubspot",
            vec![
                json!(campus),
                json!(name),
                json!("9001"),
                json!("Novo"),
                json!("Não"),
                json!(""),
                json!("21987654321"),
                json!("Responsável"),
                json!("familia@example.com"),
                json!(program),
                json!("Instagram"),
            ],
        );
    }
    Arc::new(gateway)
}

fn template() -> LetterTemplate {
    LetterTemplate::new(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/carta.html"),
        Some("style.css".to_string()),
    )
}

fn desk_with(
    gateway: Option<&Arc<InMemorySheets>>,
    converter: RecordingConverter,
) -> AwardDesk {
    let store = gateway.map(|gateway| {
        let shared: Arc<dyn SheetsGateway> = gateway.clone();
        RecordStore::new(shared, StoreSettings::default())
    });
    AwardDesk::new(
        Arc::new(PricingCatalog::builtin()),
        LetterRenderer::new(template(), Box::new(converter)),
        store,
        DeskSettings::default(),
    )
}

fn issued_at(day: u32) -> DateTime<FixedOffset> {
    brasilia_offset()
        .with_ymd_and_hms(2026, 10, day, 14, 30, 0)
        .single()
        .expect("valid timestamp")
}

fn request() -> LetterRequest {
    LetterRequest {
        student: "  ana maria souza ".to_string(),
        campus: "BANGU".to_string(),
        class_of_interest: "1ª série do EM - Pré-Vestibular".to_string(),
        math: 7,
        portuguese: 5,
        user: Some("secretaria".to_string()),
    }
}

#[test]
fn letter_is_rendered_and_recorded() {
    let gateway = spreadsheet();
    let converter = RecordingConverter::default();
    let documents = Arc::clone(&converter.documents);
    let desk = desk_with(Some(&gateway), converter);

    let issued = desk
        .generate_letter(&request(), issued_at(19))
        .expect("letter issued");

    assert_eq!(issued.letter.file_name, "Carta_Bolsa_Ana_Maria_Souza.pdf");
    assert_eq!(issued.letter.mime.essence_str(), "application/pdf");
    assert_eq!(issued.letter.bytes, b"%PDF-1.7 fake");
    assert!(issued.persist_error.is_none());

    let html = documents.lock().expect("documents mutex")[0].clone();
    assert!(html.contains("Ana Maria Souza"));
    assert!(html.contains("Colégio Matriz – BANGU"));
    assert!(html.contains("<strong>50%</strong>"));
    assert!(html.contains("26/10/2026"));
    assert!(html.contains("R$ 1.401,41"));
    assert!(html.contains("<span class='unidade-item'>BANGU</span>"));
    assert!(html.contains("Material Militares"));
    assert!(!html.contains("{{"), "unfilled placeholder left in letter");

    let record = &issued.record;
    assert_eq!(record.id.len(), 12);
    assert_eq!(record.created_at, "19/10/2026 14:30:00");
    assert_eq!(record.student, "Ana Maria Souza");
    assert_eq!(record.campus, BANGU);
    assert_eq!(record.discount_percent, "50%");
    assert_eq!(record.program, "1ª e 2ª Série EM Vestibular");
    assert_eq!(record.monthly_installment, "R$ 1.401,41");
    assert_eq!(record.upfront_annual, "R$ 17.194,14");
    assert_eq!(record.user, "secretaria");
    assert_eq!(record.cohort, "Bolsão Outubro");

    let rows = gateway.rows(RESULTS);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], json!(record.id));
    assert_eq!(rows[1][5], json!(7));
    assert_eq!(rows[1][14], json!("Bolsão Outubro"));
    assert_eq!(rows[1][15], json!(""));
}

#[test]
fn unscheduled_dates_fall_back_to_walk_in_cohort() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    let date = |day| NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date");
    assert_eq!(desk.cohort_name_for(date(19)), "Bolsão Outubro");
    assert_eq!(desk.cohort_name_for(date(12)), "Bolsão Avulso");
    assert_eq!(desk.cohort_name_for(date(20)), "Bolsão Avulso");

    let offline = desk_with(None, RecordingConverter::default());
    assert_eq!(offline.cohort_name_for(date(19)), "Bolsão Avulso");
}

#[test]
fn conversion_failure_writes_nothing() {
    let gateway = spreadsheet();
    let desk = desk_with(
        Some(&gateway),
        RecordingConverter {
            fail: true,
            ..RecordingConverter::default()
        },
    );

    let err = desk
        .generate_letter(&request(), issued_at(19))
        .expect_err("conversion fails");
    assert!(matches!(err, DeskError::Letter(LetterError::Conversion(_))));
    assert_eq!(gateway.write_calls(), 0);
    assert_eq!(gateway.rows(RESULTS).len(), 1);
}

#[test]
fn failed_save_still_returns_the_letter() {
    let gateway = spreadsheet();
    gateway.fail_writes(true);
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    let issued = desk
        .generate_letter(&request(), issued_at(19))
        .expect("letter still issued");
    assert!(!issued.letter.bytes.is_empty());
    assert!(issued
        .persist_error
        .as_deref()
        .is_some_and(|message| message.contains("write rejected")));
}

#[test]
fn invalid_requests_are_rejected_before_rendering() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    let blank = LetterRequest {
        student: "   ".to_string(),
        ..request()
    };
    assert!(matches!(
        desk.generate_letter(&blank, issued_at(19)),
        Err(DeskError::MissingStudent)
    ));

    let campus = LetterRequest {
        campus: "NITERÓI".to_string(),
        ..request()
    };
    assert!(matches!(
        desk.generate_letter(&campus, issued_at(19)),
        Err(DeskError::UnknownCampus(name)) if name == "NITERÓI"
    ));

    let class = LetterRequest {
        class_of_interest: "Curso de Férias".to_string(),
        ..request()
    };
    assert!(matches!(
        desk.generate_letter(&class, issued_at(19)),
        Err(DeskError::UnknownClass(_))
    ));

    let early_years = LetterRequest {
        class_of_interest: "3º ano do EF1".to_string(),
        math: 6,
        portuguese: 2,
        ..request()
    };
    assert!(matches!(
        desk.generate_letter(&early_years, issued_at(19)),
        Err(DeskError::Score(ScoreError::AboveMaximum { max: 5, .. }))
    ));
    assert_eq!(gateway.write_calls(), 0);
}

#[test]
fn letters_need_the_record_store() {
    let desk = desk_with(None, RecordingConverter::default());
    assert!(!desk.store_enabled());
    assert!(matches!(
        desk.generate_letter(&request(), issued_at(19)),
        Err(DeskError::StoreDisabled)
    ));
    assert!(matches!(
        desk.records(&RecordFilter::default()),
        Err(DeskError::StoreDisabled)
    ));

    let quote = desk.quote("ESA", 10, 10).expect("quote works offline");
    assert_eq!(quote.discount, 0.60);
}

#[test]
fn results_sheet_without_id_column_is_a_configuration_error() {
    let gateway = Arc::new(
        InMemorySheets::new()
            .with_sheet(RESULTS, &[columns::STUDENT, columns::CAMPUS])
            .with_sheet("Bolsão", &["Data", "Dia", "Nome"]),
    );
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    match desk.generate_letter(&request(), issued_at(19)) {
        Err(DeskError::Store(StoreError::MissingColumns { sheet, columns })) => {
            assert_eq!(sheet, RESULTS);
            assert_eq!(columns, vec!["REGISTRO_ID".to_string()]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn follow_up_updates_the_record_and_listing() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());
    let issued = desk
        .generate_letter(&request(), issued_at(19))
        .expect("letter issued");
    let id = issued.record.id.clone();

    let before = desk.records(&RecordFilter::default()).expect("records");
    assert_eq!(before.records.len(), 1);
    assert_eq!(before.records[0].follow_up.school_of_origin, "");

    let form = FollowUpForm {
        school_of_origin: Some("Escola Estadual Bangu".to_string()),
        financial_guardian: Some("Marta Souza".to_string()),
        phone: Some("2134567890".to_string()),
        negotiated_value: Some(1100.0),
        enrolled: Some(Enrollment::Yes),
        notes: Some("Pagará à vista".to_string()),
        expected_monthly: Some(950.0),
    };
    let receipt = desk.update_follow_up(&id, &form).expect("follow-up saved");
    assert_eq!(receipt.row, 2);
    assert_eq!(receipt.updated_columns, 7);

    let after = desk.records(&RecordFilter::default()).expect("records");
    let summary = &after.records[0];
    assert_eq!(summary.id, id);
    assert_eq!(summary.follow_up.school_of_origin, "Escola Estadual Bangu");
    assert_eq!(summary.follow_up.phone, "(21) 3456-7890");
    assert_eq!(summary.follow_up.negotiated_value, 1100.0);
    assert_eq!(summary.follow_up.enrolled, Enrollment::Yes);
    assert_eq!(summary.follow_up.expected_monthly, Some(950.0));

    assert!(matches!(
        desk.update_follow_up("ffffffffffff", &form),
        Err(DeskError::Store(StoreError::RecordNotFound(_)))
    ));
}

#[test]
fn partial_follow_up_keeps_the_other_fields() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());
    let id = desk
        .generate_letter(&request(), issued_at(19))
        .expect("letter issued")
        .record
        .id;

    let full = FollowUpForm {
        school_of_origin: Some("Escola Estadual Bangu".to_string()),
        phone: Some("21987654321".to_string()),
        negotiated_value: Some(1100.5),
        enrolled: Some(Enrollment::Yes),
        ..FollowUpForm::default()
    };
    desk.update_follow_up(&id, &full).expect("follow-up saved");

    let notes_only = FollowUpForm {
        notes: Some("ligar amanhã".to_string()),
        ..FollowUpForm::default()
    };
    let receipt = desk
        .update_follow_up(&id, &notes_only)
        .expect("follow-up saved");
    assert_eq!(receipt.updated_columns, 1);

    let listing = desk.records(&RecordFilter::default()).expect("records");
    let follow_up = &listing.records[0].follow_up;
    assert_eq!(follow_up.school_of_origin, "Escola Estadual Bangu");
    assert_eq!(follow_up.phone, "(21) 98765-4321");
    assert_eq!(follow_up.negotiated_value, 1100.5);
    assert_eq!(follow_up.enrolled, Enrollment::Yes);
    assert_eq!(follow_up.notes, "ligar amanhã");
}

#[test]
fn numeric_currency_cells_keep_their_cents() {
    let gateway = spreadsheet();
    let mut row: Vec<serde_json::Value> = results_header().iter().map(|_| json!("")).collect();
    let position = |column: &str| {
        results_header()
            .iter()
            .position(|name| *name == column)
            .expect("column in header")
    };
    row[position(columns::ID)] = json!("a1b2c3d4e5f6");
    row[position(columns::STUDENT)] = json!("Lia Campos");
    row[position(columns::CAMPUS)] = json!(BANGU);
    row[position(columns::NEGOTIATED)] = json!(1100.5);
    row[position(columns::EXPECTED_MONTHLY_FALLBACK)] = json!(950.25);
    gateway.seed_row(RESULTS, row);

    let desk = desk_with(Some(&gateway), RecordingConverter::default());
    let listing = desk.records(&RecordFilter::default()).expect("records");

    assert_eq!(listing.records.len(), 1);
    let follow_up = &listing.records[0].follow_up;
    assert_eq!(follow_up.negotiated_value, 1100.5);
    assert_eq!(follow_up.expected_monthly, Some(950.25));
}

#[test]
fn records_filter_by_campus_and_cohort() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    desk.generate_letter(&request(), issued_at(19))
        .expect("letter issued");
    desk.generate_letter(
        &LetterRequest {
            student: "Joana Prado".to_string(),
            ..request()
        },
        issued_at(20),
    )
    .expect("letter issued");
    desk.generate_letter(
        &LetterRequest {
            student: "Pedro Reis".to_string(),
            campus: "TAQUARA".to_string(),
            ..request()
        },
        issued_at(19),
    )
    .expect("letter issued");

    let bangu = desk
        .records(&RecordFilter {
            campus: Some("BANGU".to_string()),
            cohort: None,
        })
        .expect("records");
    assert_eq!(
        bangu.cohorts,
        vec!["Bolsão Avulso".to_string(), "Bolsão Outubro".to_string()]
    );
    assert_eq!(bangu.records.len(), 2);

    let october = desk
        .records(&RecordFilter {
            campus: Some("BANGU".to_string()),
            cohort: Some("Bolsão Outubro".to_string()),
        })
        .expect("records");
    assert_eq!(october.records.len(), 1);
    assert_eq!(october.records[0].student, "Ana Maria Souza");
    assert_eq!(
        october.options,
        vec![format!("Ana Maria Souza ({})", october.records[0].id)]
    );

    assert!(matches!(
        desk.records(&RecordFilter {
            campus: Some("NITERÓI".to_string()),
            cohort: None,
        }),
        Err(DeskError::UnknownCampus(_))
    ));
}

#[test]
fn candidates_are_filtered_sorted_and_cached() {
    let gateway = spreadsheet();
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    let bangu = desk.candidates("BANGU").expect("candidates");
    let names: Vec<&str> = bangu.iter().map(|candidate| candidate.name.as_str()).collect();
    assert_eq!(names, vec!["Bruna Alves", "Rafael Costa"]);
    assert_eq!(bangu[1].class_of_interest.as_deref(), Some("Pré-Militar ESA"));
    assert_eq!(bangu[0].class_of_interest.as_deref(), Some("1º ano do EF1"));
    assert_eq!(bangu[0].contacted, "Não");

    let reads = gateway.read_calls();
    let taquara = desk.candidates("TAQUARA").expect("candidates");
    assert_eq!(taquara.len(), 1);
    assert_eq!(gateway.read_calls(), reads);

    desk.refresh();
    desk.candidates("TAQUARA").expect("candidates");
    assert!(gateway.read_calls() > reads);

    let json = serde_json::to_value(&taquara[0]).expect("serializes");
    assert_eq!(json["Contato realizado"], json!("Não"));
    assert!(json.get("Contato Realizado").is_none());
}

#[test]
fn candidates_tab_missing_columns_is_reported() {
    let gateway = Arc::new(
        InMemorySheets::new()
            .with_sheet(RESULTS, &results_header())
            .with_sheet("Hubspot", &[candidates::CAMPUS, candidates::NAME]),
    );
    let desk = desk_with(Some(&gateway), RecordingConverter::default());

    match desk.candidates("BANGU") {
        Err(DeskError::Store(StoreError::MissingColumns { columns, .. })) => {
            assert_eq!(columns.len(), 9);
            assert!(columns.contains(&"Contato Realizado".to_string()));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
