//! Layout of the award results sheet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::{HeaderMap, SnapshotRow};
use crate::forms::format_phone_mask;
use crate::pricing::{format_brl, parse_brl};

pub mod columns {
    pub const ID: &str = "REGISTRO_ID";
    pub const TIMESTAMP: &str = "Data/Hora";
    pub const STUDENT: &str = "Nome do Aluno";
    pub const CAMPUS: &str = "Unidade";
    pub const CLASS: &str = "Turma de Interesse";
    pub const MATH: &str = "Acertos Matemática";
    pub const PORTUGUESE: &str = "Acertos Português";
    pub const TOTAL: &str = "Total de Acertos";
    pub const DISCOUNT: &str = "% Bolsa";
    pub const PROGRAM: &str = "Série / Modalidade";
    pub const UPFRONT: &str = "Valor Anuidade à Vista";
    pub const FIRST_INSTALLMENT: &str = "Valor da 1ª Cota";
    pub const MONTHLY: &str = "Valor da Mensalidade com Bolsa";
    pub const USER: &str = "Usuário";
    pub const COHORT: &str = "Bolsão";
    pub const SCHOOL: &str = "Escola de Origem";
    pub const NEGOTIATED: &str = "Valor Negociado";
    pub const GUARDIAN: &str = "Responsável Financeiro";
    pub const PHONE: &str = "Telefone";
    pub const ENROLLED: &str = "Aluno Matriculou?";
    pub const NOTES: &str = "Observações (Form)";
    pub const EXPECTED_MONTHLY: &str = "Expectativa de mensalidade";
    pub const EXPECTED_MONTHLY_FALLBACK: &str = "Valor Limite (PIA)";
}

/// Fresh record identifier: the first 12 hex digits of a v4 UUID.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// One generated letter as written to the results sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardRecord {
    pub id: String,
    pub created_at: String,
    pub student: String,
    pub campus: String,
    pub class_of_interest: String,
    pub math: u8,
    pub portuguese: u8,
    pub total: u32,
    pub discount_percent: String,
    pub program: String,
    pub upfront_annual: String,
    pub first_installment: String,
    pub monthly_installment: String,
    pub user: String,
    pub cohort: String,
}

impl AwardRecord {
    pub fn to_cells(&self) -> BTreeMap<String, Value> {
        let mut cells = BTreeMap::new();
        let mut put = |column: &str, value: Value| {
            cells.insert(column.to_string(), value);
        };
        put(columns::ID, Value::from(self.id.as_str()));
        put(columns::TIMESTAMP, Value::from(self.created_at.as_str()));
        put(columns::STUDENT, Value::from(self.student.as_str()));
        put(columns::CAMPUS, Value::from(self.campus.as_str()));
        put(columns::CLASS, Value::from(self.class_of_interest.as_str()));
        put(columns::MATH, Value::from(self.math));
        put(columns::PORTUGUESE, Value::from(self.portuguese));
        put(columns::TOTAL, Value::from(self.total));
        put(columns::DISCOUNT, Value::from(self.discount_percent.as_str()));
        put(columns::PROGRAM, Value::from(self.program.as_str()));
        put(columns::UPFRONT, Value::from(self.upfront_annual.as_str()));
        put(columns::FIRST_INSTALLMENT, Value::from(self.first_installment.as_str()));
        put(columns::MONTHLY, Value::from(self.monthly_installment.as_str()));
        put(columns::USER, Value::from(self.user.as_str()));
        put(columns::COHORT, Value::from(self.cohort.as_str()));
        cells
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Enrollment {
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "Sim")]
    Yes,
    #[serde(rename = "Não")]
    No,
}

impl Enrollment {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Yes => "Sim",
            Self::No => "Não",
        }
    }

    /// Lenient parse of the sheet cell; anything unrecognised is unknown.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sim" | "s" | "yes" => Self::Yes,
            "não" | "nao" | "n" | "no" => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// Follow-up fields as currently stored on a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FollowUp {
    pub school_of_origin: String,
    pub financial_guardian: String,
    pub phone: String,
    pub negotiated_value: f64,
    pub enrolled: Enrollment,
    pub notes: String,
    /// `None` when the sheet has no expected-monthly column.
    pub expected_monthly: Option<f64>,
}

/// An edit of the follow-up fields. Only the fields present are written;
/// an absent field keeps whatever the sheet already holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpForm {
    pub school_of_origin: Option<String>,
    pub financial_guardian: Option<String>,
    pub phone: Option<String>,
    pub negotiated_value: Option<f64>,
    pub enrolled: Option<Enrollment>,
    pub notes: Option<String>,
    pub expected_monthly: Option<f64>,
}

impl FollowUpForm {
    /// Cells to write. The expected monthly value is only written when the
    /// sheet has a column for it.
    pub fn to_cells(&self, expected_column: Option<&str>) -> BTreeMap<String, Value> {
        let mut cells = BTreeMap::new();
        let mut put = |column: &str, value: Option<Value>| {
            if let Some(value) = value {
                cells.insert(column.to_string(), value);
            }
        };

        let trimmed =
            |value: &Option<String>| value.as_deref().map(|text| Value::from(text.trim()));
        put(columns::SCHOOL, trimmed(&self.school_of_origin));
        put(columns::GUARDIAN, trimmed(&self.financial_guardian));
        put(
            columns::PHONE,
            self.phone.as_deref().map(|raw| Value::from(format_phone_mask(raw))),
        );
        put(
            columns::NEGOTIATED,
            self.negotiated_value.map(|value| Value::from(format_brl(value))),
        );
        put(
            columns::ENROLLED,
            self.enrolled.map(|enrolled| Value::from(enrolled.label())),
        );
        put(columns::NOTES, trimmed(&self.notes));
        if let Some(column) = expected_column {
            put(
                column,
                self.expected_monthly.map(|value| Value::from(format_brl(value))),
            );
        }
        cells
    }
}

/// Column holding the family's expected monthly value, if the sheet has one.
pub fn expected_monthly_column(headers: &HeaderMap) -> Option<&'static str> {
    [columns::EXPECTED_MONTHLY, columns::EXPECTED_MONTHLY_FALLBACK]
        .into_iter()
        .find(|name| headers.contains(name))
}

/// Columns read for the follow-up listing.
pub fn follow_up_columns(expected_column: Option<&'static str>) -> Vec<&'static str> {
    let mut names = vec![
        columns::ID,
        columns::STUDENT,
        columns::CAMPUS,
        columns::COHORT,
        columns::TIMESTAMP,
        columns::DISCOUNT,
        columns::MONTHLY,
        columns::SCHOOL,
        columns::NEGOTIATED,
        columns::GUARDIAN,
        columns::PHONE,
        columns::ENROLLED,
        columns::NOTES,
    ];
    names.extend(expected_column);
    names
}

/// A results-sheet row as shown in the follow-up listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub row_number: u32,
    pub student: String,
    pub campus: String,
    pub cohort: String,
    pub created_at: String,
    pub discount: String,
    pub monthly_installment: String,
    pub follow_up: FollowUp,
}

impl RecordSummary {
    pub fn from_row(row: &SnapshotRow, expected_column: Option<&str>) -> Self {
        let text = |column: &str| row.get(column).trim().to_string();
        Self {
            id: text(columns::ID),
            row_number: row.row_number,
            student: text(columns::STUDENT),
            campus: text(columns::CAMPUS),
            cohort: text(columns::COHORT),
            created_at: text(columns::TIMESTAMP),
            discount: text(columns::DISCOUNT),
            monthly_installment: text(columns::MONTHLY),
            follow_up: FollowUp {
                school_of_origin: text(columns::SCHOOL),
                financial_guardian: text(columns::GUARDIAN),
                phone: text(columns::PHONE),
                negotiated_value: parse_brl(row.get(columns::NEGOTIATED)),
                enrolled: Enrollment::parse(row.get(columns::ENROLLED)),
                notes: text(columns::NOTES),
                expected_monthly: expected_column.map(|column| parse_brl(row.get(column))),
            },
        }
    }
}
