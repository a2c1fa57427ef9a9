//! Read-only view over the CRM export tab used to pre-fill letters.

use serde::Serialize;

use super::store::SnapshotRow;
use crate::pricing::PricingCatalog;

pub const CAMPUS: &str = "Unidade";
pub const NAME: &str = "Nome do Candidato";
pub const CONTACT_ID: &str = "Contato ID";
pub const STATUS: &str = "Status do Contato";
pub const CONTACTED: &str = "Contato Realizado";
pub const NOTES: &str = "Observações";
pub const PHONE: &str = "Celular Tratado";
pub const GUARDIAN: &str = "Nome";
pub const EMAIL: &str = "E-mail";
pub const PROGRAM: &str = "Turma de Interesse - Geral";
pub const SOURCE: &str = "Fonte original";

/// Columns the tab must carry before it can be read.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    CAMPUS, NAME, CONTACT_ID, STATUS, CONTACTED, NOTES, PHONE, GUARDIAN, EMAIL, PROGRAM, SOURCE,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    #[serde(rename = "Unidade")]
    pub campus: String,
    #[serde(rename = "Nome do Candidato")]
    pub name: String,
    #[serde(rename = "Contato ID")]
    pub contact_id: String,
    #[serde(rename = "Status do Contato")]
    pub status: String,
    #[serde(rename = "Contato realizado")]
    pub contacted: String,
    #[serde(rename = "Observações")]
    pub notes: String,
    #[serde(rename = "Celular Tratado")]
    pub phone: String,
    #[serde(rename = "Nome")]
    pub guardian: String,
    #[serde(rename = "E-mail")]
    pub email: String,
    #[serde(rename = "Turma de Interesse - Geral")]
    pub program: String,
    #[serde(rename = "Fonte original")]
    pub source: String,
    /// Class a letter should be issued for, derived from the program.
    pub class_of_interest: Option<String>,
}

impl Candidate {
    pub fn from_row(row: &SnapshotRow, catalog: &PricingCatalog) -> Self {
        let text = |column: &str| row.get(column).trim().to_string();
        let program = text(PROGRAM);
        let class_of_interest = catalog.class_for_program(&program).map(str::to_string);
        Self {
            campus: text(CAMPUS),
            name: text(NAME),
            contact_id: text(CONTACT_ID),
            status: text(STATUS),
            contacted: text(CONTACTED),
            notes: text(NOTES),
            phone: text(PHONE),
            guardian: text(GUARDIAN),
            email: text(EMAIL),
            program,
            source: text(SOURCE),
            class_of_interest,
        }
    }
}
