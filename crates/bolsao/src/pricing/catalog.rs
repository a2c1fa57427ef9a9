use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog-2026.json");

/// Reference data behind every price, discount, and campus rule.
///
/// Tuition values have changed between releases, so the catalog is versioned
/// and loaded from a single JSON document instead of living in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingCatalog {
    pub version: String,
    pub scoring: ScoringRules,
    pub formula: InstallmentFormula,
    pub tuition: BTreeMap<String, TuitionProgram>,
    pub classes_of_interest: Vec<ClassOfInterest>,
    pub campuses: Vec<Campus>,
    #[serde(default)]
    pub price_list: Vec<PriceListEntry>,
    pub course_materials: CourseMaterials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub subject_max: u8,
    pub max_total: u32,
    pub early_years_program: String,
    pub early_years_subject_max: u8,
    pub early_years_max_total: u32,
    pub default_discount: f64,
    pub discount_table: BTreeMap<u32, f64>,
}

/// Parameters of the chain that turns the 13th-installment value into the
/// first installment, the monthly installment, and the annual total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentFormula {
    pub base_divisor: f64,
    pub monthly_markup: f64,
    pub installments: u32,
    pub upfront_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuitionProgram {
    pub annual_list: f64,
    pub installment_13: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassOfInterest {
    pub class: String,
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campus {
    pub short_name: String,
    pub full_name: String,
    pub max_discount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListEntry {
    pub course: String,
    pub grade: String,
    pub first_installment: f64,
    pub monthly_installment: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRow {
    pub course: String,
    pub total: String,
    pub installments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMaterials {
    pub title: String,
    pub standard: Vec<MaterialRow>,
    pub general: Vec<MaterialRow>,
    pub military: Vec<MaterialRow>,
    #[serde(default)]
    pub campus_overrides: BTreeMap<String, MaterialOverride>,
}

/// Campus-specific course-material table. `replace` swaps the standard table
/// out entirely; otherwise rows patch the standard table by course name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialOverride {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub replace: bool,
    pub rows: Vec<MaterialRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read pricing catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("pricing catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("pricing catalog rejected: {0}")]
    Invalid(String),
}

impl PricingCatalog {
    /// The catalog compiled into the crate.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CATALOG).expect("built-in pricing catalog is valid")
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: PricingCatalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut previous = 0.0_f64;
        for (total, fraction) in &self.scoring.discount_table {
            if !(0.0..=1.0).contains(fraction) {
                return Err(CatalogError::Invalid(format!(
                    "discount for {total} correct answers is outside [0, 1]"
                )));
            }
            if *fraction < previous {
                return Err(CatalogError::Invalid(format!(
                    "discount table decreases at {total} correct answers"
                )));
            }
            previous = *fraction;
        }

        if !(0.0..=1.0).contains(&self.scoring.default_discount) {
            return Err(CatalogError::Invalid(
                "default discount is outside [0, 1]".to_string(),
            ));
        }

        if let Some(campus) = self
            .campuses
            .iter()
            .find(|campus| !(0.0..=1.0).contains(&campus.max_discount))
        {
            return Err(CatalogError::Invalid(format!(
                "maximum discount for {} is outside [0, 1]",
                campus.short_name
            )));
        }

        if self.formula.base_divisor <= 0.0 || self.formula.installments == 0 {
            return Err(CatalogError::Invalid(
                "installment formula needs a positive divisor and installment count".to_string(),
            ));
        }

        if let Some(orphan) = self
            .classes_of_interest
            .iter()
            .find(|entry| !self.tuition.contains_key(&entry.program))
        {
            return Err(CatalogError::Invalid(format!(
                "class '{}' points at unknown program '{}'",
                orphan.class, orphan.program
            )));
        }

        Ok(())
    }

    pub fn program(&self, name: &str) -> Option<&TuitionProgram> {
        self.tuition.get(name)
    }

    pub fn program_names(&self) -> impl Iterator<Item = &str> {
        self.tuition.keys().map(String::as_str)
    }

    pub fn is_early_years(&self, program: &str) -> bool {
        program == self.scoring.early_years_program
    }

    pub fn program_for_class(&self, class: &str) -> Option<&str> {
        self.classes_of_interest
            .iter()
            .find(|entry| entry.class == class)
            .map(|entry| entry.program.as_str())
    }

    /// First class of interest advertised for a program, used to pre-fill
    /// forms from data that only carries the program.
    pub fn class_for_program(&self, program: &str) -> Option<&str> {
        self.classes_of_interest
            .iter()
            .find(|entry| entry.program == program)
            .map(|entry| entry.class.as_str())
    }

    pub fn campus(&self, short_name: &str) -> Option<&Campus> {
        self.campuses
            .iter()
            .find(|campus| campus.short_name == short_name)
    }

    pub fn campus_by_full_name(&self, full_name: &str) -> Option<&Campus> {
        self.campuses
            .iter()
            .find(|campus| campus.full_name == full_name)
    }

    /// Short campus names in display order.
    pub fn campus_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .campuses
            .iter()
            .map(|campus| campus.short_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn max_discount(&self, short_name: &str) -> Option<f64> {
        self.campus(short_name).map(|campus| campus.max_discount)
    }

    pub fn price_list(&self, course: Option<&str>) -> Vec<&PriceListEntry> {
        self.price_list
            .iter()
            .filter(|entry| course.map_or(true, |wanted| entry.course == wanted))
            .collect()
    }

    pub fn price_list_courses(&self) -> Vec<&str> {
        let mut courses: Vec<&str> = self
            .price_list
            .iter()
            .map(|entry| entry.course.as_str())
            .collect();
        courses.sort_unstable();
        courses.dedup();
        courses
    }
}

impl CourseMaterials {
    /// Title and rows of the campus's own course-material table.
    pub fn table_for(&self, campus: &str) -> (String, Vec<MaterialRow>) {
        match self.campus_overrides.get(campus) {
            Some(over) if over.replace => (
                over.title.clone().unwrap_or_else(|| self.title.clone()),
                over.rows.clone(),
            ),
            Some(over) => {
                let mut rows = self.standard.clone();
                for patch in &over.rows {
                    match rows.iter_mut().find(|row| row.course == patch.course) {
                        Some(row) => *row = patch.clone(),
                        None => rows.push(patch.clone()),
                    }
                }
                (over.title.clone().unwrap_or_else(|| self.title.clone()), rows)
            }
            None => (self.title.clone(), self.standard.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads_and_validates() {
        let catalog = PricingCatalog::builtin();
        assert_eq!(catalog.scoring.discount_table.len(), 25);
        assert_eq!(catalog.campuses.len(), 10);
        assert_eq!(catalog.tuition.len(), 15);
        assert_eq!(catalog.program_for_class("Pré-Militar ESA"), Some("ESA"));
        assert_eq!(
            catalog.class_for_program("1º ao 5º Ano"),
            Some("1º ano do EF1")
        );
    }

    #[test]
    fn campus_names_are_sorted() {
        let catalog = PricingCatalog::builtin();
        let names = catalog.campus_names();
        assert_eq!(names.first(), Some(&"BANGU"));
        assert_eq!(names.last(), Some(&"TIJUCA"));
        assert_eq!(catalog.max_discount("RETIRO DOS ARTISTAS"), Some(0.50));
        assert_eq!(catalog.max_discount("NITERÓI"), None);
    }

    #[test]
    fn rejects_decreasing_discount_table() {
        let mut catalog = PricingCatalog::builtin();
        catalog.scoring.discount_table.insert(13, 0.10);
        let raw = serde_json::to_string(&catalog).expect("serializes");
        let err = PricingCatalog::from_json(&raw).expect_err("decreasing table rejected");
        assert!(err.to_string().contains("decreases at 13"));
    }

    #[test]
    fn price_list_filters_by_course() {
        let catalog = PricingCatalog::builtin();
        assert_eq!(catalog.price_list(None).len(), 24);
        assert_eq!(catalog.price_list(Some("PM")).len(), 5);
        assert_eq!(
            catalog.price_list_courses(),
            vec!["EFI", "EFII", "EM", "PM", "PV"]
        );
    }

    #[test]
    fn material_tables_follow_campus_overrides() {
        let materials = PricingCatalog::builtin().course_materials;

        let (title, rows) = materials.table_for("SÃO JOÃO DE MERITI");
        assert!(title.contains("exclusivo"));
        assert_eq!(rows[0].total, "R$ 1.933,56");

        let (title, rows) = materials.table_for("RETIRO DOS ARTISTAS");
        assert_eq!(title, "Material Didático");
        assert_eq!(rows.len(), materials.standard.len());

        let (_, rows) = materials.table_for("BANGU");
        assert_eq!(rows, materials.standard);
    }
}
