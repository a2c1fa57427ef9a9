//! Scholarship discounts and tuition installments.
//!
//! Everything here is pure: the same catalog and inputs always produce the
//! same numbers. Monetary values are rounded to cents at every derived field.

mod catalog;
pub mod money;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use catalog::{
    Campus, CatalogError, ClassOfInterest, CourseMaterials, InstallmentFormula, MaterialOverride,
    MaterialRow, PriceListEntry, PricingCatalog, ScoringRules, TuitionProgram,
};
pub use money::{format_brl, parse_brl, round2};

/// Correct answers in the two exam subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub math: u8,
    pub portuguese: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("{subject} score {found} exceeds the maximum of {max} for {program}")]
    AboveMaximum {
        subject: &'static str,
        found: u8,
        max: u8,
        program: String,
    },
}

impl ScoreEntry {
    /// Validates both counts against the program's per-subject maximum.
    pub fn new(
        catalog: &PricingCatalog,
        program: &str,
        math: u8,
        portuguese: u8,
    ) -> Result<Self, ScoreError> {
        let max = subject_maximum(catalog, program);
        for (subject, found) in [("math", math), ("portuguese", portuguese)] {
            if found > max {
                return Err(ScoreError::AboveMaximum {
                    subject,
                    found,
                    max,
                    program: program.to_string(),
                });
            }
        }
        Ok(Self { math, portuguese })
    }

    pub fn total(&self) -> u32 {
        u32::from(self.math) + u32::from(self.portuguese)
    }
}

pub fn subject_maximum(catalog: &PricingCatalog, program: &str) -> u8 {
    if catalog.is_early_years(program) {
        catalog.scoring.early_years_subject_max
    } else {
        catalog.scoring.subject_max
    }
}

/// Full-price or discounted installment plan for one program.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TuitionBreakdown {
    pub first_installment: f64,
    pub monthly_installment: f64,
    pub annual_total: f64,
}

impl TuitionBreakdown {
    /// An all-zero breakdown marks a program without a price.
    pub fn is_priced(&self) -> bool {
        self.annual_total > 0.0
    }
}

/// Multiplies every monetary field by `1 - discount`, rounding to cents.
pub fn apply_discount(breakdown: &TuitionBreakdown, discount: f64) -> TuitionBreakdown {
    let factor = 1.0 - discount.clamp(0.0, 1.0);
    TuitionBreakdown {
        first_installment: round2(breakdown.first_installment * factor),
        monthly_installment: round2(breakdown.monthly_installment * factor),
        annual_total: round2(breakdown.annual_total * factor),
    }
}

/// Everything a letter or simulator shows for one exam result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub program: String,
    pub score: ScoreEntry,
    pub total_correct: u32,
    pub discount: f64,
    pub full_price: TuitionBreakdown,
    pub discounted: TuitionBreakdown,
    /// Discounted annual total paid upfront in cash.
    pub upfront_annual: f64,
}

impl Quote {
    /// Whole-number percentage as printed on letters, e.g. `"50"`.
    pub fn discount_percent(&self) -> String {
        format!("{:.0}", self.discount * 100.0)
    }
}

/// Applies the catalog's scoring and tuition rules.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: Arc<PricingCatalog>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<PricingCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    pub fn discount_for_score(&self, total: u32, program: &str) -> f64 {
        let scoring = &self.catalog.scoring;
        if self.catalog.is_early_years(program) {
            return early_years_discount(total.min(scoring.early_years_max_total));
        }

        let clamped = total.min(scoring.max_total);
        scoring
            .discount_table
            .get(&clamped)
            .copied()
            .unwrap_or(scoring.default_discount)
    }

    pub fn tuition_breakdown(&self, program: &str) -> TuitionBreakdown {
        let base = match self.catalog.program(program) {
            Some(entry) if entry.installment_13 > 0.0 => entry.installment_13,
            _ => return TuitionBreakdown::default(),
        };

        let formula = &self.catalog.formula;
        let previous_year = round2(base / formula.base_divisor);
        let first_installment = previous_year;
        let monthly_installment = round2(previous_year * formula.monthly_markup);
        let annual_total = round2(
            first_installment + f64::from(formula.installments) * monthly_installment,
        );

        TuitionBreakdown {
            first_installment,
            monthly_installment,
            annual_total,
        }
    }

    pub fn upfront_annual(&self, discounted: &TuitionBreakdown) -> f64 {
        round2(discounted.annual_total * self.catalog.formula.upfront_factor)
    }

    pub fn quote(&self, program: &str, score: ScoreEntry) -> Quote {
        let total_correct = score.total();
        let discount = self.discount_for_score(total_correct, program);
        let full_price = self.tuition_breakdown(program);
        let discounted = apply_discount(&full_price, discount);
        let upfront_annual = self.upfront_annual(&discounted);

        Quote {
            program: program.to_string(),
            score,
            total_correct,
            discount,
            full_price,
            discounted,
            upfront_annual,
        }
    }
}

fn early_years_discount(total: u32) -> f64 {
    match total {
        0 => 0.0,
        1..=3 => 0.30,
        4..=5 => 0.50,
        6..=8 => 0.60,
        _ => 0.65,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERAL: &str = "Pré-Vestibular";
    const EARLY_YEARS: &str = "1º ao 5º Ano";

    fn engine() -> PricingEngine {
        PricingEngine::new(Arc::new(PricingCatalog::builtin()))
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.005,
            "expected {expected:.2}, found {actual:.4}"
        );
    }

    #[test]
    fn general_table_is_monotonic() {
        let engine = engine();
        let mut previous = 0.0;
        for total in 0..=24 {
            let discount = engine.discount_for_score(total, GENERAL);
            assert!(discount >= previous, "dropped at {total}");
            previous = discount;
        }
    }

    #[test]
    fn general_table_endpoints() {
        let engine = engine();
        assert_eq!(engine.discount_for_score(0, GENERAL), 0.30);
        assert_eq!(engine.discount_for_score(12, GENERAL), 0.50);
        assert_eq!(engine.discount_for_score(24, GENERAL), 1.00);
        assert_eq!(engine.discount_for_score(40, GENERAL), 1.00);
    }

    #[test]
    fn unknown_program_uses_general_table() {
        assert_eq!(engine().discount_for_score(21, "Curso Livre"), 0.65);
    }

    #[test]
    fn early_years_step_function() {
        let engine = engine();
        let expected = [
            (0, 0.0),
            (1, 0.30),
            (3, 0.30),
            (4, 0.50),
            (5, 0.50),
            (6, 0.60),
            (8, 0.60),
            (9, 0.65),
            (10, 0.65),
            (15, 0.65),
        ];
        for (total, discount) in expected {
            assert_eq!(engine.discount_for_score(total, EARLY_YEARS), discount);
        }
    }

    #[test]
    fn breakdown_follows_formula_chain() {
        let mut catalog = PricingCatalog::builtin();
        catalog.tuition.insert(
            "Reference".to_string(),
            TuitionProgram {
                annual_list: 13000.0,
                installment_13: 1000.0,
            },
        );
        let engine = PricingEngine::new(Arc::new(catalog));

        let breakdown = engine.tuition_breakdown("Reference");
        assert_close(breakdown.first_installment, 909.09);
        assert_close(breakdown.monthly_installment, 993.64);
        assert_close(breakdown.annual_total, 12832.77);
        assert_eq!(breakdown, engine.tuition_breakdown("Reference"));
    }

    #[test]
    fn unpriced_program_yields_zeros() {
        let engine = engine();
        let breakdown = engine.tuition_breakdown("Curso Livre");
        assert_eq!(breakdown, TuitionBreakdown::default());
        assert!(!breakdown.is_priced());
    }

    #[test]
    fn apply_discount_identity_and_full_waiver() {
        let breakdown = engine().tuition_breakdown(GENERAL);
        assert_eq!(apply_discount(&breakdown, 0.0), breakdown);
        assert_eq!(
            apply_discount(&breakdown, 1.0),
            TuitionBreakdown::default()
        );
    }

    #[test]
    fn quote_for_twelve_correct_answers() {
        let engine = engine();
        let score = ScoreEntry::new(engine.catalog(), GENERAL, 7, 5).expect("valid score");
        let quote = engine.quote(GENERAL, score);

        assert_eq!(quote.total_correct, 12);
        assert_eq!(quote.discount, 0.50);
        assert_eq!(quote.discount_percent(), "50");
        assert_close(
            quote.discounted.monthly_installment,
            quote.full_price.monthly_installment * 0.5,
        );
        assert_close(quote.upfront_annual, quote.discounted.annual_total * 0.95);
    }

    #[test]
    fn score_entry_respects_subject_maximum() {
        let catalog = PricingCatalog::builtin();
        assert!(ScoreEntry::new(&catalog, GENERAL, 12, 12).is_ok());
        let err = ScoreEntry::new(&catalog, EARLY_YEARS, 6, 2).expect_err("above maximum");
        assert_eq!(
            err,
            ScoreError::AboveMaximum {
                subject: "math",
                found: 6,
                max: 5,
                program: EARLY_YEARS.to_string(),
            }
        );
    }
}
