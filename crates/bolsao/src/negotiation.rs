use serde::{Deserialize, Serialize};

use crate::pricing::{round2, PricingEngine};

/// How a negotiation is being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum NegotiationMode {
    /// Scholarship percentage in `0..=100`.
    Percentage(f64),
    /// Target monthly installment in reais.
    Installment(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegotiationOutcome {
    pub campus: String,
    pub program: String,
    pub minimum_payable: f64,
    pub full_monthly_installment: f64,
    pub resulting_installment: f64,
    pub discount: f64,
    /// Whole percentage to register when the simulation started from a value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_percentage: Option<u32>,
    pub below_minimum: bool,
}

impl NegotiationOutcome {
    pub fn warning(&self) -> Option<&'static str> {
        if self.below_minimum {
            Some("negotiated installment is below the campus minimum")
        } else {
            None
        }
    }
}

/// Guards negotiated prices against each campus's discount ceiling.
#[derive(Debug, Clone)]
pub struct NegotiationChecker {
    pricing: PricingEngine,
}

impl NegotiationChecker {
    pub fn new(pricing: PricingEngine) -> Self {
        Self { pricing }
    }

    /// Lowest monthly installment a campus may accept for a program.
    ///
    /// Zero when the campus has no ceiling or the program has no price.
    pub fn minimum_payable(&self, campus: &str, program: &str) -> f64 {
        let ceiling = self.pricing.catalog().max_discount(campus).unwrap_or(0.0);
        let annual_total = self.pricing.tuition_breakdown(program).annual_total;

        if annual_total > 0.0 && ceiling > 0.0 {
            annual_total * (1.0 - ceiling) / 12.0
        } else {
            0.0
        }
    }

    pub fn simulate(&self, campus: &str, program: &str, mode: NegotiationMode) -> NegotiationOutcome {
        let minimum_payable = self.minimum_payable(campus, program);
        let full_monthly_installment = self.pricing.tuition_breakdown(program).monthly_installment;

        let (resulting_installment, discount, suggested_percentage) = match mode {
            NegotiationMode::Percentage(percent) => {
                let discount = (percent / 100.0).clamp(0.0, 1.0);
                (
                    round2(full_monthly_installment * (1.0 - discount)),
                    discount,
                    None,
                )
            }
            NegotiationMode::Installment(value) => {
                let value = value.max(0.0);
                let discount = if full_monthly_installment > 0.0 {
                    (1.0 - value / full_monthly_installment).max(0.0)
                } else {
                    0.0
                };
                let suggested = (discount * 100.0).round() as u32;
                (round2(value), discount, Some(suggested))
            }
        };

        let below_minimum = resulting_installment < minimum_payable;
        if below_minimum {
            tracing::debug!(
                campus,
                program,
                resulting_installment,
                minimum_payable,
                "negotiation below campus minimum"
            );
        }

        NegotiationOutcome {
            campus: campus.to_string(),
            program: program.to_string(),
            minimum_payable,
            full_monthly_installment,
            resulting_installment,
            discount,
            suggested_percentage,
            below_minimum,
        }
    }
}
