use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bolsao::config::AppConfig;
use bolsao::desk::brasilia_now;
use bolsao::error::AppError;
use bolsao::negotiation::{NegotiationChecker, NegotiationMode};
use bolsao::pricing::{format_brl, PricingEngine, ScoreEntry};
use bolsao::records::award::RecordSummary;
use bolsao::{DeskError, LetterRequest, RecordFilter};
use clap::Args;

use crate::infra::{build_desk, load_catalog, resolve_program};

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Class of interest as listed on the exam form
    #[arg(long = "class", required_unless_present = "program", conflicts_with = "program")]
    pub(crate) class_of_interest: Option<String>,
    /// Pricing program, when known directly
    #[arg(long)]
    pub(crate) program: Option<String>,
    /// Correct answers in mathematics
    #[arg(long)]
    pub(crate) math: u8,
    /// Correct answers in Portuguese
    #[arg(long)]
    pub(crate) portuguese: u8,
}

#[derive(Args, Debug)]
pub(crate) struct NegotiateArgs {
    /// Campus short name, e.g. BANGU
    #[arg(long)]
    pub(crate) campus: String,
    #[arg(long = "class", required_unless_present = "program", conflicts_with = "program")]
    pub(crate) class_of_interest: Option<String>,
    #[arg(long)]
    pub(crate) program: Option<String>,
    /// Scholarship percentage being offered
    #[arg(long, required_unless_present = "installment", conflicts_with = "installment")]
    pub(crate) percentage: Option<f64>,
    /// Monthly installment being offered, in reais
    #[arg(long)]
    pub(crate) installment: Option<f64>,
}

#[derive(Args, Debug)]
pub(crate) struct LetterArgs {
    /// Student full name
    #[arg(long)]
    pub(crate) student: String,
    /// Campus short name
    #[arg(long)]
    pub(crate) campus: String,
    #[arg(long = "class")]
    pub(crate) class_of_interest: String,
    #[arg(long)]
    pub(crate) math: u8,
    #[arg(long)]
    pub(crate) portuguese: u8,
    /// Staff member recorded as issuing the letter
    #[arg(long)]
    pub(crate) user: Option<String>,
    /// Directory the PDF is written to
    #[arg(long, default_value = ".")]
    pub(crate) output: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PricesArgs {
    /// Restrict the listing to one course (EFI, EFII, EM, PM, PV)
    #[arg(long)]
    pub(crate) course: Option<String>,
    /// Emit CSV instead of a table
    #[arg(long)]
    pub(crate) csv: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RecordsArgs {
    #[arg(long)]
    pub(crate) campus: Option<String>,
    #[arg(long)]
    pub(crate) cohort: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct CandidatesArgs {
    #[arg(long)]
    pub(crate) campus: String,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = Arc::new(load_catalog(&config)?);
    let program = resolve_program(
        &catalog,
        args.class_of_interest.as_deref(),
        args.program.as_deref(),
    )?;
    let score = ScoreEntry::new(&catalog, &program, args.math, args.portuguese)
        .map_err(DeskError::from)?;
    let quote = PricingEngine::new(catalog).quote(&program, score);

    println!("Program: {}", quote.program);
    println!(
        "Correct answers: {} (math {}, portuguese {})",
        quote.total_correct, quote.score.math, quote.score.portuguese
    );
    println!("Scholarship: {}%", quote.discount_percent());
    println!(
        "First installment: {} (list {})",
        format_brl(quote.discounted.first_installment),
        format_brl(quote.full_price.first_installment)
    );
    println!(
        "Monthly installment: {} (list {})",
        format_brl(quote.discounted.monthly_installment),
        format_brl(quote.full_price.monthly_installment)
    );
    println!("Upfront annual: {}", format_brl(quote.upfront_annual));
    Ok(())
}

pub(crate) fn run_negotiate(args: NegotiateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = Arc::new(load_catalog(&config)?);
    let campus = args.campus.trim();
    if catalog.campus(campus).is_none() {
        return Err(DeskError::UnknownCampus(campus.to_string()).into());
    }
    let program = resolve_program(
        &catalog,
        args.class_of_interest.as_deref(),
        args.program.as_deref(),
    )?;
    let mode = match (args.percentage, args.installment) {
        (Some(percentage), _) => NegotiationMode::Percentage(percentage),
        (None, Some(installment)) => NegotiationMode::Installment(installment),
        (None, None) => {
            return Err(AppError::BadRequest(
                "either --percentage or --installment is required".to_string(),
            ))
        }
    };

    let outcome =
        NegotiationChecker::new(PricingEngine::new(catalog)).simulate(campus, &program, mode);

    println!("{} / {}", outcome.campus, outcome.program);
    println!(
        "List monthly installment: {}",
        format_brl(outcome.full_monthly_installment)
    );
    println!(
        "Negotiated installment: {} ({:.0}% off)",
        format_brl(outcome.resulting_installment),
        outcome.discount * 100.0
    );
    if let Some(percentage) = outcome.suggested_percentage {
        println!("Register as: {percentage}%");
    }
    println!("Campus minimum: {}", format_brl(outcome.minimum_payable));
    if let Some(warning) = outcome.warning() {
        println!("WARNING: {warning}");
    }
    Ok(())
}

pub(crate) fn run_letter(args: LetterArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let desk = build_desk(&config)?;

    let request = LetterRequest {
        student: args.student,
        campus: args.campus,
        class_of_interest: args.class_of_interest,
        math: args.math,
        portuguese: args.portuguese,
        user: args.user,
    };
    let issued = desk.generate_letter(&request, brasilia_now())?;

    fs::create_dir_all(&args.output)?;
    let path = args.output.join(&issued.letter.file_name);
    fs::write(&path, &issued.letter.bytes)?;

    println!("Letter written to {}", path.display());
    println!(
        "Record {} | cohort {} | scholarship {}%",
        issued.record.id, issued.record.cohort, issued.record.discount_percent
    );
    if let Some(err) = issued.persist_error {
        println!("WARNING: the record was not saved: {err}");
    }
    Ok(())
}

pub(crate) fn run_prices(args: PricesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = load_catalog(&config)?;
    let entries = catalog.price_list(args.course.as_deref());

    if args.csv {
        let mut writer = csv::Writer::from_writer(io::stdout());
        for entry in entries {
            writer.serialize(entry).map_err(io::Error::other)?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("Price list {}", catalog.version);
    for entry in entries {
        println!(
            "  {:<5} {:<28} first {:>12}  monthly {:>12}",
            entry.course,
            entry.grade,
            format_brl(entry.first_installment),
            format_brl(entry.monthly_installment)
        );
    }
    Ok(())
}

pub(crate) fn run_records(args: RecordsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let desk = build_desk(&config)?;
    let listing = desk.records(&RecordFilter {
        campus: args.campus,
        cohort: args.cohort,
    })?;

    if listing.records.is_empty() {
        println!("No records found");
        return Ok(());
    }
    println!("Cohorts: {}", listing.cohorts.join(", "));
    for record in &listing.records {
        println!("{}", record_line(record));
    }
    Ok(())
}

/// The discount cell already carries its percent sign.
fn record_line(record: &RecordSummary) -> String {
    format!(
        "  {} | {} | {} | {} | {} | {}",
        record.id,
        record.student,
        record.cohort,
        record.created_at,
        record.discount,
        record.monthly_installment
    )
}

pub(crate) fn run_candidates(args: CandidatesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let desk = build_desk(&config)?;
    let candidates = desk.candidates(&args.campus)?;

    println!("{} candidates for {}", candidates.len(), args.campus.trim());
    for candidate in &candidates {
        println!(
            "  {} | {} | {} | {}",
            candidate.name,
            candidate.class_of_interest.as_deref().unwrap_or("-"),
            candidate.status,
            candidate.phone
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolsao::records::award::FollowUp;

    #[test]
    fn record_line_prints_the_discount_as_stored() {
        let record = RecordSummary {
            id: "a1b2c3d4e5f6".to_string(),
            row_number: 2,
            student: "Ana Maria Souza".to_string(),
            campus: "COLEGIO E CURSO MATRIZ EDUCAÇÃO BANGU".to_string(),
            cohort: "Bolsão Outubro".to_string(),
            created_at: "19/10/2026 14:30:00".to_string(),
            discount: "50%".to_string(),
            monthly_installment: "R$ 1.401,41".to_string(),
            follow_up: FollowUp::default(),
        };

        let line = record_line(&record);
        assert!(line.contains("| 50% |"));
        assert!(!line.contains("%%"));
    }
}
