use crate::commands::{
    run_candidates, run_letter, run_negotiate, run_prices, run_quote, run_records,
    CandidatesArgs, LetterArgs, NegotiateArgs, PricesArgs, QuoteArgs, RecordsArgs,
};
use crate::server;
use bolsao::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bolsao",
    about = "Price scholarship exam awards, issue letters and track follow-ups",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price the scholarship for an exam result
    Quote(QuoteArgs),
    /// Check a negotiated discount or installment against the campus minimum
    Negotiate(NegotiateArgs),
    /// Render an award letter, record it and write the PDF to disk
    Letter(LetterArgs),
    /// Print the reference price list
    Prices(PricesArgs),
    /// List award records for follow-up
    Records(RecordsArgs),
    /// List CRM candidates for a campus
    Candidates(CandidatesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args),
        Command::Quote(args) => run_quote(args),
        Command::Negotiate(args) => run_negotiate(args),
        Command::Letter(args) => run_letter(args),
        Command::Prices(args) => run_prices(args),
        Command::Records(args) => run_records(args),
        Command::Candidates(args) => run_candidates(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["bolsao"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn negotiate_requires_exactly_one_mode() {
        let both = Cli::try_parse_from([
            "bolsao",
            "negotiate",
            "--campus",
            "BANGU",
            "--program",
            "ESA",
            "--percentage",
            "30",
            "--installment",
            "900",
        ]);
        assert!(both.is_err());

        let neither =
            Cli::try_parse_from(["bolsao", "negotiate", "--campus", "BANGU", "--program", "ESA"]);
        assert!(neither.is_err());
    }

    #[test]
    fn quote_accepts_a_class_of_interest() {
        let cli = Cli::try_parse_from([
            "bolsao",
            "quote",
            "--class",
            "1ª série do EM - Pré-Vestibular",
            "--math",
            "8",
            "--portuguese",
            "7",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Quote(args)) => {
                assert_eq!(
                    args.class_of_interest.as_deref(),
                    Some("1ª série do EM - Pré-Vestibular")
                );
                assert_eq!(args.math, 8);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
