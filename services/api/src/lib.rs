mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use bolsao::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
