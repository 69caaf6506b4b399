mod cli;
mod infra;
mod routes;
mod server;

use aval_manager::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
