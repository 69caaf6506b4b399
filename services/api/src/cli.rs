use crate::infra::parse_ttl;
use crate::server;
use aval_manager::config::StorageConfig;
use aval_manager::error::{ApiError, AppError};
use aval_manager::storage::{LinkIssuer, SignedLink, StorageError};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Aval Manager",
    about = "Run the guarantor management API and its maintenance commands",
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
    /// Work with the private document bucket
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },
}

#[derive(Subcommand, Debug)]
enum StorageCommand {
    /// Mint a proxy link for a stored object without starting the server
    Sign(SignArgs),
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

#[derive(Args, Debug)]
pub(crate) struct SignArgs {
    /// Object path, bucket-relative or a full storage URL
    #[arg(long)]
    pub(crate) path: String,
    /// Bucket holding the object (defaults to STORAGE_BUCKET)
    #[arg(long)]
    pub(crate) bucket: Option<String>,
    /// Link lifetime in seconds; clamped to between one minute and one day
    #[arg(long, value_parser = parse_ttl)]
    pub(crate) ttl: Option<i64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Storage {
            command: StorageCommand::Sign(args),
        } => sign_link(args),
    }
}

fn sign_link(args: SignArgs) -> Result<(), AppError> {
    let config = StorageConfig::from_env()?;
    let link = mint_link(&config, &args, Utc::now()).map_err(ApiError::from)?;
    match serde_json::to_string_pretty(&link) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{}", link.url),
    }
    Ok(())
}

pub(crate) fn mint_link(
    config: &StorageConfig,
    args: &SignArgs,
    now: DateTime<Utc>,
) -> Result<SignedLink, StorageError> {
    LinkIssuer::new(config).sign_at(args.bucket.as_deref(), &args.path, args.ttl, now)
}
