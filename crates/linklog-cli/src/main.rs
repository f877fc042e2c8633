//! LinkLog CLI - save profile snapshots and keep them synced to the sheet

mod cli;
mod commands;
mod config;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::export::run_export;
use crate::commands::flush::run_flush;
use crate::commands::run::run_daemon;
use crate::commands::save::{run_save, SaveInput};
use crate::commands::status::{run_index, run_queue, run_status};
use crate::commands::test_connection::run_test_connection;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linklog=info,linklog_core=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = Context::resolve(cli.state_path, cli.config)?;

    match cli.command {
        Commands::Save {
            url,
            name,
            title,
            company,
            requested_at,
            follow_up,
            tag,
            notes,
            json,
        } => {
            let input = SaveInput {
                url,
                name,
                title,
                company,
                requested_at,
                follow_up,
                tag,
                notes,
                json,
            };
            run_save(input, &context).await?;
        }
        Commands::Flush { json } => {
            run_flush(json, &context).await?;
        }
        Commands::Run => run_daemon(&context).await?,
        Commands::Status { json } => run_status(json, &context)?,
        Commands::Queue { json } => run_queue(json, &context)?,
        Commands::Index { json } => run_index(json, &context)?,
        Commands::Export { output } => run_export(output.as_deref(), &context)?,
        Commands::Test => run_test_connection(&context).await?,
        Commands::Config { command } => run_config(command, &context)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
