//! Capstan CLI - manage app definitions on a Capstan server

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod client;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set JSON output mode if requested
    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("capstan={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let ctx = Context {
        url: cli.url,
        api_key: cli.api_key,
    };

    // Handle commands
    let result = match cli.command {
        Commands::Health => health::execute(&ctx).await,
        Commands::Apps => apps::execute(&ctx).await,
        Commands::Show { app } => show::execute(&ctx, &app).await,
        Commands::Register(args) => register::execute(&ctx, args).await,
        Commands::Patch(args) => patch::execute(&ctx, args).await,
        Commands::Deploy(args) => deploy::execute(&ctx, args).await,
        Commands::Logs(args) => logs::execute(&ctx, args).await,
        Commands::Delete { app, yes } => delete::execute(&ctx, &app, yes).await,
        Commands::Projects(args) => projects::execute(&ctx, args).await,
    };

    if let Err(e) = result {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}
