mod commands;
mod config;
mod database;
mod engine;
mod error;
mod source;
mod utils;

use anyhow::Result;
use clap::Parser;
use commands::Cli;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::format::format_error_message;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "attendance_deviation=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    if let Err(e) = commands::run(cli, config).await {
        tracing::error!("Command failed: {:?}", e);
        eprintln!("{}", format_error_message(&format!("{:#}", e)));
        std::process::exit(1);
    }

    Ok(())
}
