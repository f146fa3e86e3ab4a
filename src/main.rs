//! Tandem: multi-store action orchestration
//!
//! Entry point that builds the configured stores, wires them into an
//! orchestrator and runs one command against them.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use tandem_core::config::EngineSettings;
use tandem_core::error::AppError;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_configuration(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings);
    tracing::info!(dir = %cli.config, stores = settings.stores.len(), "Configuration loaded");

    if let Err(e) = cli.execute(settings).await {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

/// Load settings from the configuration directory and environment
fn load_configuration(dir: &str) -> Result<EngineSettings, AppError> {
    let env = std::env::var("TANDEM_ENV").unwrap_or_else(|_| "development".to_string());
    EngineSettings::load(dir, &env)
}

/// Initialize tracing/logging. Output goes to stderr so command results on
/// stdout stay machine-readable.
fn init_logging(settings: &EngineSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
