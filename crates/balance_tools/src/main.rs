//! Combat Balance - Development Tools

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "balance-tools")]
#[command(about = "Development tools for combat balance data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "data")]
        path: String,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {path}");
            match balance_tools::validate::validate_data_directory(std::path::Path::new(&path)) {
                Ok(report) if report.is_valid() => tracing::info!(
                    "Validation passed: {} files, {} archetypes, {} templates",
                    report.files_checked,
                    report.archetypes,
                    report.templates
                ),
                Ok(report) => {
                    for issue in &report.issues {
                        tracing::error!("{}: {}", issue.path.display(), issue.message);
                    }
                    tracing::error!("Validation failed with {} issue(s)", report.issues.len());
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
