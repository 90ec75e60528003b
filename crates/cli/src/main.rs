//! Reflexion CLI — the main entry point.
//!
//! Commands:
//! - `ask`      — Run one reflexion loop on a question
//! - `serve`    — Start the HTTP gateway
//! - `doctor`   — Diagnose configuration and credentials
//! - `onboard`  — Write the default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reflexion",
    about = "Reflexion — a research agent that drafts, searches, and revises its own answers",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The question to research
        question: String,

        /// Print the step trace after the answer
        #[arg(long)]
        trace: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose configuration and credentials
    Doctor,

    /// Initialize the configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask { question, trace, json } => commands::ask::run(question, trace, json).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
