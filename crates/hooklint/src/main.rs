//! hooklint CLI - webhook-triggered lint dispatcher.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hooklint::config::Config;
use hooklint::hook::HookEnvelope;
use hooklint::pipeline::Pipeline;
use hooklint::server::{self, AppState};

/// Webhook-triggered lint dispatcher.
#[derive(Parser)]
#[command(name = "hooklint")]
#[command(about = "Runs a linter on pushed commits and reports commit statuses")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve,

    /// Process a single hook envelope from a JSON file and exit
    Run {
        /// Path to the envelope JSON
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("hooklint=debug,info")
    } else {
        EnvFilter::new("hooklint=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = Config::from_env()?;
    let pipeline = Arc::new(Pipeline::new(config.clone())?);

    match cli.command {
        Commands::Serve => {
            let state = AppState {
                pipeline,
                webhook_secret: config.webhook_secret.clone(),
            };
            let app = server::build_router(state);

            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            let listener = TcpListener::bind(addr)
                .await
                .context("Failed to bind to address")?;

            info!(port = config.port, "hooklint listening");

            axum::serve(listener, app).await.context("Server error")?;
        }
        Commands::Run { event } => {
            let raw = tokio::fs::read(&event)
                .await
                .with_context(|| format!("Failed to read {}", event.display()))?;
            let envelope: HookEnvelope =
                serde_json::from_slice(&raw).context("Failed to parse hook envelope")?;

            pipeline.handle(&envelope).await;
        }
    }

    Ok(())
}
