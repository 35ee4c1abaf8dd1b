use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use convo_trainer::auth::StaticTokenVerifier;
use convo_trainer::config::Config;
use convo_trainer::scenario::{ScenarioGraph, ScenarioSpec};
use convo_trainer::server::{router, AppState};
use convo_trainer::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(
    name = "convo-trainer",
    version,
    about = "Branching-dialogue server for conversation-training scenarios"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Load scenario fixtures into the database
    Seed {
        /// Fixtures directory (defaults to FIXTURES_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Convo Trainer starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Seed { dir } => {
            let dir = dir.unwrap_or_else(|| config.content.fixtures_dir.clone());
            seed_fixtures(&storage, &dir).await?;
        }
        Command::Serve => {
            let verifier = Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));
            let bind_addr = config.server.bind_addr.clone();
            let state = Arc::new(AppState::new(config, storage, verifier));

            let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
            info!(addr = %bind_addr, "Server listening");

            axum::serve(listener, router(state)).await?;
            info!("Server shutdown complete");
        }
    }

    Ok(())
}

/// Validate and load every `*.json` scenario fixture in a directory.
async fn seed_fixtures(storage: &SqliteStorage, dir: &Path) -> anyhow::Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("No scenario fixtures found in {}", dir.display());
    }

    for path in paths {
        let raw = std::fs::read_to_string(&path)?;
        let spec: ScenarioSpec = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        let graph = ScenarioGraph::load(spec)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        storage.seed_scenario(&graph).await?;
        info!(path = %path.display(), slug = %graph.slug, "Fixture loaded");
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        convo_trainer::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        convo_trainer::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
