//! medfabric-annotate - annotation consensus service
//!
//! `serve` runs the HTTP API, `ingest` loads a corpus manifest and `scan`
//! runs one conflict scan after an annotation round closes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medfabric_common::config::{self, TomlConfig};
use medfabric_common::db::init::init_database;
use medfabric_common::events::EventBus;
use medfabric_annotate::services::audit::spawn_audit_observer;
use medfabric_annotate::services::{IngestManifest, RootFolderLocator};
use medfabric_annotate::{build_router, AnnotationEngine, AppState};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(version, about = "MedFabric annotation consensus engine")]
struct Args {
    /// Root folder holding the database and image data
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "MEDFABRIC_PORT")]
        port: Option<u16>,
    },
    /// Load patients, image sets and images from a JSON manifest
    Ingest {
        manifest: PathBuf,
    },
    /// Run one conflict scan and print the report
    Scan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load(args.config.as_deref()).context("Failed to load config")?;

    let log_file = match &toml_config.logging.file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        ),
        None => None,
    };
    let stdout_layer = log_file.is_none().then(tracing_subscriber::fmt::layer);
    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!(
        "Starting MedFabric Annotate (medfabric-annotate) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path).await?;

    let event_bus = EventBus::new(256);
    let engine = AnnotationEngine::new(
        pool,
        event_bus.clone(),
        toml_config.criterion.clone(),
        toml_config.assignment.clone(),
        Arc::new(RootFolderLocator::for_root_folder(&root_folder)),
    );

    let audit = toml_config
        .audit
        .enabled
        .then(|| spawn_audit_observer(&event_bus, root_folder.join(&toml_config.audit.file)));
    // The engine keeps its own handle; the observer stops once the engine is gone
    drop(event_bus);

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let port = port.unwrap_or(toml_config.port);
            let app = build_router(AppState::new(engine));

            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
            info!("medfabric-annotate listening on http://127.0.0.1:{}", port);
            info!("Health check: http://127.0.0.1:{}/health", port);

            axum::serve(listener, app).await?;
        }
        Command::Ingest { manifest } => {
            let content = tokio::fs::read_to_string(&manifest)
                .await
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let manifest = IngestManifest::from_json(&content)?;
            let summary = engine.ingest_manifest(&manifest).await?;
            drop(engine);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Scan => {
            let report = engine.run_conflict_scan().await?;
            drop(engine);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(handle) = audit {
        handle.await?;
    }

    Ok(())
}
