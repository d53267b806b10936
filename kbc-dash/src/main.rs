//! kbc-dash - knowledge-base-completion dashboard
//!
//! Runs the evaluation session orchestrator against a KBC backend, either
//! behind a local HTTP/SSE facade (`serve`) or headless from the command line.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbc_common::config::{self, CliOverrides, DashboardConfig};
use kbc_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kbc_dash::models::{EvaluationKey, OntologyFile};
use kbc_dash::services::{HttpBackend, KbcBackend};
use kbc_dash::session::{SessionOrchestrator, StageOutcome};
use kbc_dash::AppState;

/// Command-line arguments for kbc-dash
#[derive(Parser, Debug)]
#[command(name = "kbc-dash")]
#[command(about = "Knowledge-base-completion evaluation dashboard")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/kbc-ops/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URI of the KBC backend
    #[arg(long, global = true)]
    backend_uri: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard HTTP facade
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Upload, extract, train and evaluate in one go
    Pipeline {
        /// Ontology file (.owl)
        #[arg(short, long)]
        file: PathBuf,
        /// Ontology name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
        /// Owner alias
        #[arg(short, long)]
        alias: String,
        /// Embedding algorithm id
        #[arg(long, default_value = "owl2vec-star")]
        algorithm: String,
        /// Classifier id
        #[arg(long, default_value = "random-forest")]
        classifier: String,
    },

    /// Print stored evaluation stats
    Stats {
        #[arg(short, long)]
        ontology: String,
        #[arg(long)]
        algorithm: String,
        #[arg(long)]
        classifier: String,
    },

    /// List ontologies known to the backend
    Ontologies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_toml_config_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let bind = match &args.command {
        Command::Serve { bind } => bind.clone(),
        _ => None,
    };
    let cli = CliOverrides {
        backend_uri: args.backend_uri.clone(),
        bind_address: bind,
        log_level: args.log_level.clone(),
    };
    let config = DashboardConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;

    init_tracing(&config)?;

    info!("Starting kbc-dash v{}", env!("CARGO_PKG_VERSION"));
    let backend = Arc::new(
        HttpBackend::new(&config.backend_uri, config.request_timeout)
            .context("Failed to create backend client")?,
    );
    info!("Backend: {}", backend.base_url());

    match args.command {
        Command::Serve { .. } => serve(&config, backend).await,
        Command::Pipeline {
            file,
            name,
            alias,
            algorithm,
            classifier,
        } => run_pipeline(&config, backend, file, name, alias, algorithm, classifier).await,
        Command::Stats {
            ontology,
            algorithm,
            classifier,
        } => {
            let key = EvaluationKey::new(ontology, algorithm, classifier);
            let report = backend
                .evaluation_stats(&key)
                .await
                .with_context(|| format!("Evaluation stats for {} failed", key))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Ontologies => {
            let ontologies = backend
                .list_ontologies()
                .await
                .context("Listing ontologies failed")?;
            for ontology in ontologies {
                println!("{}", ontology);
            }
            Ok(())
        }
    }
}

/// Install the tracing subscriber
///
/// RUST_LOG takes precedence over the configured level. With a log file
/// configured, output goes to that file instead of stderr.
fn init_tracing(config: &DashboardConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level)));

    let (stderr_layer, file_layer) = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

async fn serve(config: &DashboardConfig, backend: Arc<HttpBackend>) -> Result<()> {
    let event_bus = EventBus::new(config.event_capacity);
    let orchestrator = SessionOrchestrator::new(backend, event_bus);
    orchestrator.init().await;

    let state = AppState::new(orchestrator, config.backend_uri.clone());
    let app = kbc_dash::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_pipeline(
    config: &DashboardConfig,
    backend: Arc<HttpBackend>,
    file: PathBuf,
    name: Option<String>,
    alias: String,
    algorithm: String,
    classifier: String,
) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let orchestrator = SessionOrchestrator::new(backend, EventBus::new(config.event_capacity));
    orchestrator.init().await;

    let mut outcome = orchestrator
        .upload(OntologyFile::new(file_name, bytes), &name, &alias)
        .await;
    if outcome == StageOutcome::Succeeded {
        orchestrator.select_algorithm(&algorithm).await;
        orchestrator.select_classifier(&classifier).await;
        outcome = orchestrator.run().await;
    }

    for notification in orchestrator.notifications().await {
        println!(
            "[{}] {}: {}",
            notification.sequence, notification.status, notification.message
        );
    }
    let snapshot = orchestrator.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    match outcome {
        StageOutcome::Succeeded => Ok(()),
        other => anyhow::bail!("Pipeline did not complete ({:?})", other),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
