mod api;
mod metrics;
mod registry;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courier_core::{
    converter::{Converter, FfmpegConverter},
    delivery::TelegramGateway,
    generation::HuggingFaceBackend,
    load_config,
    resolver::YtDlpResolver,
    validate_config, PhaseCallback, TaskOrchestrator, TaskPhase,
};

use api::create_router;
use registry::RequestRegistry;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("COURIER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&courier_core::SanitizedConfig::from(&config))
        .context("Failed to serialize config")?;
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        workspace = ?config.workspace.root,
        ceiling_bytes = config.delivery.ceiling_bytes,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.workspace.root).with_context(|| {
        format!(
            "Failed to create workspace root {:?}",
            config.workspace.root
        )
    })?;

    // Collaborators
    let resolver = Arc::new(YtDlpResolver::new(config.resolver.clone()));
    let converter = Arc::new(FfmpegConverter::new(config.converter.clone()));
    if let Err(e) = converter.validate().await {
        // Requests needing the transcoder fail until this is fixed.
        warn!(error = %e, "Transcoder unavailable at startup");
    }
    let gateway = Arc::new(
        TelegramGateway::new(config.telegram.clone())
            .context("Failed to create Telegram gateway")?,
    );
    let generator = Arc::new(
        HuggingFaceBackend::new(config.generation.clone())
            .context("Failed to create generation backend")?,
    );
    info!(
        models = config.generation.models.len(),
        "Generation backend initialized"
    );

    // Orchestrator, reporting phases into the registry
    let registry = Arc::new(RequestRegistry::new());
    let phases = Arc::clone(&registry);
    let phase_callback: PhaseCallback = Arc::new(move |request_id: &str, phase: TaskPhase| {
        phases.set_phase(request_id, phase);
    });
    let orchestrator = TaskOrchestrator::from_config(&config, resolver, converter, gateway, generator)
        .with_phase_callback(phase_callback);

    if config.server.max_concurrent_requests > 0 {
        info!(
            limit = config.server.max_concurrent_requests,
            "Request admission limit enabled"
        );
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, Arc::new(orchestrator), registry));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
