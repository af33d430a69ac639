use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use detectr_core::config::LogFormat;
use detectr_core::{
    create_identifier, load_config, validate_config, ArtifactStore, ClientIdentifier, Config,
    CooldownLimiter, Dispatcher, DispatcherConfig, ExternalInvoker, FsArtifactStore, Invoker,
    TransformRegistry,
};
use detectr_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("detectr: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("DETECTR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(config.logging.format);
    info!("Loaded configuration from {:?}", config_path);

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    // Artifact store
    let store = FsArtifactStore::new(&config.storage.root);
    store
        .validate()
        .await
        .with_context(|| format!("Storage root {:?} is not usable", config.storage.root))?;
    let store: Arc<dyn ArtifactStore> = Arc::new(store);
    info!(root = ?config.storage.root, "Artifact store ready");

    // Transform executable; a missing one is fatal at startup
    let invoker: Arc<dyn Invoker> = Arc::new(
        ExternalInvoker::new(&config.executor).context("Transform executable is not usable")?,
    );
    info!(
        executable = ?config.executor.executable_path,
        timeout_secs = config.executor.timeout_secs,
        max_concurrent = config.executor.max_concurrent,
        "Transform executable ready"
    );

    let limiter = Arc::new(CooldownLimiter::from_secs(config.rate_limit.window_secs));
    let registry = TransformRegistry::new(config.transforms.clone());
    info!(transforms = ?registry.names(), "Transform registry loaded");

    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig::from(&config),
        registry,
        Arc::clone(&limiter),
        Arc::clone(&store),
        invoker,
    ));

    let identifier: Arc<dyn ClientIdentifier> = Arc::from(create_identifier(&config.rate_limit));
    info!(method = identifier.method_name(), "Client identification configured");

    // Background maintenance
    let shutdown = CancellationToken::new();
    let maintenance = tokio::spawn(maintenance_loop(
        config.clone(),
        Arc::clone(&store),
        limiter,
        shutdown.clone(),
    ));

    let state = Arc::new(AppState::new(config.clone(), dispatcher, identifier));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    shutdown.cancel();
    let _ = maintenance.await;

    Ok(())
}

/// Periodically sweeps artifacts that escaped their scheduled cleanup and
/// prunes expired rate-limit records.
async fn maintenance_loop(
    config: Config,
    store: Arc<dyn ArtifactStore>,
    limiter: Arc<CooldownLimiter>,
    shutdown: CancellationToken,
) {
    let period = config.sweep_period();
    let max_age = config.sweep_max_age();
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match store.sweep_expired(max_age).await {
            Ok(report) if report.removed > 0 || !report.errors.is_empty() => {
                info!(
                    removed = report.removed,
                    errors = report.errors.len(),
                    "Swept expired artifacts"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Artifact sweep failed"),
        }

        let pruned = limiter.prune().await;
        if pruned > 0 {
            debug!(pruned, "Pruned rate limit records");
        }
    }
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
}
