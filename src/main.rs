use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use loanq::catalog::{Catalog, InMemoryCatalog};
use loanq::config::Config;
use loanq::engine::Engine;
use loanq::limits::DRAIN_TIMEOUT;
use loanq::notify::NotifyHub;
use loanq::{scheduler, wire};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    loanq::observability::init(config.metrics_port)?;

    let catalog: Arc<dyn Catalog> = match &config.seed_file {
        Some(path) => Arc::new(InMemoryCatalog::from_seed_file(path)?),
        None => Arc::new(InMemoryCatalog::new()),
    };
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::bootstrap(catalog, notify, config.engine).await?);

    let reset_engine = engine.clone();
    let reset_hour = config.reset_hour_utc;
    tokio::spawn(async move {
        scheduler::run_daily_reset(reset_engine, reset_hour).await;
    });

    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("loanq listening on {addr}");
    info!("  notify_limit: {}", config.engine.notify_limit);
    info!("  daily reset: {:02}:00 UTC", config.reset_hour_utc);
    info!("  max_connections: {max_connections}");
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(loanq::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(loanq::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(loanq::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(loanq::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    info!("draining connections...");
    match wire::drain(&semaphore, max_connections, DRAIN_TIMEOUT).await {
        Ok(()) => info!("all connections drained"),
        Err(open) => tracing::warn!("drain timeout, {open} connections still open"),
    }

    info!("loanq stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM where available.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("SIGTERM handler unavailable: {e}"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}
