//! Resolver runner: loads blocklists and presets, wires the query pipeline,
//! and runs the DoT and HTTP listeners until a shutdown signal arrives.

use std::future::Future;
use std::sync::Arc;

use sieve_core::{JsonPolicyStore, PolicyStore};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::dot::{load_acceptor, DotServer};
use crate::filter::{load_blocklists, FilteringEngine};
use crate::http::{self, AppState};
use crate::presets::PresetService;
use crate::processor::QueryProcessor;
use crate::upstream::{UpstreamResolver, UpstreamSelector};
use crate::SrvError;

/// Query pipeline and preset service built from configuration.
#[derive(Debug, Clone)]
pub struct Services {
    /// Shared by DoT and DoH.
    pub processor: QueryProcessor,
    /// Management API backend.
    pub presets: Arc<PresetService>,
    /// Upstream pool.
    pub upstreams: Arc<UpstreamSelector>,
}

/// Load blocklists and the preset store and wire the pipeline.
///
/// Invalid configuration, unreadable blocklists or a corrupt store fail here.
pub async fn build_services(config: &ServerConfig) -> crate::Result<Services> {
    config.validate()?;

    let trie = load_blocklists(&config.categories)?;
    let store: Arc<dyn PolicyStore> = Arc::new(JsonPolicyStore::open(&config.store.path).await?);

    let upstreams = Arc::new(UpstreamSelector::new(config.upstream_addrs()?));
    let resolver = UpstreamResolver::new(Arc::clone(&upstreams), config.upstream_timeout());

    let processor = QueryProcessor::new(
        FilteringEngine::new(Arc::new(trie), Arc::clone(&store)),
        ResponseCache::new(&config.cache),
        Arc::new(resolver),
    );
    let presets = Arc::new(PresetService::new(store, config.category_names()));

    Ok(Services {
        processor,
        presets,
        upstreams,
    })
}

/// Run until SIGINT or SIGTERM.
pub async fn run(config: ServerConfig) -> crate::Result<()> {
    run_until(config, shutdown_signal()).await
}

/// Run until `shutdown` completes or a listener fails.
pub async fn run_until<F>(config: ServerConfig, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let services = build_services(&config).await?;
    info!(
        upstreams = ?services.upstreams.list(),
        hostname = %config.hostname,
        "Resolver pipeline ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<crate::Result<()>> = JoinSet::new();

    if config.dot.enabled {
        match load_acceptor(&config.dot.cert_path, &config.dot.key_path) {
            Ok(acceptor) => {
                let dot = DotServer::new(
                    config.dot.clone(),
                    config.hostname.clone(),
                    acceptor,
                    services.processor.clone(),
                );
                let rx = shutdown_rx.clone();
                tasks.spawn(async move {
                    dot.run(rx).await;
                    Ok(())
                });
            }
            Err(e) => error!(error = %e, "Cannot load TLS certificate, DoT disabled"),
        }
    } else {
        info!("DoT disabled by configuration");
    }

    let listener = TcpListener::bind(config.http.listen)
        .await
        .map_err(|e| SrvError::Server(format!("HTTP bind {}: {e}", config.http.listen)))?;
    let state = AppState {
        processor: services.processor,
        presets: services.presets,
    };
    tasks.spawn(http::serve(listener, state, shutdown_rx));

    let outcome = tokio::select! {
        () = shutdown => {
            info!("Shutdown requested");
            Ok(())
        }
        Some(joined) = tasks.join_next() => {
            let result = flatten(joined);
            if let Err(e) = &result {
                error!(error = %e, "Listener exited");
            }
            result
        }
    };

    let _ = shutdown_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = flatten(joined) {
            warn!(error = %e, "Listener failed during shutdown");
        }
    }
    info!("Shutdown complete");
    outcome
}

/// Resolve once `shutdown` holds `true` or its sender is gone.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    tokio::select! {
        () = wait_for_sigint() => info!("Received SIGINT"),
        () = wait_for_sigterm() => info!("Received SIGTERM"),
    }
}

async fn wait_for_sigint() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}

fn flatten(joined: Result<crate::Result<()>, tokio::task::JoinError>) -> crate::Result<()> {
    joined.map_err(|e| SrvError::Server(format!("listener task failed: {e}")))?
}
