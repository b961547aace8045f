//! HTTP surface: DoH plus the preset management API.

pub mod api;
pub mod doh;
pub mod error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::presets::PresetService;
use crate::processor::QueryProcessor;
use crate::SrvError;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Query pipeline used by DoH.
    pub processor: QueryProcessor,
    /// Preset management.
    pub presets: Arc<PresetService>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/doh/{id}", get(doh::get_query).post(doh::post_query))
        .route(
            "/api/configurations",
            post(api::create_preset).get(api::list_presets),
        )
        .route(
            "/api/configurations/{id}",
            get(api::get_preset)
                .put(api::update_preset)
                .delete(api::delete_preset),
        )
        .route("/api/configurations/{id}/state", post(api::set_preset_state))
        .route("/health", get(api::health))
        .with_state(state)
}

/// Serve HTTP on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> crate::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "HTTP listener bound");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(crate::server::wait_for_shutdown(shutdown))
        .await
        .map_err(|e| SrvError::Server(format!("http server error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}
