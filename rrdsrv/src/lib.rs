//! rrdsrv Service Library
//!
//! HTTP shell around the sanitization core: configuration, router, and the
//! handlers that turn a vetted query into an rrdtool invocation.

use std::sync::Arc;

use axum::{routing::get, Router};
use rrdsrv_core::RrdRoot;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod handlers;

pub use config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub root: Arc<RrdRoot>,
    pub config: Arc<ServerConfig>,
}

/// Build the service router. Shared between `main` and the integration
/// tests so both exercise the same routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let compress = state.config.compress;

    let router = Router::new()
        .route("/", get(handlers::index_handler))
        .route("/api/v1/ping", get(handlers::ping_handler))
        .route("/api/v1/xport", get(handlers::xport_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    if compress {
        router.layer(CompressionLayer::new())
    } else {
        router
    }
}
