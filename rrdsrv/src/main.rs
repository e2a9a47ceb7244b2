use anyhow::Result;
use rrdsrv::{config::ServerConfig, build_router, AppState};
use rrdsrv_core::RrdRoot;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Arc::new(ServerConfig::load()?);
    config.validate()?;
    info!("Loaded configuration: {:?}", config);

    // Resolve the rrd root once for the process lifetime; refuse to start
    // if it does not resolve to an existing directory.
    let root = Arc::new(
        RrdRoot::new(&config.rrd_root_path)
            .map_err(|e| anyhow::anyhow!("unable to resolve rrd root: {e}"))?,
    );
    info!("serving rrds under {}", root.path().display());

    let state = AppState {
        root,
        config: config.clone(),
    };

    let app = build_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_address).await?;
    let addr = listener.local_addr()?;
    info!("rrdsrv listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
