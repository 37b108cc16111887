//! rastserve - an on-demand image scaling server.
//!
//! This binary starts the HTTP server and configures all components.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rastserve::{
    backend::RasterBackend,
    config::Config,
    server::{create_router, AppState, AuthRules, RouterConfig},
    store::{DirectoryCache, FileClass},
    worker::TransformPool,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "***** rastserve image scaler (version {}) *****",
        env!("CARGO_PKG_VERSION")
    );
    info!("Configuration:");
    for (i, dir) in config.base_dirs.iter().enumerate() {
        info!("  base dir {}: {}", i, dir.display());
    }
    info!(
        "  workers: {} running, {} queued",
        config.max_workers, config.max_queue
    );
    info!(
        "  quality: interpolation q{}, jpeg {}",
        config.default_quality, config.jpeg_quality
    );

    // the shared components: cache, backend, transform pool
    let cache = Arc::new(DirectoryCache::new(
        config.base_dirs.clone(),
        FileClass::Image,
    ));
    let backend = Arc::new(RasterBackend::new());
    let pool = Arc::new(TransformPool::new(
        backend.clone(),
        config.max_workers,
        config.max_queue,
    ));

    let mut state = AppState::new(cache, backend, pool, config.planner_config());

    match &config.auth_rules {
        Some(path) => match AuthRules::load(path) {
            Ok(rules) => {
                info!("  auth: rules from {}", path.display());
                state = state.with_auth(rules);
            }
            Err(e) => {
                error!("Cannot load authorization rules: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("  auth: DISABLED - all paths are publicly accessible");
        }
    }

    let router_config = RouterConfig {
        cors_origins: config.cors_origins.clone(),
        enable_tracing: !config.no_tracing,
    };
    let router = create_router(state, router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on http://{}", addr);
    info!("  try: curl 'http://{}/scale/<path>?dw=600'", addr);

    if let Err(e) = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "rastserve=debug,tower_http=debug"
    } else {
        "rastserve=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
