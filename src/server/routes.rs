//! Router assembly.
//!
//! # Route Structure
//!
//! ```text
//! /health              - health check
//! /stats               - directory cache counters
//! /scale/{*path}       - the scaler endpoint
//! ```

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::ImageBackend;

use super::handlers::{health_handler, scale_handler, stats_handler, AppState};

/// Router behavior switches.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (`None` = any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Emit per-request tracing spans
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
        }
    }
}

/// Build the application router.
pub fn create_router<B: ImageBackend>(state: AppState<B>, config: RouterConfig) -> Router {
    let cors = match &config.cors_origins {
        Some(origins) => {
            let origins: Vec<http::HeaderValue> = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET])
                .allow_headers([CONTENT_TYPE])
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET])
            .allow_headers([CONTENT_TYPE]),
    };

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler::<B>))
        .route("/scale/{*path}", get(scale_handler::<B>))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
