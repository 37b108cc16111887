//! Axum-based HTTP server: routes, handlers and authorization.

pub mod auth;
mod handlers;
mod routes;

pub use auth::{AuthError, AuthRules};
pub use handlers::{
    health_handler, scale_handler, stats_handler, AppState, ErrorResponse, HealthResponse,
    ScaleQueryParams, StatsResponse,
};
pub use routes::{create_router, RouterConfig};
