//! # rastserve
//!
//! An image server that delivers on-demand scaled, cropped and rotated
//! views of raster images held at multiple pre-rendered resolutions.
//!
//! The image corpus lives in several parallel base directories (resolution
//! roots), highest resolution first. The same logical path can resolve to
//! files in any of them; all variants of one logical image form a
//! resolution set the server selects from per request.
//!
//! ## Architecture
//!
//! - [`geom`] - size and rectangle value types
//! - [`store`] - the concurrent directory/resolution cache
//! - [`plan`] - the request-to-transform geometry pipeline
//! - [`worker`] - the admission-controlled transform pool
//! - [`backend`] - the pixel backend seam and its `image`-crate implementation
//! - [`server`] - Axum-based HTTP server, routes and authorization
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rastserve::{
//!     create_router, AppState, DirectoryCache, FileClass, PlannerConfig,
//!     RasterBackend, RouterConfig, TransformPool,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(DirectoryCache::new(
//!         vec!["/data/images".into(), "/data/images-small".into()],
//!         FileClass::Image,
//!     ));
//!     let backend = Arc::new(RasterBackend::new());
//!     let pool = Arc::new(TransformPool::new(backend.clone(), 4, 20));
//!     let state = AppState::new(cache, backend, pool, PlannerConfig::default());
//!     let router = create_router(state, RouterConfig::default());
//!
//!     // Bind and serve...
//!     let _ = router;
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod geom;
pub mod plan;
pub mod server;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use backend::{
    CropRect, ImageBackend, ImageInfo, RasterBackend, ScaleQuality, TransformJob, TransformOutput,
};
pub use config::Config;
pub use error::{BackendError, PlanError, ScaleError};
pub use geom::{ImageSize, Rect};
pub use plan::{
    plan, OutputFormat, Plan, PlannerConfig, ResolutionPreference, ScaleMode, ScaleRequest,
    SendMode,
};
pub use server::{
    create_router, AppState, AuthError, AuthRules, ErrorResponse, HealthResponse, RouterConfig,
    ScaleQueryParams, StatsResponse,
};
pub use store::{
    is_mime_servable, mime_for_extension, parent_path, CacheCounters, DirectoryCache,
    DirectoryEntry, FileClass, FileEntry, ImageVariant, OtherFile, ResolutionSet, ScanRoots,
};
pub use worker::TransformPool;
