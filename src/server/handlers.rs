//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET /scale/{path}` - serve a scaled/cropped/rotated view of an image
//! - `GET /health` - health check
//! - `GET /stats` - directory cache counters

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backend::ImageBackend;
use crate::error::{PlanError, ScaleError};
use crate::plan::{plan, Plan, PlannerConfig, ScaleRequest};
use crate::store::DirectoryCache;
use crate::worker::TransformPool;

use super::auth::AuthRules;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to all handlers.
pub struct AppState<B: ImageBackend> {
    /// The process-wide directory cache
    pub cache: Arc<DirectoryCache>,

    /// The image backend for probes
    pub backend: Arc<B>,

    /// The admission-controlled transform pool
    pub pool: Arc<TransformPool<B>>,

    /// Planner behavior switches
    pub planner: PlannerConfig,

    /// Authorization rules; `None` disables checking
    pub auth: Option<Arc<AuthRules>>,
}

impl<B: ImageBackend> AppState<B> {
    pub fn new(
        cache: Arc<DirectoryCache>,
        backend: Arc<B>,
        pool: Arc<TransformPool<B>>,
        planner: PlannerConfig,
    ) -> Self {
        Self {
            cache,
            backend,
            pool,
            planner,
            auth: None,
        }
    }

    /// Enable authorization checking.
    pub fn with_auth(mut self, auth: AuthRules) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }
}

impl<B: ImageBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            backend: Arc::clone(&self.backend),
            pool: Arc::clone(&self.pool),
            planner: self.planner.clone(),
            auth: self.auth.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters of a scale request.
///
/// Field names and defaults follow the classic scaler parameter set; the
/// `mo` parameter is a comma-separated operation option list.
#[derive(Debug, Deserialize)]
pub struct ScaleQueryParams {
    /// 1-based file number within a directory
    #[serde(default = "default_index")]
    pub pn: usize,

    /// Destination width (0 = derive from aspect)
    #[serde(default)]
    pub dw: u32,

    /// Destination height (0 = derive from aspect)
    #[serde(default)]
    pub dh: u32,

    /// Relative window offset (0..1)
    #[serde(default)]
    pub wx: f64,

    #[serde(default)]
    pub wy: f64,

    /// Relative window extent (0..1)
    #[serde(default = "default_unit")]
    pub ww: f64,

    #[serde(default = "default_unit")]
    pub wh: f64,

    /// Additional scale factor
    #[serde(default = "default_unit")]
    pub ws: f64,

    /// Rotation angle in degrees
    #[serde(default)]
    pub rot: f64,

    /// Contrast adjustment exponent
    #[serde(default)]
    pub cont: f32,

    /// Brightness offset
    #[serde(default)]
    pub brgt: f32,

    /// Per-channel multipliers as "r/g/b"
    #[serde(default)]
    pub rgbm: Option<String>,

    /// Per-channel offsets as "r/g/b"
    #[serde(default)]
    pub rgba: Option<String>,

    /// Display resolution (both axes)
    #[serde(default)]
    pub ddpi: f64,

    #[serde(default)]
    pub ddpix: f64,

    #[serde(default)]
    pub ddpiy: f64,

    /// Absolute scale factor for `mo=ascale`
    #[serde(default = "default_unit")]
    pub scale: f64,

    /// Comma-separated operation options
    #[serde(default)]
    pub mo: Option<String>,
}

fn default_index() -> usize {
    1
}

fn default_unit() -> f64 {
    1.0
}

impl ScaleQueryParams {
    /// Build the structured request for a logical path.
    pub fn into_request(self, path: String) -> ScaleRequest {
        let mut req = ScaleRequest::new(path);
        req.index = self.pn;
        req.dw = self.dw;
        req.dh = self.dh;
        req.wx = self.wx;
        req.wy = self.wy;
        req.ww = self.ww;
        req.wh = self.wh;
        req.ws = self.ws;
        req.rotation = self.rot;
        req.contrast = self.cont;
        req.brightness = self.brgt;
        req.rgb_multiply = self.rgbm.as_deref().and_then(parse_rgb);
        req.rgb_add = self.rgba.as_deref().and_then(parse_rgb);
        // per-axis display DPI falls back to the combined parameter
        req.ddpi_x = if self.ddpix > 0.0 { self.ddpix } else { self.ddpi };
        req.ddpi_y = if self.ddpiy > 0.0 { self.ddpiy } else { self.ddpi };
        req.abs_scale = self.scale;
        if let Some(mo) = &self.mo {
            req.apply_options(mo);
        }
        req
    }
}

/// Parse an "r/g/b" triple; "0/0/0" means "not set".
fn parse_rgb(raw: &str) -> Option<[f32; 3]> {
    if raw == "0/0/0" {
        return None;
    }
    let mut parts = raw.split('/').map(|p| p.trim().parse::<f32>());
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    Some([r, g, b])
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g. "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Directory cache counters.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Cached directory entries
    pub directories: usize,

    /// Approximate indexed file count
    pub files: usize,

    pub hits: usize,

    pub misses: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Cache statistics endpoint.
pub async fn stats_handler<B: ImageBackend>(
    State(state): State<AppState<B>>,
) -> Json<StatsResponse> {
    let counters = state.cache.counters();
    Json(StatsResponse {
        directories: state.cache.size(),
        files: counters.files(),
        hits: counters.hits(),
        misses: counters.misses(),
    })
}

/// The scaler endpoint.
pub async fn scale_handler<B: ImageBackend>(
    State(state): State<AppState<B>>,
    Path(path): Path<String>,
    Query(params): Query<ScaleQueryParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let client = addr.ip().to_string();
    info!("GET {} from [{}]", path, client);

    // authorization
    if let Some(rules) = &state.auth {
        if let Some(required) = rules.roles_for_path(&path, &client) {
            warn!("denied {} for [{}], requires {:?}", path, client, required);
            return error_response(
                StatusCode::FORBIDDEN,
                "unauthorized",
                "access to this path is restricted",
            );
        }
    }

    let request = params.into_request(path);

    // resolution and planning touch the disk; keep them off the runtime
    let planning_state = state.clone();
    let planning_request = request.clone();
    let planned = tokio::task::spawn_blocking(move || {
        let entry = planning_state
            .cache
            .get_file(&planning_request.path, planning_request.index)?;
        let set = entry.as_image()?;
        Some(plan(
            &planning_request,
            set,
            planning_state.backend.as_ref(),
            &planning_state.planner,
        ))
    })
    .await;

    let planned = match planned {
        Ok(Some(result)) => result,
        Ok(None) => {
            return scale_error_response(&ScaleError::NotFound {
                path: request.path.clone(),
                index: request.index,
            })
        }
        Err(e) => {
            error!("planning task failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "planning failed",
            );
        }
    };

    match planned {
        Ok(Plan::SendFile { path, mime }) => match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!("sending {} as {}", path.display(), mime);
                image_response(data.into(), &mime)
            }
            Err(source) => scale_error_response(&ScaleError::SendFile {
                path: path.display().to_string(),
                source,
            }),
        },
        Ok(Plan::Transform(job)) => match state.pool.submit(job).await {
            Ok(output) => image_response(output.data, &output.mime),
            Err(e) => scale_error_response(&e),
        },
        Err(e) => scale_error_response(&ScaleError::Plan(e)),
    }
}

// =============================================================================
// Response Building
// =============================================================================

fn image_response(data: bytes::Bytes, mime: &str) -> Response {
    ([(header::CONTENT_TYPE, mime.to_string())], data).into_response()
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error, message))).into_response()
}

/// Map the error taxonomy onto distinct HTTP outcomes.
fn scale_error_response(err: &ScaleError) -> Response {
    match err {
        ScaleError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        ScaleError::Plan(PlanError::InvalidGeometry { .. }) => {
            error_response(StatusCode::BAD_REQUEST, "invalid_geometry", err.to_string())
        }
        ScaleError::Plan(PlanError::MissingMetadata(_)) => {
            error_response(StatusCode::BAD_REQUEST, "missing_metadata", err.to_string())
        }
        ScaleError::Overloaded => {
            warn!("rejecting request: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "10")],
                Json(ErrorResponse::new("overloaded", err.to_string())),
            )
                .into_response()
        }
        ScaleError::Plan(PlanError::Backend(_))
        | ScaleError::Backend(_)
        | ScaleError::SendFile { .. } => {
            error!("request failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "image_error", err.to_string())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rgb_triples() {
        assert_eq!(parse_rgb("1.0/0.5/0.25"), Some([1.0, 0.5, 0.25]));
        assert_eq!(parse_rgb("0/0/0"), None);
        assert_eq!(parse_rgb("garbage"), None);
        assert_eq!(parse_rgb("1/2"), None);
    }

    #[test]
    fn test_query_params_build_request() {
        let params = ScaleQueryParams {
            pn: 3,
            dw: 400,
            dh: 0,
            wx: 0.1,
            wy: 0.2,
            ww: 0.5,
            wh: 0.5,
            ws: 2.0,
            rot: 45.0,
            cont: 0.5,
            brgt: -5.0,
            rgbm: Some("1/0.5/1".to_string()),
            rgba: None,
            ddpi: 96.0,
            ddpix: 0.0,
            ddpiy: 120.0,
            scale: 0.5,
            mo: Some("lores,jpg".to_string()),
        };
        let req = params.into_request("book/p001".to_string());
        assert_eq!(req.index, 3);
        assert_eq!(req.dw, 400);
        assert_eq!(req.ws, 2.0);
        assert_eq!(req.rgb_multiply, Some([1.0, 0.5, 1.0]));
        // per-axis overrides the combined value, combined fills the gap
        assert_eq!(req.ddpi_x, 96.0);
        assert_eq!(req.ddpi_y, 120.0);
        assert_eq!(req.abs_scale, 0.5);
        assert_eq!(
            req.resolution,
            crate::plan::ResolutionPreference::Lores
        );
        assert_eq!(req.output, crate::plan::OutputFormat::Jpeg);
    }
}
