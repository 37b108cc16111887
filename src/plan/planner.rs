//! The request-to-transform geometry pipeline.
//!
//! Converts the relative user window of a [`ScaleRequest`] into absolute
//! pixel operations on the variant selected for the request:
//!
//! 1. compute the expected source size for the requested mode
//! 2. select the source variant from the resolution set
//! 3. short-circuit to raw delivery when the file can be sent as-is
//! 4. derive a missing destination dimension from the source aspect
//! 5. map the window into pixels of the selected variant
//! 6. optionally enlarge the crop to survive rotation, then clip to the
//!    image bounds
//! 7. reject degenerate geometry
//! 8. package everything as an immutable [`TransformJob`]

use std::path::PathBuf;

use tracing::{debug, info};

use crate::backend::{CropRect, ImageBackend, ScaleQuality, TransformJob};
use crate::error::PlanError;
use crate::geom::{ImageSize, Rect};
use crate::store::{is_mime_servable, ImageVariant, ResolutionSet};

use super::request::{OutputFormat, ResolutionPreference, ScaleMode, ScaleRequest, SendMode};

// =============================================================================
// Configuration
// =============================================================================

/// Planner behavior switches, from the service configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Enlarge crops to the bounding box of the rotated window so no
    /// corner is lost (experimental, off by default)
    pub whole_rot_area: bool,

    /// Allow `mo=file` / `mo=rawfile` raw delivery
    pub send_file_allowed: bool,

    /// Default interpolation quality level (0..=2)
    pub default_quality: u8,

    /// JPEG encode quality for transformed output
    pub jpeg_quality: u8,

    /// Upper bound on dw/dh (0 = unlimited)
    pub max_image_size: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            whole_rot_area: false,
            send_file_allowed: true,
            default_quality: 1,
            jpeg_quality: 80,
            max_image_size: 0,
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// The outcome of planning: stream a file unchanged, or transform.
#[derive(Debug)]
pub enum Plan {
    /// Stream the file's bytes back unchanged
    SendFile { path: PathBuf, mime: String },

    /// Run the pixel transform on the worker pool
    Transform(TransformJob),
}

// =============================================================================
// Planning
// =============================================================================

/// Plan the operations for one request against a resolution set.
///
/// `backend` is used for lazy size/metadata probes only; no pixel work
/// happens here.
pub fn plan(
    req: &ScaleRequest,
    set: &ResolutionSet,
    backend: &dyn ImageBackend,
    cfg: &PlannerConfig,
) -> Result<Plan, PlanError> {
    let mut dw = req.dw;
    let mut dh = req.dh;

    // clamp against the configured maximum output size
    if cfg.max_image_size > 0 {
        let max = f64::from(cfg.max_image_size);
        if f64::from(dw) * req.ws > max {
            dw = (max / req.ws) as u32;
        }
        if f64::from(dh) * req.ws > max {
            dh = (max / req.ws) as u32;
        }
    }

    let hires_only = req.resolution == ResolutionPreference::Hires
        || (req.resolution == ResolutionPreference::Auto
            && matches!(req.mode, ScaleMode::Clip | ScaleMode::OriginalSize));
    let lores_only = req.resolution == ResolutionPreference::Lores;

    // absolute scale factor, resolved against the hires variant
    let mut abs_factor = req.abs_scale;
    let mut hires_width = 0.0;
    let absolute = matches!(req.mode, ScaleMode::AbsoluteScale | ScaleMode::OriginalSize);
    if absolute {
        let hires_info = set.biggest().check(backend)?;
        hires_width = f64::from(hires_info.size.width);
        if req.mode == ScaleMode::OriginalSize {
            abs_factor = original_size_factor(req, set, backend)?;
        }
    }

    // expected source size for selection
    let expected = match req.mode {
        ScaleMode::Fit => {
            let min_win = req.ww.min(req.wh);
            let scale = if min_win > 0.0 {
                (1.0 / min_win) * req.ws
            } else {
                req.ws
            };
            ImageSize::new(
                (f64::from(dw) * scale) as u32,
                (f64::from(dh) * scale) as u32,
            )
        }
        ScaleMode::AbsoluteScale => set_biggest_size(set).scaled(abs_factor),
        ScaleMode::Clip | ScaleMode::OriginalSize => ImageSize::new(
            (f64::from(dw) * req.ws) as u32,
            (f64::from(dh) * req.ws) as u32,
        ),
    };

    // probe the set once so selection sees verified sizes
    set.check_all(backend);

    let selected: &ImageVariant = if hires_only {
        set.biggest()
    } else if lores_only {
        set.next_smaller(expected).unwrap_or_else(|| set.smallest())
    } else {
        set.next_bigger(expected).unwrap_or_else(|| set.biggest())
    };
    info!("planning to load {}", selected.path().display());

    // raw delivery bypasses the whole pipeline
    if req.send != SendMode::Normal && cfg.send_file_allowed {
        let mime = match req.send {
            SendMode::RawFile => "application/octet-stream".to_string(),
            _ => selected.mime().to_string(),
        };
        debug!("sending raw file as is");
        return Ok(Plan::SendFile {
            path: selected.path().to_path_buf(),
            mime,
        });
    }

    let info = selected.check(backend)?;
    let img_size = info.size;
    let src_mime = info.mime.clone();

    // send as-is: a natively servable file, no pixel operations requested,
    // and the selected variant already matches the expected source extent
    let no_pixel_ops = !req.mirror_horizontal
        && !req.mirror_vertical
        && req.rotation == 0.0
        && req.rgb_multiply.is_none()
        && req.rgb_add.is_none()
        && req.contrast == 0.0
        && req.brightness == 0.0;
    let auto_res = !lores_only && !hires_only;
    if is_mime_servable(&src_mime)
        && no_pixel_ops
        && ((lores_only && img_size.is_totally_smaller_than(expected))
            || ((auto_res || req.mode == ScaleMode::Clip) && img_size.fits_in(expected)))
    {
        debug!("sending file as is");
        return Ok(Plan::SendFile {
            path: selected.path().to_path_buf(),
            mime: src_mime,
        });
    }

    // fill in a missing destination dimension from the source aspect
    let aspect = selected.aspect();
    if dw == 0 {
        dw = (f64::from(dh) * aspect).round() as u32;
    } else if dh == 0 && aspect > 0.0 {
        dh = (f64::from(dw) / aspect).round() as u32;
    }

    // map the relative window into pixels of the selected variant
    let width = f64::from(img_size.width);
    let height = f64::from(img_size.height);
    let mut user_area = Rect::new(
        req.wx * width,
        req.wy * height,
        req.ww * width,
        req.wh * height,
    );

    let scale_xy: f64;
    match req.mode {
        ScaleMode::Fit => {
            let scale_x = f64::from(dw) / user_area.width * req.ws;
            let scale_y = f64::from(dh) / user_area.height * req.ws;
            scale_xy = scale_x.min(scale_y);
        }
        ScaleMode::AbsoluteScale | ScaleMode::OriginalSize => {
            let mut factor = abs_factor;
            // a prescaled variant needs the factor corrected back to hires
            if f64::from(img_size.width) != hires_width && img_size.width != 0 {
                factor *= hires_width / f64::from(img_size.width);
            }
            scale_xy = factor;
            user_area.width = f64::from(dw) / scale_xy * req.ws;
            user_area.height = f64::from(dh) / scale_xy * req.ws;
        }
        ScaleMode::Clip => {
            user_area.width = f64::from(dw) * req.ws;
            user_area.height = f64::from(dh) * req.ws;
            scale_xy = 1.0;
        }
    }

    // enlarge the crop for rotation so no corner is lost
    let mut inner_area: Option<Rect> = None;
    let mut outer_area = user_area;
    if cfg.whole_rot_area && req.rotation != 0.0 {
        let cx = user_area.center_x();
        let cy = user_area.center_y();
        let rotated = user_area.rotated_bounds(req.rotation, cx, cy);
        outer_area = rotated.rotated_bounds(-req.rotation, cx, cy);
        inner_area = Some(rotated);
    }

    // clip at the image border
    let outer_area = outer_area.intersection(Rect::from_size(img_size));

    debug!(
        "scale {:.4} on {:?} of {} ({})",
        scale_xy,
        outer_area,
        selected.path().display(),
        img_size
    );

    // sanity check against degenerate output
    if outer_area.width < 1.0
        || outer_area.height < 1.0
        || scale_xy * outer_area.width < 2.0
        || scale_xy * outer_area.height < 2.0
    {
        return Err(PlanError::InvalidGeometry {
            width: outer_area.width,
            height: outer_area.height,
            scale: scale_xy,
        });
    }

    let (crop_x, crop_y, crop_w, crop_h) = outer_area.pixel_region(img_size);
    let final_size = inner_area.map(|inner| {
        (
            ((inner.width * scale_xy).round() as u32).max(1),
            ((inner.height * scale_xy).round() as u32).max(1),
        )
    });

    let output_mime = match req.output {
        OutputFormat::Jpeg => "image/jpeg".to_string(),
        OutputFormat::Png => "image/png".to_string(),
        OutputFormat::Auto => {
            if src_mime == "image/jpeg" {
                "image/jpeg".to_string()
            } else {
                "image/png".to_string()
            }
        }
    };

    Ok(Plan::Transform(TransformJob {
        source: selected.path().to_path_buf(),
        crop: CropRect {
            x: crop_x,
            y: crop_y,
            width: crop_w,
            height: crop_h,
        },
        scale: scale_xy,
        rotation: req.rotation,
        contrast: req.contrast,
        brightness: req.brightness,
        rgb_multiply: req.rgb_multiply,
        rgb_add: req.rgb_add,
        mirror_horizontal: req.mirror_horizontal,
        mirror_vertical: req.mirror_vertical,
        quality: ScaleQuality::from_level(req.quality.unwrap_or(cfg.default_quality)),
        final_size,
        output_mime,
        jpeg_quality: cfg.jpeg_quality,
    }))
}

/// Scale factor for original-size requests: display DPI over source DPI,
/// averaged over both axes.
fn original_size_factor(
    req: &ScaleRequest,
    set: &ResolutionSet,
    backend: &dyn ImageBackend,
) -> Result<f64, PlanError> {
    set.biggest().check(backend)?;
    let (res_x, res_y) = set
        .resolution()
        .filter(|(x, y)| *x > 0.0 && *y > 0.0)
        .ok_or(PlanError::MissingMetadata("image"))?;
    if req.ddpi_x <= 0.0 || req.ddpi_y <= 0.0 {
        return Err(PlanError::MissingMetadata("display"));
    }
    let sx = req.ddpi_x / f64::from(res_x);
    let sy = req.ddpi_y / f64::from(res_y);
    Ok((sx + sy) / 2.0)
}

fn set_biggest_size(set: &ResolutionSet) -> ImageSize {
    set.biggest().size().unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
