//! The image backend capability: probing and transforming pixel data.
//!
//! The rest of the crate never touches pixels directly. It talks to an
//! [`ImageBackend`]: `identify` is a cheap header probe used to verify a
//! variant's size and format, `transform` executes a complete
//! [`TransformJob`] and yields an encoded image stream.
//!
//! [`RasterBackend`] is the built-in implementation on the `image` crate.
//! Tests substitute mock backends at the same seam.

mod raster;

pub use raster::RasterBackend;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendError;
use crate::geom::ImageSize;

// =============================================================================
// Probe Result
// =============================================================================

/// Verified metadata for one image file, produced by [`ImageBackend::identify`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Pixel dimensions
    pub size: ImageSize,

    /// Mime type as detected from the file content
    pub mime: String,

    /// Source resolution in DPI (x, y), if the format carries it
    pub dpi: Option<(f32, f32)>,
}

// =============================================================================
// Transform Job
// =============================================================================

/// Interpolation quality for scaling, from fastest to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleQuality {
    Fast,
    Good,
    Best,
}

impl ScaleQuality {
    /// Map a numeric quality level (0..=2) to a quality; out-of-range
    /// levels saturate at `Best`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => ScaleQuality::Fast,
            1 => ScaleQuality::Good,
            _ => ScaleQuality::Best,
        }
    }
}

/// A whole-pixel crop region in source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An immutable description of one pixel transform, produced by the
/// request planner and executed by an [`ImageBackend`].
///
/// Operations apply in order: crop, scale, mirror, enhancement, rotation,
/// final crop, encode.
#[derive(Debug, Clone)]
pub struct TransformJob {
    /// Absolute path of the source variant
    pub source: PathBuf,

    /// Crop region in source pixels
    pub crop: CropRect,

    /// Uniform scale factor applied to the cropped region
    pub scale: f64,

    /// Rotation angle in degrees (0 = none)
    pub rotation: f64,

    /// Contrast adjustment: pixel values are multiplied by 2^contrast
    pub contrast: f32,

    /// Brightness adjustment: added to pixel values
    pub brightness: f32,

    /// Per-channel RGB multipliers
    pub rgb_multiply: Option<[f32; 3]>,

    /// Per-channel RGB offsets
    pub rgb_add: Option<[f32; 3]>,

    /// Mirror across the vertical axis
    pub mirror_horizontal: bool,

    /// Mirror across the horizontal axis
    pub mirror_vertical: bool,

    /// Interpolation quality for scaling
    pub quality: ScaleQuality,

    /// Centered crop applied after rotation (whole-rotation-area mode)
    pub final_size: Option<(u32, u32)>,

    /// Output mime type ("image/jpeg" or "image/png")
    pub output_mime: String,

    /// JPEG encode quality (1-100), ignored for PNG output
    pub jpeg_quality: u8,
}

/// An encoded image produced by [`ImageBackend::transform`].
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Encoded image bytes
    pub data: Bytes,

    /// Mime type of the encoded data
    pub mime: String,
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Capability for probing and transforming raster images.
#[async_trait]
pub trait ImageBackend: Send + Sync + 'static {
    /// Probe an image file's header for size, mime type and resolution.
    ///
    /// This must be cheap: it is called lazily the first time a variant's
    /// metadata is needed and may run for every variant of a set during
    /// resolution selection.
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError>;

    /// Execute a transform job and return the encoded result.
    async fn transform(&self, job: &TransformJob) -> Result<TransformOutput, BackendError>;
}
