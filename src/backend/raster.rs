//! Image backend implementation on the `image` crate.
//!
//! Decoding, resampling and encoding all run on the blocking thread pool;
//! the async `transform` entry point only coordinates.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{
    imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage,
};
use tracing::debug;

use crate::error::BackendError;
use crate::geom::ImageSize;

use super::{ImageBackend, ImageInfo, ScaleQuality, TransformJob, TransformOutput};

/// Backend that decodes and transforms images in-process.
///
/// Stateless; clone or share freely.
#[derive(Debug, Clone, Default)]
pub struct RasterBackend;

impl RasterBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageBackend for RasterBackend {
    fn identify(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        let reader = ImageReader::open(path)
            .map_err(|source| BackendError::Io {
                path: path.display().to_string(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| BackendError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let mime = reader
            .format()
            .map(format_mime)
            .unwrap_or("application/octet-stream")
            .to_string();
        let (width, height) = reader.into_dimensions().map_err(|source| {
            BackendError::Decode {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(ImageInfo {
            size: ImageSize::new(width, height),
            mime,
            // the image crate does not expose density metadata
            dpi: None,
        })
    }

    async fn transform(&self, job: &TransformJob) -> Result<TransformOutput, BackendError> {
        let job = job.clone();
        tokio::task::spawn_blocking(move || run_transform(&job))
            .await
            .map_err(|e| BackendError::Other(format!("transform task failed: {e}")))?
    }
}

// =============================================================================
// Pixel Pipeline
// =============================================================================

fn run_transform(job: &TransformJob) -> Result<TransformOutput, BackendError> {
    let mut img = ImageReader::open(&job.source)
        .map_err(|source| BackendError::Io {
            path: job.source.display().to_string(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| BackendError::Io {
            path: job.source.display().to_string(),
            source,
        })?
        .decode()
        .map_err(|source| BackendError::Decode {
            path: job.source.display().to_string(),
            source,
        })?;

    let (full_w, full_h) = img.dimensions();
    let crop = job.crop;
    if crop.x > 0 || crop.y > 0 || crop.width < full_w || crop.height < full_h {
        img = img.crop_imm(crop.x, crop.y, crop.width, crop.height);
    }
    debug!(
        "transform {}: crop {}x{}+{}+{} scale {:.4}",
        job.source.display(),
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        job.scale
    );

    if (job.scale - 1.0).abs() > f64::EPSILON {
        // blur before strong downscaling at best quality, the subsampling
        // artifacts are worse than the extra pass
        if job.scale <= 0.5 && job.quality == ScaleQuality::Best {
            let sigma = (1.0 / job.scale / 3.0) as f32;
            img = img.blur(sigma);
        }
        let (w, h) = img.dimensions();
        let tw = ((f64::from(w) * job.scale).round() as u32).max(1);
        let th = ((f64::from(h) * job.scale).round() as u32).max(1);
        img = img.resize_exact(tw, th, scale_filter(job.quality));
    }

    if job.mirror_horizontal {
        img = img.fliph();
    }
    if job.mirror_vertical {
        img = img.flipv();
    }

    if job.contrast != 0.0
        || job.brightness != 0.0
        || job.rgb_multiply.is_some()
        || job.rgb_add.is_some()
    {
        img = enhance(img, job);
    }

    if job.rotation != 0.0 {
        img = rotate(&img, job.rotation);
    }

    if let Some((fw, fh)) = job.final_size {
        let (w, h) = img.dimensions();
        if fw < w || fh < h {
            let fw = fw.min(w).max(1);
            let fh = fh.min(h).max(1);
            img = img.crop_imm((w - fw) / 2, (h - fh) / 2, fw, fh);
        }
    }

    encode(&img, &job.output_mime, job.jpeg_quality)
}

fn scale_filter(quality: ScaleQuality) -> FilterType {
    match quality {
        ScaleQuality::Fast => FilterType::Nearest,
        ScaleQuality::Good => FilterType::Triangle,
        ScaleQuality::Best => FilterType::Lanczos3,
    }
}

/// Per-pixel multiply/add on the color channels; alpha passes through.
///
/// Contrast multiplies by 2^contrast, brightness adds, and the optional
/// per-channel factors compose on top.
fn enhance(img: DynamicImage, job: &TransformJob) -> DynamicImage {
    let base_mult = 2f32.powf(job.contrast);
    let rgbm = job.rgb_multiply.unwrap_or([1.0, 1.0, 1.0]);
    let rgba = job.rgb_add.unwrap_or([0.0, 0.0, 0.0]);
    let mult = [base_mult * rgbm[0], base_mult * rgbm[1], base_mult * rgbm[2]];
    let add = [
        job.brightness + rgba[0],
        job.brightness + rgba[1],
        job.brightness + rgba[2],
    ];

    let mut buf = img.to_rgba8();
    for px in buf.pixels_mut() {
        for c in 0..3 {
            let v = f32::from(px.0[c]) * mult[c] + add[c];
            px.0[c] = v.clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(buf)
}

/// Rotate by an arbitrary angle into the enclosing bounding box.
///
/// Inverse-mapped bilinear resampling; pixels outside the source are
/// transparent black.
fn rotate(img: &DynamicImage, degrees: f64) -> DynamicImage {
    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    let (w, h) = img.dimensions();
    let (wf, hf) = (f64::from(w), f64::from(h));

    let out_w = (wf * cos.abs() + hf * sin.abs()).ceil() as u32;
    let out_h = (wf * sin.abs() + hf * cos.abs()).ceil() as u32;
    let (ocx, ocy) = (f64::from(out_w) / 2.0, f64::from(out_h) / 2.0);
    let (icx, icy) = (wf / 2.0, hf / 2.0);

    let src = img.to_rgba8();
    let mut out = RgbaImage::new(out_w, out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let dx = f64::from(ox) + 0.5 - ocx;
            let dy = f64::from(oy) + 0.5 - ocy;
            // inverse rotation back into source coordinates
            let sx = dx * cos + dy * sin + icx - 0.5;
            let sy = -dx * sin + dy * cos + icy - 0.5;
            out.put_pixel(ox, oy, sample_bilinear(&src, sx, sy));
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = src.dimensions();
    if x < -1.0 || y < -1.0 || x > f64::from(w) || y > f64::from(h) {
        return Rgba([0, 0, 0, 0]);
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let pick = |px: f64, py: f64| -> [f32; 4] {
        if px < 0.0 || py < 0.0 || px >= f64::from(w) || py >= f64::from(h) {
            [0.0; 4]
        } else {
            let p = src.get_pixel(px as u32, py as u32);
            [
                f32::from(p.0[0]),
                f32::from(p.0[1]),
                f32::from(p.0[2]),
                f32::from(p.0[3]),
            ]
        }
    };

    let p00 = pick(x0, y0);
    let p10 = pick(x0 + 1.0, y0);
    let p01 = pick(x0, y0 + 1.0);
    let p11 = pick(x0 + 1.0, y0 + 1.0);

    let (fx, fy) = (fx as f32, fy as f32);
    let mut px = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bot = p01[c] * (1.0 - fx) + p11[c] * fx;
        px[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(px)
}

fn encode(img: &DynamicImage, mime: &str, jpeg_quality: u8) -> Result<TransformOutput, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    match mime {
        "image/jpeg" => {
            // JPEG has no alpha channel, flatten first
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
            rgb.write_with_encoder(encoder)
                .map_err(BackendError::Encode)?;
        }
        "image/png" => {
            let encoder = PngEncoder::new(&mut buf);
            img.write_with_encoder(encoder)
                .map_err(BackendError::Encode)?;
        }
        other => return Err(BackendError::UnsupportedOutput(other.to_string())),
    }
    Ok(TransformOutput {
        data: Bytes::from(buf.into_inner()),
        mime: mime.to_string(),
    })
}

fn format_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Tiff => "image/tiff",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Tests
// =============================================================================
