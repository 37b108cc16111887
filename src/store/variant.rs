//! A single resolution variant of a logical image.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::backend::{ImageBackend, ImageInfo};
use crate::error::BackendError;
use crate::geom::ImageSize;

use super::mime_for_extension;

/// One file holding one resolution of a logical image.
///
/// A variant starts out with only its path known ("unchecked"); size, the
/// verified mime type and DPI metadata appear after the first
/// [`check`](ImageVariant::check) probes the file. Once checked the
/// metadata never changes; a refreshed directory scan produces new
/// variants instead.
#[derive(Debug)]
pub struct ImageVariant {
    /// Logical name of the owning image (file stem)
    name: String,

    /// Absolute path of the file
    path: PathBuf,

    /// Mime type derived from the file extension, used until checked
    ext_mime: &'static str,

    /// Metadata verified by a backend probe, set at most once
    info: OnceLock<ImageInfo>,
}

impl ImageVariant {
    /// Create an unchecked variant for a file path.
    ///
    /// The logical name is the file stem.
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext_mime = path
            .extension()
            .map(|e| mime_for_extension(&e.to_string_lossy()))
            .unwrap_or("application/octet-stream");
        Self {
            name,
            path,
            ext_mime,
            info: OnceLock::new(),
        }
    }

    /// Create a variant with pre-verified metadata.
    pub fn with_info(path: PathBuf, info: ImageInfo) -> Self {
        let variant = Self::new(path);
        let _ = variant.info.set(info);
        variant
    }

    /// Logical name of the owning image.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once a probe has verified this file.
    pub fn is_checked(&self) -> bool {
        self.info.get().is_some()
    }

    /// Pixel size, if checked.
    pub fn size(&self) -> Option<ImageSize> {
        self.info.get().map(|i| i.size)
    }

    /// Source resolution in DPI, if checked and present in the file.
    pub fn dpi(&self) -> Option<(f32, f32)> {
        self.info.get().and_then(|i| i.dpi)
    }

    /// Mime type: the verified one if checked, the extension-derived one
    /// otherwise.
    pub fn mime(&self) -> &str {
        self.info.get().map(|i| i.mime.as_str()).unwrap_or(self.ext_mime)
    }

    /// Aspect ratio of the checked size (0 if unchecked).
    pub fn aspect(&self) -> f64 {
        self.size().map(|s| s.aspect()).unwrap_or(0.0)
    }

    /// Probe the file if it has not been verified yet.
    ///
    /// Concurrent callers may probe redundantly; the first result wins and
    /// the duplicates are discarded, mirroring the cache's insert rule.
    pub fn check(&self, backend: &dyn ImageBackend) -> Result<&ImageInfo, BackendError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let probed = backend.identify(&self.path)?;
        debug!(
            "checked {}: {} {}",
            self.path.display(),
            probed.size,
            probed.mime
        );
        let _ = self.info.set(probed);
        // unwrap is safe: set above or raced with another successful probe
        Ok(self.info.get().expect("variant info just set"))
    }
}
