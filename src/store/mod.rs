//! The directory/resolution store: lazily indexed views of the image tree.
//!
//! The store maps logical paths onto a set of base directories (resolution
//! roots, highest resolution first) and caches what it finds:
//!
//! - [`ImageVariant`] - one file holding one resolution of a logical image
//! - [`ResolutionSet`] - all known variants of one logical image
//! - [`DirectoryEntry`] - one logical directory of tagged file entries
//! - [`DirectoryCache`] - the process-wide path -> entry map with counters

mod cache;
mod directory;
mod set;
mod variant;

pub use cache::{CacheCounters, DirectoryCache};
pub use directory::{DirectoryEntry, FileEntry, OtherFile, ScanRoots};
pub use set::ResolutionSet;
pub use variant::ImageVariant;

// =============================================================================
// File Classes
// =============================================================================

/// Class of files a cache indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Raster images
    Image,
    /// Plain text and markup
    Text,
}

impl FileClass {
    /// True if the extension belongs to this class.
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            FileClass::Image => matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "gif" | "tif" | "tiff" | "jp2"
            ),
            FileClass::Text => matches!(ext.to_ascii_lowercase().as_str(), "txt" | "html" | "xml"),
        }
    }
}

/// Mime type for a file extension; unknown extensions map to octet-stream.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "jp2" => "image/jp2",
        "txt" => "text/plain",
        "html" => "text/html",
        "xml" => "text/xml",
        _ => "application/octet-stream",
    }
}

/// True if clients can consume this mime type without transformation.
pub fn is_mime_servable(mime: &str) -> bool {
    matches!(mime, "image/jpeg" | "image/png" | "image/gif")
}

/// Logical parent of a logical path ("a/b/c" -> "a/b"); the empty string
/// for top-level names and for the root itself.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_class_matching() {
        assert!(FileClass::Image.matches_extension("jpg"));
        assert!(FileClass::Image.matches_extension("TIF"));
        assert!(!FileClass::Image.matches_extension("txt"));
        assert!(FileClass::Text.matches_extension("html"));
        assert!(!FileClass::Text.matches_extension("png"));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_for_extension("PNG"), "image/png");
        assert_eq!(mime_for_extension("bin"), "application/octet-stream");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("a/b/c"), "a/b");
        assert_eq!(parent_path("a"), "");
        assert_eq!(parent_path(""), "");
    }
}
