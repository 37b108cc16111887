use thiserror::Error;

/// Errors from the image backend: probing, decoding, transforming or
/// encoding pixel data.
#[derive(Debug, Error)]
pub enum BackendError {
    /// I/O error while reading an image file
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be decoded as an image
    #[error("decode error for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// The transformed image could not be encoded
    #[error("encode error: {0}")]
    Encode(#[source] image::ImageError),

    /// The requested output mime type is not supported by the backend
    #[error("unsupported output type: {0}")]
    UnsupportedOutput(String),

    /// Backend-specific failure (used by alternative backend implementations)
    #[error("backend failure: {0}")]
    Other(String),
}

/// Errors raised while planning the transform geometry for a request.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The requested crop/scale combination is degenerate: the clipped
    /// region is under 1 pixel in a dimension, or the scaled output would
    /// be under 2 pixels.
    #[error(
        "invalid scale parameter set: region {width:.1}x{height:.1} at scale {scale:.5}"
    )]
    InvalidGeometry {
        width: f64,
        height: f64,
        scale: f64,
    },

    /// A DPI-dependent mode was requested but DPI metadata is missing
    /// on the source image or in the request.
    #[error("missing {0} DPI information")]
    MissingMetadata(&'static str),

    /// The backend failed while probing a source image
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Top-level errors for a scale request, mapped to distinct outcomes at
/// the request boundary.
#[derive(Debug, Error)]
pub enum ScaleError {
    /// The logical path (and index) resolves to nothing under any base root
    #[error("file {path} ({index}) not found")]
    NotFound { path: String, index: usize },

    /// Geometry planning failed (user error)
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The pixel transform failed (server error)
    #[error(transparent)]
    Backend(BackendError),

    /// The transform worker pool is saturated; the caller should back off
    /// and retry.
    #[error("transform workers overloaded")]
    Overloaded,

    /// I/O error while streaming a file as-is
    #[error("error sending file {path}: {source}")]
    SendFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
