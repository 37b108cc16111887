//! Pixel dimensions of an image.

use std::fmt;

/// Width and height of an image in pixels.
///
/// The comparison operations are deliberately asymmetric:
/// [`is_totally_smaller_than`](ImageSize::is_totally_smaller_than) requires
/// both dimensions to fit, while [`is_bigger_than`](ImageSize::is_bigger_than)
/// is satisfied by either dimension. Resolution selection depends on exactly
/// these predicates (see [`crate::store::ResolutionSet`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Aspect ratio (width/height); < 1 for portrait, > 1 for landscape.
    ///
    /// Returns 0 for a zero height.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// True if both width and height are within `other`'s.
    pub fn is_totally_smaller_than(&self, other: ImageSize) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// True if width or height is at least `other`'s.
    pub fn is_bigger_than(&self, other: ImageSize) -> bool {
        self.width >= other.width || self.height >= other.height
    }

    /// True if this size fits inside `other` in both dimensions.
    pub fn fits_in(&self, other: ImageSize) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// This size scaled by `factor`, rounded to whole pixels.
    pub fn scaled(&self, factor: f64) -> ImageSize {
        ImageSize {
            width: (f64::from(self.width) * factor).round() as u32,
            height: (f64::from(self.height) * factor).round() as u32,
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
