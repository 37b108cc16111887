//! All known resolutions of one logical image.

use tracing::warn;

use crate::backend::ImageBackend;
use crate::geom::ImageSize;

use super::ImageVariant;

/// Ordered collection of [`ImageVariant`]s for one logical image.
///
/// Variants are ordered strictly by decreasing resolution: index 0 is the
/// highest. The order is fixed at construction from base-directory
/// precedence (the first base root holds the highest resolution) and never
/// re-sorted. A set is never empty.
#[derive(Debug)]
pub struct ResolutionSet {
    variants: Vec<ImageVariant>,
}

impl ResolutionSet {
    /// Create a set from variants already in high-to-low resolution order.
    ///
    /// Returns `None` for an empty variant list.
    pub fn new(variants: Vec<ImageVariant>) -> Option<Self> {
        if variants.is_empty() {
            None
        } else {
            Some(Self { variants })
        }
    }

    /// Logical name of the image (taken from the biggest variant).
    pub fn name(&self) -> &str {
        self.variants[0].name()
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: usize) -> Option<&ImageVariant> {
        self.variants.get(index)
    }

    /// The highest resolution variant.
    pub fn biggest(&self) -> &ImageVariant {
        &self.variants[0]
    }

    /// The lowest resolution variant.
    pub fn smallest(&self) -> &ImageVariant {
        &self.variants[self.variants.len() - 1]
    }

    /// The first variant, scanning from the highest resolution down, whose
    /// size fits `target` in both dimensions. `None` if even the smallest
    /// variant exceeds `target` in some dimension.
    ///
    /// Variants without verified sizes are skipped.
    pub fn next_smaller(&self, target: ImageSize) -> Option<&ImageVariant> {
        self.variants.iter().find(|v| {
            v.size()
                .map(|s| s.is_totally_smaller_than(target))
                .unwrap_or(false)
        })
    }

    /// The first variant, scanning from the lowest resolution up, with
    /// width or height at least `target`'s. `None` if no variant reaches
    /// `target` in either dimension.
    ///
    /// The asymmetry with [`next_smaller`](Self::next_smaller) is load
    /// bearing: a bigger source only needs enough detail in one dimension
    /// (it will be scaled down), while a smaller source served as-is must
    /// be safely under in both.
    pub fn next_bigger(&self, target: ImageSize) -> Option<&ImageVariant> {
        self.variants.iter().rev().find(|v| {
            v.size()
                .map(|s| s.is_bigger_than(target))
                .unwrap_or(false)
        })
    }

    /// Aspect ratio of the image, from the biggest variant (0 if that
    /// variant is unchecked).
    pub fn aspect(&self) -> f64 {
        self.biggest().aspect()
    }

    /// Source resolution in DPI, from the biggest variant.
    pub fn resolution(&self) -> Option<(f32, f32)> {
        self.biggest().dpi()
    }

    /// Probe every variant that has not been verified yet.
    ///
    /// Selection scans only consider checked variants, so this runs before
    /// resolution-dependent selection. Probe failures are logged and the
    /// variant stays unchecked.
    pub fn check_all(&self, backend: &dyn ImageBackend) {
        for variant in &self.variants {
            if let Err(e) = variant.check(backend) {
                warn!("cannot check {}: {}", variant.path().display(), e);
            }
        }
    }

    pub fn variants(&self) -> impl Iterator<Item = &ImageVariant> {
        self.variants.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
