//! Floating-point rectangles for crop geometry.

use super::ImageSize;

/// An axis-aligned rectangle in source pixel coordinates.
///
/// The geometry pipeline works in floating point until the final crop
/// region is fixed; see [`Rect::pixel_region`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full bounds of an image, anchored at the origin.
    pub fn from_size(size: ImageSize) -> Self {
        Self::new(0.0, 0.0, f64::from(size.width), f64::from(size.height))
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Intersection with `other`. A disjoint pair yields a zero-area
    /// rectangle (negative extents are clamped to 0).
    pub fn intersection(&self, other: Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }

    /// Axis-aligned bounds of this rectangle rotated by `degrees` around
    /// the point (`cx`, `cy`).
    pub fn rotated_bounds(&self, degrees: f64, cx: f64, cy: f64) -> Rect {
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();
        let corners = [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x, self.y + self.height),
            (self.x + self.width, self.y + self.height),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (px, py) in corners {
            let dx = px - cx;
            let dy = py - cy;
            let rx = cx + dx * cos - dy * sin;
            let ry = cy + dx * sin + dy * cos;
            min_x = min_x.min(rx);
            min_y = min_y.min(ry);
            max_x = max_x.max(rx);
            max_y = max_y.max(ry);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Snap to a whole-pixel region covering this rectangle, clamped to
    /// `bounds`. Returns `(x, y, width, height)`.
    pub fn pixel_region(&self, bounds: ImageSize) -> (u32, u32, u32, u32) {
        let x0 = self.x.floor().max(0.0) as u32;
        let y0 = self.y.floor().max(0.0) as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(bounds.width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(bounds.height);
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}
