use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Growth applied per retry when none is configured.
pub const DEFAULT_GROWTH_FACTOR: f64 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("coordinate {name} = {value} is outside [0, 1]")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("coordinate {name} is not a finite number")]
    NotFinite { name: &'static str },
    #[error("{min_name} ({min}) must be smaller than {max_name} ({max})")]
    Inverted {
        min_name: &'static str,
        min: f64,
        max_name: &'static str,
        max: f64,
    },
}

/// A rectangle expressed as fractions of the page width and height.
///
/// Always satisfies `0 <= x_min < x_max <= 1` and `0 <= y_min < y_max <= 1`;
/// the only way to obtain one is through [`BoundingBox::new`] or [`BoundingBox::grow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

/// A crop rectangle in pixels: origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, GeometryError> {
        for (name, value) in [("x_min", x_min), ("y_min", y_min), ("x_max", x_max), ("y_max", y_max)] {
            if !value.is_finite() {
                return Err(GeometryError::NotFinite { name });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(GeometryError::OutOfRange { name, value });
            }
        }
        if x_min >= x_max {
            return Err(GeometryError::Inverted { min_name: "x_min", min: x_min, max_name: "x_max", max: x_max });
        }
        if y_min >= y_max {
            return Err(GeometryError::Inverted { min_name: "y_min", min: y_min, max_name: "y_max", max: y_max });
        }
        Ok(Self { x_min, y_min, x_max, y_max })
    }

    /// The whole page.
    pub fn full() -> Self {
        Self { x_min: 0.0, y_min: 0.0, x_max: 1.0, y_max: 1.0 }
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.x_min, self.y_min, self.x_max, self.y_max)
    }

    /// `true` if `other` lies inside this box (edges may touch).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }

    /// Enlarge symmetrically around the centre by `factor` on each axis.
    ///
    /// Overflow past an edge is clamped and pushed to the opposite edge, mins
    /// first, then maxes. An axis that cannot fit the enlarged size saturates
    /// to the full `[0, 1]` span.
    ///
    /// A factor that is not finite and positive leaves the box unchanged, so a
    /// grown box always contains the original.
    pub fn grow(&self, factor: f64) -> BoundingBox {
        if !(factor.is_finite() && factor > 0.0) {
            return *self;
        }
        let (x_min, x_max) = grow_axis(self.x_min, self.x_max, factor);
        let (y_min, y_max) = grow_axis(self.y_min, self.y_max, factor);
        BoundingBox { x_min, y_min, x_max, y_max }
    }

    /// Map onto a `width` × `height` raster.
    ///
    /// Edges are rounded to the nearest pixel and clamped to the raster; the
    /// result is at least one pixel wide and tall on a non-empty raster.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let (x, w) = axis_to_pixels(self.x_min, self.x_max, width);
        let (y, h) = axis_to_pixels(self.y_min, self.y_max, height);
        PixelRect { x, y, width: w, height: h }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.4}, {:.4}, {:.4}, {:.4})",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = GeometryError;

    fn try_from(c: [f64; 4]) -> Result<Self, Self::Error> {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x_min, self.y_min, self.x_max, self.y_max].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coords = <[f64; 4]>::deserialize(deserializer)?;
        BoundingBox::try_from(coords).map_err(serde::de::Error::custom)
    }
}

fn grow_axis(min: f64, max: f64, factor: f64) -> (f64, f64) {
    let delta = (max - min) * factor / 2.0;
    let mut lo = min - delta;
    let mut hi = max + delta;

    if lo < 0.0 {
        hi -= lo;
        lo = 0.0;
    }
    if hi > 1.0 {
        lo = (lo - (hi - 1.0)).max(0.0);
        hi = 1.0;
    }
    (lo, hi)
}

fn axis_to_pixels(min: f64, max: f64, extent: u32) -> (u32, u32) {
    if extent == 0 {
        return (0, 0);
    }
    let scale = f64::from(extent);
    let start = ((min * scale).round() as u32).min(extent - 1);
    let end = ((max * scale).round() as u32).clamp(start + 1, extent);
    (start, end - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BoundingBox {
        BoundingBox::new(x0, y0, x1, y1).unwrap()
    }

    fn assert_valid(b: &BoundingBox) {
        assert!(b.x_min() >= 0.0 && b.y_min() >= 0.0, "negative coordinate in {b}");
        assert!(b.x_max() <= 1.0 && b.y_max() <= 1.0, "coordinate above 1 in {b}");
        assert!(b.x_min() < b.x_max() && b.y_min() < b.y_max(), "inverted box {b}");
    }

    #[test]
    fn grow_ignores_negative_and_non_finite_factors() {
        let original = bbox(0.1, 0.1, 0.2, 0.2);
        for factor in [-2.0, -0.1, 0.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let grown = original.grow(factor);
            assert_valid(&grown);
            assert_eq!(grown, original, "factor {factor}");
        }
    }

    #[test]
    fn new_rejects_inverted_and_out_of_range() {
        assert!(matches!(
            BoundingBox::new(0.5, 0.1, 0.4, 0.2),
            Err(GeometryError::Inverted { .. })
        ));
        assert!(matches!(
            BoundingBox::new(0.1, 0.1, 0.1, 0.2),
            Err(GeometryError::Inverted { .. })
        ));
        assert!(matches!(
            BoundingBox::new(-0.1, 0.1, 0.4, 0.2),
            Err(GeometryError::OutOfRange { name: "x_min", .. })
        ));
        assert!(matches!(
            BoundingBox::new(0.1, 0.1, 0.4, f64::NAN),
            Err(GeometryError::NotFinite { name: "y_max" })
        ));
    }

    #[test]
    fn grow_without_clamp_is_symmetric_and_contains_original() {
        let b = bbox(0.4, 0.4, 0.6, 0.5);
        let g = b.grow(0.1);
        assert!((g.width() - 0.22).abs() < 1e-12);
        assert!((g.height() - 0.11).abs() < 1e-12);
        assert!((g.x_min() - 0.39).abs() < 1e-12);
        assert!((g.y_max() - 0.505).abs() < 1e-12);
        assert!(g.contains(&b));
        assert!(g.x_min() < b.x_min() && g.x_max() > b.x_max());
        assert!(g.y_min() < b.y_min() && g.y_max() > b.y_max());
    }

    #[test]
    fn grow_at_origin_moves_overflow_to_far_edge() {
        let g = bbox(0.0, 0.0, 0.05, 0.05).grow(0.1);
        assert_eq!(g.x_min(), 0.0);
        assert_eq!(g.y_min(), 0.0);
        assert!((g.x_max() - 0.055).abs() < 1e-12);
        assert!((g.y_max() - 0.055).abs() < 1e-12);
        assert_valid(&g);
    }

    #[test]
    fn grow_at_bottom_right_moves_overflow_up_and_left() {
        let g = bbox(0.9, 0.8, 1.0, 1.0).grow(0.1);
        assert_eq!(g.x_max(), 1.0);
        assert_eq!(g.y_max(), 1.0);
        assert!((g.x_min() - 0.89).abs() < 1e-12);
        assert!((g.y_min() - 0.78).abs() < 1e-12);
    }

    #[test]
    fn grow_spanning_both_edges_saturates() {
        let g = bbox(0.0, 0.3, 1.0, 0.4).grow(0.5);
        assert_eq!(g.x_min(), 0.0);
        assert_eq!(g.x_max(), 1.0);
        assert_valid(&g);
    }

    #[test]
    fn grow_invariant_holds_over_a_grid() {
        let steps = [0.0, 0.01, 0.1, 0.33, 0.5, 0.75, 0.9, 0.99, 1.0];
        for &x0 in &steps {
            for &x1 in &steps {
                for &y0 in &[0.0, 0.45, 0.98] {
                    if x0 >= x1 {
                        continue;
                    }
                    let mut b = bbox(x0, y0, x1, (y0 + 0.02).min(1.0));
                    for _ in 0..8 {
                        b = b.grow(0.1);
                        assert_valid(&b);
                    }
                }
            }
        }
    }

    #[test]
    fn repeated_growth_compounds() {
        let mut b = bbox(0.3, 0.3, 0.4, 0.4);
        for _ in 0..5 {
            b = b.grow(0.1);
        }
        assert!((b.width() - 0.1 * 1.1f64.powi(5)).abs() < 1e-12);
    }

    #[test]
    fn to_pixels_rounds_to_nearest() {
        let r = bbox(0.36, 0.10, 0.65, 0.12).to_pixels(1000, 1000);
        assert_eq!(r, PixelRect { x: 360, y: 100, width: 290, height: 20 });

        let r = bbox(0.0, 0.0, 0.5, 0.5).to_pixels(3, 3);
        // 1.5 rounds away from zero.
        assert_eq!(r, PixelRect { x: 0, y: 0, width: 2, height: 2 });
    }

    #[test]
    fn to_pixels_never_empty() {
        let r = bbox(0.5, 0.5, 0.5001, 0.5001).to_pixels(100, 100);
        assert_eq!(r.width, 1);
        assert_eq!(r.height, 1);

        let r = bbox(0.999, 0.999, 1.0, 1.0).to_pixels(10, 10);
        assert_eq!(r, PixelRect { x: 9, y: 9, width: 1, height: 1 });
    }

    #[test]
    fn deserializes_from_four_numbers() {
        let b: BoundingBox = serde_json::from_str("[0.1, 0.2, 0.3, 0.4]").unwrap();
        assert_eq!(b.as_tuple(), (0.1, 0.2, 0.3, 0.4));
        assert!(serde_json::from_str::<BoundingBox>("[0.3, 0.2, 0.1, 0.4]").is_err());
        assert!(serde_json::from_str::<BoundingBox>("[0.1, 0.2, 0.3]").is_err());
    }
}
