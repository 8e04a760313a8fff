//! Extents and regular pixel grids.
//!
//! Rasters are north-up: row 0 is the top of the extent, column 0 the left.
//! Pixel (row, col) covers `[xmin + col*xres, xmin + (col+1)*xres]` horizontally
//! and its center sits at `(col + 0.5, row + 0.5)` in pixel space.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in some reference system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    /// Create an extent, swapping coordinates if given in the wrong order.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }

    /// Degenerate extent holding a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self {
            xmin: x,
            ymin: y,
            xmax: x,
            ymax: y,
        }
    }

    /// Bounding box of all finite points, `None` if there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut extent: Option<Extent> = None;
        for (x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            match extent.as_mut() {
                Some(e) => e.combine(x, y),
                None => extent = Some(Extent::from_point(x, y)),
            }
        }
        extent
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.xmin + self.width() / 2.0,
            self.ymin + self.height() / 2.0,
        )
    }

    /// True if the extent has no area.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Inclusive containment test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Grow the extent to include a point.
    pub fn combine(&mut self, x: f64, y: f64) {
        self.xmin = self.xmin.min(x);
        self.ymin = self.ymin.min(y);
        self.xmax = self.xmax.max(x);
        self.ymax = self.ymax.max(y);
    }

    /// Overlapping part of two extents, `None` if they are disjoint.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let xmin = self.xmin.max(other.xmin);
        let ymin = self.ymin.max(other.ymin);
        let xmax = self.xmax.min(other.xmax);
        let ymax = self.ymax.min(other.ymax);
        if xmin > xmax || ymin > ymax {
            return None;
        }
        Some(Extent {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    pub fn to_tuple(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// A regular pixel grid: extent plus pixel counts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterGeometry {
    pub extent: Extent,
    pub width: usize,
    pub height: usize,
}

impl RasterGeometry {
    pub fn new(extent: Extent, width: usize, height: usize) -> Self {
        Self {
            extent,
            width,
            height,
        }
    }

    /// True when the grid has no pixels or no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.extent.is_empty()
    }

    pub fn x_res(&self) -> f64 {
        self.extent.width() / self.width as f64
    }

    pub fn y_res(&self) -> f64 {
        self.extent.height() / self.height as f64
    }

    /// Map coordinates of the center of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.extent.xmin + (col as f64 + 0.5) * self.x_res(),
            self.extent.ymax - (row as f64 + 0.5) * self.y_res(),
        )
    }

    /// Pixel containing a map coordinate, `None` outside the grid.
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.extent.xmin) / self.x_res()).floor();
        let row = ((self.extent.ymax - y) / self.y_res()).floor();
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some((row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_normalizes_order() {
        let e = Extent::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(e, Extent::new(0.0, 5.0, 10.0, 20.0));
        assert_relative_eq!(e.width(), 10.0);
        assert_relative_eq!(e.height(), 15.0);
    }

    #[test]
    fn test_empty_extent() {
        assert!(Extent::from_point(1.0, 1.0).is_empty());
        assert!(Extent::new(0.0, 0.0, 1.0, 0.0).is_empty());
        assert!(!Extent::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_from_points_skips_non_finite() {
        let e = Extent::from_points(vec![
            (1.0, 2.0),
            (f64::NAN, 0.0),
            (-3.0, 5.0),
            (f64::INFINITY, 1.0),
        ])
        .unwrap();
        assert_eq!(e, Extent::new(-3.0, 2.0, 1.0, 5.0));
        assert!(Extent::from_points(vec![(f64::NAN, f64::NAN)]).is_none());
    }

    #[test]
    fn test_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, -5.0, 15.0, 5.0);
        assert_eq!(a.intersection(&b), Some(Extent::new(5.0, 0.0, 10.0, 5.0)));

        let far = Extent::new(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_pixel_center_and_lookup() {
        let g = RasterGeometry::new(Extent::new(0.0, 0.0, 40.0, 20.0), 4, 2);
        assert_relative_eq!(g.x_res(), 10.0);
        assert_relative_eq!(g.y_res(), 10.0);

        let (x, y) = g.pixel_center(0, 0);
        assert_relative_eq!(x, 5.0);
        assert_relative_eq!(y, 15.0);

        assert_eq!(g.pixel_at(35.0, 5.0), Some((1, 3)));
        assert_eq!(g.pixel_at(0.0, 20.0), Some((0, 0)));
        assert_eq!(g.pixel_at(40.0, 5.0), None);
        assert_eq!(g.pixel_at(-0.1, 5.0), None);
    }
}
