//! Extent and size of a raster window after reprojection.

use crate::geometry::{Extent, RasterGeometry};
use crate::proj::{CoordinateTransform, Direction};

/// Sample points per axis used to transform a bounding box.
pub const BOUNDING_BOX_SAMPLES: usize = 21;

/// `n` x `n` points spread evenly over an extent, edges included.
fn sample_points(extent: &Extent, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let x_step = extent.width() / (n - 1) as f64;
    let y_step = extent.height() / (n - 1) as f64;
    let mut points = Vec::with_capacity(n * n);
    for j in 0..n {
        // Pin the last sample to the edge, avoiding accumulated error
        let y = if j == n - 1 {
            extent.ymax
        } else {
            extent.ymin + j as f64 * y_step
        };
        for i in 0..n {
            let x = if i == n - 1 {
                extent.xmax
            } else {
                extent.xmin + i as f64 * x_step
            };
            points.push((x, y));
        }
    }
    points
}

/// Bounding box of an extent after transformation.
///
/// Samples the interior as well as the edges, since extremes are not always
/// on the boundary (e.g. polar projections). Points that fail to transform
/// are skipped; `None` if none succeed.
pub fn transform_bounding_box(
    transform: &dyn CoordinateTransform,
    direction: Direction,
    extent: &Extent,
    samples: usize,
) -> Option<Extent> {
    let transformed = sample_points(extent, samples)
        .into_iter()
        .filter_map(|(x, y)| transform.transform(x, y, direction).ok());
    Extent::from_points(transformed)
}

/// Finest pixel size the transform produces around the corners, edge
/// midpoints and center of `src`.
///
/// At each sample one source pixel step along x and along y is transformed
/// and its length measured; the smallest length wins.
fn estimate_resolution(
    transform: &dyn CoordinateTransform,
    direction: Direction,
    src: &RasterGeometry,
) -> Option<f64> {
    let e = &src.extent;
    let x_res = src.x_res();
    let y_res = src.y_res();
    let dist = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();

    let mut best = f64::MAX;
    for j in 0..3 {
        for i in 0..3 {
            let x = e.xmin + i as f64 * e.width() / 2.0;
            let y = e.ymin + j as f64 * e.height() / 2.0;
            // Step inward so neighbours stay inside the extent
            let dx = if i == 2 { -x_res } else { x_res };
            let dy = if j == 2 { -y_res } else { y_res };

            let Ok(p) = transform.transform(x, y, direction) else {
                continue;
            };
            for (nx, ny) in [(x + dx, y), (x, y + dy)] {
                if let Ok(q) = transform.transform(nx, ny, direction) {
                    let d = dist(p, q);
                    if d > 0.0 && d.is_finite() {
                        best = best.min(d);
                    }
                }
            }
        }
    }
    (best < f64::MAX).then_some(best)
}

/// Reproject a raster window: the equivalent extent and pixel size on the
/// other side of `transform`.
///
/// The result is sized so the output neither grossly undersamples nor
/// oversamples the input; both dimensions are at least 1. `None` for an
/// empty input or when no representative point can be transformed.
pub fn extent_size(
    transform: &dyn CoordinateTransform,
    direction: Direction,
    src: &RasterGeometry,
) -> Option<RasterGeometry> {
    if src.is_empty() {
        return None;
    }
    let extent = transform_bounding_box(transform, direction, &src.extent, BOUNDING_BOX_SAMPLES)?;
    if extent.is_empty() {
        return None;
    }
    let res = estimate_resolution(transform, direction, src)?;

    let width = (extent.width() / res).round().max(1.0);
    let height = (extent.height() / res).round().max(1.0);
    if !width.is_finite() || !height.is_finite() {
        return None;
    }
    Some(RasterGeometry::new(extent, width as usize, height as usize))
}
