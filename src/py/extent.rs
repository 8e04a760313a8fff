//! PyO3 binding for dest_extent_size.

use pyo3::prelude::*;

use crate::geometry::Extent;
use crate::proj::crs::ReferenceSystem;
use crate::proj::datum::NO_DATUM_TRANSFORM;
use crate::projector::RasterProjector;

/// Destination extent and shape matching a source raster window.
///
/// Args:
///     src_crs: Source CRS string.
///     src_bounds: Source extent as (xmin, ymin, xmax, ymax).
///     src_shape: Source shape as (rows, cols).
///     dst_crs: Destination CRS string.
///
/// Returns:
///     ((xmin, ymin, xmax, ymax), (rows, cols)), or None when the window
///     cannot be reprojected (same CRS, degenerate window, transform failure).
#[pyfunction]
#[pyo3(signature = (src_crs, src_bounds, src_shape, dst_crs))]
#[allow(clippy::type_complexity)]
pub fn dest_extent_size(
    py: Python<'_>,
    src_crs: &str,
    src_bounds: (f64, f64, f64, f64),
    src_shape: (usize, usize),
    dst_crs: &str,
) -> Option<((f64, f64, f64, f64), (usize, usize))> {
    let src_crs = ReferenceSystem::new(src_crs);
    let dst_crs = ReferenceSystem::new(dst_crs);

    py.allow_threads(move || {
        let mut projector = RasterProjector::new();
        projector.set_crs(src_crs, dst_crs, NO_DATUM_TRANSFORM, NO_DATUM_TRANSFORM);

        let (xmin, ymin, xmax, ymax) = src_bounds;
        let (rows, cols) = src_shape;
        projector
            .dest_extent_size(&Extent::new(xmin, ymin, xmax, ymax), cols, rows)
            .map(|g| (g.extent.to_tuple(), (g.height, g.width)))
    })
}
