//! PyO3 binding for reproject_array.

use std::sync::Arc;

use ndarray::Array2;
use numpy::{PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::geometry::Extent;
use crate::proj::crs::ReferenceSystem;
use crate::proj::datum::NO_DATUM_TRANSFORM;
use crate::projector::{Precision, RasterProjector};
use crate::provider::MemoryRaster;

/// Reproject a 2D f64 array from one CRS to another.
///
/// Args:
///     src: Input 2D array (f64). For other dtypes, cast on the Python side.
///     src_crs: Source CRS string (e.g. "EPSG:32633" or PROJ string).
///     src_bounds: Source extent as (xmin, ymin, xmax, ymax).
///     dst_crs: Destination CRS string.
///     dst_bounds: Destination extent as (xmin, ymin, xmax, ymax).
///     dst_shape: Output shape as (rows, cols) tuple.
///     precision: "approximate" (default) or "exact".
///     nodata: Optional nodata value. Without one, missing pixels are NaN.
///
/// Returns:
///     Reprojected 2D array (f64).
#[pyfunction]
#[pyo3(signature = (src, src_crs, src_bounds, dst_crs, dst_bounds, dst_shape, precision="approximate", nodata=None))]
#[allow(clippy::too_many_arguments)]
pub fn reproject_array<'py>(
    py: Python<'py>,
    src: PyReadonlyArray2<'py, f64>,
    src_crs: &str,
    src_bounds: (f64, f64, f64, f64),
    dst_crs: &str,
    dst_bounds: (f64, f64, f64, f64),
    dst_shape: (usize, usize),
    precision: &str,
    nodata: Option<f64>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let precision = Precision::from_name(precision)
        .ok_or_else(|| PyValueError::new_err(format!("Unknown precision: {precision}")))?;

    // Copy strings to owned before releasing GIL
    let src_crs = ReferenceSystem::new(src_crs);
    let dst_crs = ReferenceSystem::new(dst_crs);

    let src_array: Array2<f64> = src.as_array().to_owned();

    let result: Array2<f64> = py.allow_threads(move || {
        let (xmin, ymin, xmax, ymax) = src_bounds;
        let raster = MemoryRaster::new(vec![src_array], Extent::new(xmin, ymin, xmax, ymax), nodata)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        let mut projector = RasterProjector::new();
        projector.set_crs(src_crs, dst_crs, NO_DATUM_TRANSFORM, NO_DATUM_TRANSFORM);
        projector.set_precision(precision);
        projector.set_input(Arc::new(raster));

        let (xmin, ymin, xmax, ymax) = dst_bounds;
        let (rows, cols) = dst_shape;
        projector
            .block(1, &Extent::new(xmin, ymin, xmax, ymax), cols, rows, None)
            .map(|block| block.into_array())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    })?;

    Ok(PyArray2::from_owned_array(py, result))
}
