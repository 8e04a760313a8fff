//! On-the-fly raster reprojection with an adaptive approximation grid.

pub mod block;
pub mod error;
pub mod feedback;
pub mod geometry;
pub mod proj;
pub mod projector;
pub mod provider;

#[cfg(feature = "python")]
mod py;

pub use block::RasterBlock;
pub use error::{ProjError, ProjectorError};
pub use feedback::Feedback;
pub use geometry::{Extent, RasterGeometry};
pub use projector::{GridOptions, Precision, RasterProjector};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn _rasterproj(m: &Bound<'_, PyModule>) -> PyResult<()> {
    py::register(m)?;
    Ok(())
}
