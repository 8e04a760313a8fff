use pyo3::prelude::*;

mod extent;
mod reproject;

/// Register all Python-visible functions and types.
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(reproject::reproject_array, m)?)?;
    m.add_function(wrap_pyfunction!(extent::dest_extent_size, m)?)?;
    Ok(())
}
