//! Datum transform selectors.
//!
//! A datum transform id picks an explicit Helmert shift (`+towgs84`) to use
//! for one side of a CRS pair instead of whatever the CRS definition carries.
//! `NO_DATUM_TRANSFORM` (-1) keeps the definition untouched.

use std::collections::HashMap;

use crate::error::ProjError;

pub const NO_DATUM_TRANSFORM: i32 = -1;

/// Registered `+towgs84` parameter sets keyed by datum transform id.
#[derive(Clone, Debug, Default)]
pub struct DatumTransformRegistry {
    entries: HashMap<i32, String>,
}

impl DatumTransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a 3- or 7-parameter Helmert shift under `id`.
    ///
    /// `params` is the comma separated `+towgs84` value, e.g. `"-87,-98,-121"`.
    pub fn register(&mut self, id: i32, params: &str) -> Result<(), ProjError> {
        if id < 0 {
            return Err(ProjError::InvalidParameter(format!(
                "datum transform id must be >= 0, got {id}"
            )));
        }
        let values: Vec<&str> = params.split(',').map(str::trim).collect();
        if values.len() != 3 && values.len() != 7 {
            return Err(ProjError::InvalidParameter(format!(
                "towgs84 needs 3 or 7 values, got {}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| v.parse::<f64>().is_err()) {
            return Err(ProjError::InvalidParameter(format!(
                "towgs84 value is not a number: {bad:?}"
            )));
        }
        self.entries.insert(id, values.join(","));
        Ok(())
    }

    pub fn get(&self, id: i32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite a PROJ string so it uses datum transform `id`.
    pub fn apply(&self, proj_string: &str, id: i32) -> Result<String, ProjError> {
        if id == NO_DATUM_TRANSFORM {
            return Ok(proj_string.to_string());
        }
        let params = self
            .get(id)
            .ok_or(ProjError::UnknownDatumTransform(id))?;
        let mut tokens: Vec<&str> = proj_string
            .split_whitespace()
            .filter(|t| !t.starts_with("+towgs84=") && !t.starts_with("+nadgrids="))
            .collect();
        let shift = format!("+towgs84={params}");
        tokens.push(&shift);
        Ok(tokens.join(" "))
    }
}
