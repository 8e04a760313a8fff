//! Persisted projector configuration.

use serde::{Deserialize, Serialize};

use crate::error::ProjectorError;
use crate::proj::crs::ReferenceSystem;
use crate::proj::datum::NO_DATUM_TRANSFORM;
use crate::projector::Precision;

fn no_datum_transform() -> i32 {
    NO_DATUM_TRANSFORM
}

/// The part of a [`RasterProjector`](crate::projector::RasterProjector) that
/// survives a save/load cycle. Nothing else is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorSettings {
    #[serde(default)]
    pub source_crs: ReferenceSystem,
    #[serde(default)]
    pub destination_crs: ReferenceSystem,
    #[serde(default = "no_datum_transform")]
    pub source_datum_transform: i32,
    #[serde(default = "no_datum_transform")]
    pub destination_datum_transform: i32,
    #[serde(default)]
    pub precision: Precision,
}

impl Default for ProjectorSettings {
    fn default() -> Self {
        Self {
            source_crs: ReferenceSystem::invalid(),
            destination_crs: ReferenceSystem::invalid(),
            source_datum_transform: NO_DATUM_TRANSFORM,
            destination_datum_transform: NO_DATUM_TRANSFORM,
            precision: Precision::default(),
        }
    }
}

impl ProjectorSettings {
    pub fn to_json(&self) -> Result<String, ProjectorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, ProjectorError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_layout() {
        let settings = ProjectorSettings {
            source_crs: ReferenceSystem::new("EPSG:32633"),
            destination_crs: ReferenceSystem::new("EPSG:4326"),
            source_datum_transform: 1,
            destination_datum_transform: NO_DATUM_TRANSFORM,
            precision: Precision::Exact,
        };
        let value: serde_json::Value = serde_json::from_str(&settings.to_json().unwrap()).unwrap();
        assert_eq!(value["source_crs"], "EPSG:32633");
        assert_eq!(value["destination_crs"], "EPSG:4326");
        assert_eq!(value["source_datum_transform"], 1);
        assert_eq!(value["destination_datum_transform"], -1);
        assert_eq!(value["precision"], "exact");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let s = ProjectorSettings::from_json(r#"{"source_crs": "EPSG:4326"}"#).unwrap();
        assert_eq!(s.source_crs, ReferenceSystem::new("EPSG:4326"));
        assert!(!s.destination_crs.is_valid());
        assert_eq!(s.source_datum_transform, NO_DATUM_TRANSFORM);
        assert_eq!(s.destination_datum_transform, NO_DATUM_TRANSFORM);
        assert_eq!(s.precision, Precision::Approximate);
    }

    #[test]
    fn test_lowercase_crs_codes_are_normalized() {
        let s = ProjectorSettings::from_json(
            r#"{"source_crs": "epsg:4326", "destination_crs": "Epsg:32633"}"#,
        )
        .unwrap();
        assert_eq!(s.source_crs, ReferenceSystem::new("EPSG:4326"));
        assert_eq!(s.destination_crs.epsg(), Some(32633));
    }

    #[test]
    fn test_malformed_document() {
        let res = ProjectorSettings::from_json(r#"{"precision": "sloppy"}"#);
        assert!(matches!(res, Err(ProjectorError::Settings(_))));
        assert!(ProjectorSettings::from_json("not json").is_err());
    }
}
