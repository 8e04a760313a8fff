use std::fmt;

use log::trace;
use proj4rs::Proj;
use serde::{Deserialize, Serialize};

use crate::error::ProjError;
use crate::proj::datum::DatumTransformRegistry;
use crate::proj::{CoordinateTransform, Direction};

/// A coordinate reference system, identified by its user definition.
///
/// Accepts EPSG codes ("EPSG:4326") or PROJ strings ("+proj=utm +zone=33 ...").
/// An empty definition is the unset/invalid CRS.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ReferenceSystem {
    definition: String,
}

impl ReferenceSystem {
    pub fn new(definition: &str) -> Self {
        let trimmed = definition.trim();
        let definition = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("epsg:") => {
                format!("EPSG:{}", trimmed[5..].trim())
            }
            _ => trimmed.to_string(),
        };
        Self { definition }
    }

    pub fn from_epsg(code: u16) -> Self {
        Self {
            definition: format!("EPSG:{code}"),
        }
    }

    /// The unset CRS.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        !self.definition.is_empty()
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn epsg(&self) -> Option<u16> {
        self.definition.strip_prefix("EPSG:")?.parse().ok()
    }

    /// Resolve to a PROJ string, looking EPSG codes up in crs-definitions.
    pub fn proj_string(&self) -> Result<String, ProjError> {
        if !self.is_valid() {
            return Err(ProjError::UnknownCrs("<unset>".into()));
        }
        if let Some(code) = self.epsg() {
            return crs_definitions::from_code(code)
                .map(|def| def.proj4.to_string())
                .ok_or_else(|| ProjError::UnknownCrs(self.definition.clone()));
        }
        if self.definition.starts_with('+') {
            return Ok(self.definition.clone());
        }
        Err(ProjError::UnknownCrs(self.definition.clone()))
    }
}

impl From<String> for ReferenceSystem {
    fn from(definition: String) -> Self {
        Self::new(&definition)
    }
}

impl From<ReferenceSystem> for String {
    fn from(crs: ReferenceSystem) -> Self {
        crs.definition
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.write_str(&self.definition)
        } else {
            f.write_str("<unset>")
        }
    }
}

/// proj4rs backed transform for a (source, destination) CRS pair.
///
/// proj4rs uses radians for geographic CRS while rasters in EPSG:4326-like
/// systems are georeferenced in degrees; the conversion is handled here.
pub struct CrsTransform {
    src: Proj,
    dst: Proj,
    src_is_geo: bool,
    dst_is_geo: bool,
}

impl CrsTransform {
    pub fn new(src: &ReferenceSystem, dst: &ReferenceSystem) -> Result<Self, ProjError> {
        Self::from_proj_strings(&src.proj_string()?, &dst.proj_string()?)
    }

    pub fn from_proj_strings(src: &str, dst: &str) -> Result<Self, ProjError> {
        let src_proj = Proj::from_proj_string(src)
            .map_err(|e| ProjError::UnknownCrs(format!("{src}: {e}")))?;
        let dst_proj = Proj::from_proj_string(dst)
            .map_err(|e| ProjError::UnknownCrs(format!("{dst}: {e}")))?;
        let src_is_geo = src_proj.is_latlong();
        let dst_is_geo = dst_proj.is_latlong();
        Ok(Self {
            src: src_proj,
            dst: dst_proj,
            src_is_geo,
            dst_is_geo,
        })
    }
}

impl CoordinateTransform for CrsTransform {
    fn transform(&self, x: f64, y: f64, direction: Direction) -> Result<(f64, f64), ProjError> {
        let (from, to, from_geo, to_geo) = match direction {
            Direction::Forward => (&self.src, &self.dst, self.src_is_geo, self.dst_is_geo),
            Direction::Inverse => (&self.dst, &self.src, self.dst_is_geo, self.src_is_geo),
        };

        let mut point = if from_geo {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };

        proj4rs::transform::transform(from, to, &mut point)
            .map_err(|e| ProjError::TransformFailed(e.to_string()))?;

        let out = if to_geo {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            point
        };

        if !out.0.is_finite() || !out.1.is_finite() {
            return Err(ProjError::TransformFailed(format!(
                "({x}, {y}) maps to a non-finite coordinate"
            )));
        }
        Ok(out)
    }
}

/// Builds the coordinate transform for a configured CRS pair.
pub trait TransformFactory: Send + Sync {
    fn create(
        &self,
        src: &ReferenceSystem,
        dst: &ReferenceSystem,
        src_datum_transform: i32,
        dst_datum_transform: i32,
    ) -> Result<Box<dyn CoordinateTransform>, ProjError>;
}

/// Default factory: proj4rs transforms with optional registered datum shifts.
#[derive(Clone, Debug, Default)]
pub struct Proj4Factory {
    datums: DatumTransformRegistry,
}

impl Proj4Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datum_transforms(datums: DatumTransformRegistry) -> Self {
        Self { datums }
    }

    pub fn datum_transforms(&self) -> &DatumTransformRegistry {
        &self.datums
    }
}

impl TransformFactory for Proj4Factory {
    fn create(
        &self,
        src: &ReferenceSystem,
        dst: &ReferenceSystem,
        src_datum_transform: i32,
        dst_datum_transform: i32,
    ) -> Result<Box<dyn CoordinateTransform>, ProjError> {
        let src_def = self.datums.apply(&src.proj_string()?, src_datum_transform)?;
        let dst_def = self.datums.apply(&dst.proj_string()?, dst_datum_transform)?;
        trace!("building transform {src_def:?} -> {dst_def:?}");
        Ok(Box::new(CrsTransform::from_proj_strings(&src_def, &dst_def)?))
    }
}
