//! Source raster access.

use ndarray::{Array2, ArrayView2};
use num_traits::NumCast;

use crate::block::RasterBlock;
use crate::error::ProjectorError;
use crate::feedback::Feedback;
use crate::geometry::{Extent, RasterGeometry};

/// Anything the projector can pull source samples from.
///
/// Bands are numbered from 1.
pub trait SourceRasterProvider: Send + Sync {
    /// Full extent of the source in its own CRS.
    fn extent(&self) -> Extent;

    /// Native width in pixels, 0 if the source has no fixed resolution.
    fn width(&self) -> usize;

    /// Native height in pixels, 0 if the source has no fixed resolution.
    fn height(&self) -> usize;

    fn band_count(&self) -> usize;

    fn nodata(&self, band: usize) -> Option<f64>;

    /// Read `band` resampled onto the grid `extent` x (`width`, `height`).
    ///
    /// Pixels outside the source come back as no-data.
    fn block(
        &self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
        feedback: Option<&Feedback>,
    ) -> Result<RasterBlock, ProjectorError>;

    /// True if the source has a fixed native pixel size.
    fn has_native_size(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// In-memory multi-band raster.
#[derive(Clone, Debug)]
pub struct MemoryRaster {
    bands: Vec<Array2<f64>>,
    geometry: RasterGeometry,
    nodata: Option<f64>,
}

impl MemoryRaster {
    pub fn new(
        bands: Vec<Array2<f64>>,
        extent: Extent,
        nodata: Option<f64>,
    ) -> Result<Self, ProjectorError> {
        let first = bands
            .first()
            .ok_or_else(|| ProjectorError::Provider("raster needs at least one band".into()))?;
        let (rows, cols) = first.dim();
        if rows == 0 || cols == 0 {
            return Err(ProjectorError::Provider("raster has no pixels".into()));
        }
        if let Some(bad) = bands.iter().position(|b| b.dim() != (rows, cols)) {
            return Err(ProjectorError::Provider(format!(
                "band {} is {:?}, expected {:?}",
                bad + 1,
                bands[bad].dim(),
                (rows, cols)
            )));
        }
        if extent.is_empty() {
            return Err(ProjectorError::Provider(format!(
                "raster extent {extent:?} is empty"
            )));
        }
        Ok(Self {
            bands,
            geometry: RasterGeometry::new(extent, cols, rows),
            nodata,
        })
    }

    /// Single band raster from any numeric array.
    pub fn from_view<T>(
        view: &ArrayView2<'_, T>,
        extent: Extent,
        nodata: Option<T>,
    ) -> Result<Self, ProjectorError>
    where
        T: Copy + NumCast,
    {
        let block = RasterBlock::from_view(view, nodata);
        let nodata = block.nodata_value();
        Self::new(vec![block.into_array()], extent, nodata)
    }

    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    pub fn band(&self, band: usize) -> Option<ArrayView2<'_, f64>> {
        band.checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .map(|b| b.view())
    }
}

impl SourceRasterProvider for MemoryRaster {
    fn extent(&self) -> Extent {
        self.geometry.extent
    }

    fn width(&self) -> usize {
        self.geometry.width
    }

    fn height(&self) -> usize {
        self.geometry.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn nodata(&self, _band: usize) -> Option<f64> {
        self.nodata
    }

    fn block(
        &self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
        feedback: Option<&Feedback>,
    ) -> Result<RasterBlock, ProjectorError> {
        let src = self.band(band).ok_or_else(|| {
            ProjectorError::Provider(format!(
                "band {band} out of range 1..={}",
                self.bands.len()
            ))
        })?;

        let request = RasterGeometry::new(*extent, width, height);
        if request.is_empty() {
            return Ok(RasterBlock::empty());
        }

        let mut out = RasterBlock::filled_no_data(width, height, self.nodata);
        for row in 0..height {
            if feedback.is_some_and(Feedback::is_canceled) {
                break;
            }
            for col in 0..width {
                // Nearest neighbour: the source pixel containing the request pixel center
                let (x, y) = request.pixel_center(row, col);
                if let Some(idx) = self.geometry.pixel_at(x, y) {
                    out.set_value(row, col, src[idx]);
                }
            }
        }
        Ok(out)
    }
}
