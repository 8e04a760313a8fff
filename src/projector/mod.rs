//! On-the-fly raster reprojection.
//!
//! [`RasterProjector`] sits in front of a [`SourceRasterProvider`] in the
//! source CRS and serves blocks in the destination CRS. Each request builds an
//! [`ApproximationGrid`] for the destination window, fetches the matching
//! source window once, and copies the nearest source sample into every
//! destination pixel.

pub mod extent;
pub mod grid;
pub mod settings;

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::block::RasterBlock;
use crate::error::ProjectorError;
use crate::feedback::Feedback;
use crate::geometry::{Extent, RasterGeometry};
use crate::proj::crs::{Proj4Factory, ReferenceSystem, TransformFactory};
use crate::proj::datum::NO_DATUM_TRANSFORM;
use crate::proj::Direction;
use crate::provider::SourceRasterProvider;

pub use extent::extent_size;
pub use grid::ApproximationGrid;
pub use settings::ProjectorSettings;

/// How destination pixels are mapped back to the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Interpolate from an adaptive control point grid. Falls back to exact
    /// when the grid cannot meet the tolerance.
    #[default]
    Approximate,
    /// Transform every destination pixel center.
    Exact,
}

impl Precision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Approximate => "Approximate",
            Self::Exact => "Exact",
        }
    }

    /// Parse from a string name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approximate" | "approx" => Some(Self::Approximate),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tuning knobs for [`ApproximationGrid`].
#[derive(Clone, Debug, PartialEq)]
pub struct GridOptions {
    /// Control points per axis before refinement.
    pub initial_size: usize,
    /// Control points per axis sampled in exact mode, used only to find the
    /// source window.
    pub exact_sample_size: usize,
    /// Largest allowed interpolation error, in destination pixels.
    pub tolerance_px: f64,
    /// The grid gives up once `rows * cols` exceeds this fraction of the
    /// destination pixel count. Must be in `(0, 1]`.
    pub max_matrix_fraction: f64,
    /// Hard cap on refinement passes.
    pub max_iterations: usize,
    /// Keep an all-valid grid that hit `max_iterations` instead of switching
    /// to exact mode.
    pub accept_best_effort: bool,
    /// Source pixels are made this much finer than the estimated size.
    pub src_resolution_factor: f64,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            initial_size: 3,
            exact_sample_size: 11,
            tolerance_px: 1.0,
            max_matrix_fraction: 0.25,
            max_iterations: 32,
            accept_best_effort: false,
            src_resolution_factor: 0.75,
        }
    }
}

impl GridOptions {
    pub fn validate(&self) -> Result<(), ProjectorError> {
        let bad = |msg: String| Err(ProjectorError::InvalidConfig(msg));
        if self.initial_size < 2 {
            return bad(format!("initial_size must be >= 2, got {}", self.initial_size));
        }
        if self.exact_sample_size < 2 {
            return bad(format!(
                "exact_sample_size must be >= 2, got {}",
                self.exact_sample_size
            ));
        }
        if !(self.tolerance_px > 0.0) {
            return bad(format!("tolerance_px must be > 0, got {}", self.tolerance_px));
        }
        if !(self.max_matrix_fraction > 0.0 && self.max_matrix_fraction <= 1.0) {
            return bad(format!(
                "max_matrix_fraction must be in (0, 1], got {}",
                self.max_matrix_fraction
            ));
        }
        if !(self.src_resolution_factor > 0.0) {
            return bad(format!(
                "src_resolution_factor must be > 0, got {}",
                self.src_resolution_factor
            ));
        }
        Ok(())
    }
}

/// Serves blocks of a source raster reprojected into another CRS.
///
/// Cloning copies the configuration and shares the input provider and
/// transform factory. No per-request state is kept.
#[derive(Clone)]
pub struct RasterProjector {
    src_crs: ReferenceSystem,
    dest_crs: ReferenceSystem,
    src_datum_transform: i32,
    dest_datum_transform: i32,
    precision: Precision,
    options: GridOptions,
    factory: Arc<dyn TransformFactory>,
    input: Option<Arc<dyn SourceRasterProvider>>,
}

impl Default for RasterProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RasterProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterProjector")
            .field("src_crs", &self.src_crs)
            .field("dest_crs", &self.dest_crs)
            .field("src_datum_transform", &self.src_datum_transform)
            .field("dest_datum_transform", &self.dest_datum_transform)
            .field("precision", &self.precision)
            .field("options", &self.options)
            .field("has_input", &self.input.is_some())
            .finish()
    }
}

impl RasterProjector {
    /// Projector with unset CRSs, approximate precision and proj4rs transforms.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(Proj4Factory::new()))
    }

    /// Projector building its transforms through `factory`.
    pub fn with_factory(factory: Arc<dyn TransformFactory>) -> Self {
        Self {
            src_crs: ReferenceSystem::invalid(),
            dest_crs: ReferenceSystem::invalid(),
            src_datum_transform: NO_DATUM_TRANSFORM,
            dest_datum_transform: NO_DATUM_TRANSFORM,
            precision: Precision::default(),
            options: GridOptions::default(),
            factory,
            input: None,
        }
    }

    pub fn set_input(&mut self, input: Arc<dyn SourceRasterProvider>) {
        self.input = Some(input);
    }

    pub fn input(&self) -> Option<&Arc<dyn SourceRasterProvider>> {
        self.input.as_ref()
    }

    /// Bands of the input, 0 without one.
    pub fn band_count(&self) -> usize {
        self.input.as_ref().map_or(0, |i| i.band_count())
    }

    /// Configure the CRS pair. Datum transform ids of
    /// [`NO_DATUM_TRANSFORM`] select no explicit datum step.
    pub fn set_crs(
        &mut self,
        src: ReferenceSystem,
        dest: ReferenceSystem,
        src_datum_transform: i32,
        dest_datum_transform: i32,
    ) {
        self.src_crs = src;
        self.dest_crs = dest;
        self.src_datum_transform = src_datum_transform;
        self.dest_datum_transform = dest_datum_transform;
    }

    pub fn source_crs(&self) -> &ReferenceSystem {
        &self.src_crs
    }

    pub fn destination_crs(&self) -> &ReferenceSystem {
        &self.dest_crs
    }

    pub fn source_datum_transform(&self) -> i32 {
        self.src_datum_transform
    }

    pub fn destination_datum_transform(&self) -> i32 {
        self.dest_datum_transform
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = precision;
    }

    pub fn grid_options(&self) -> &GridOptions {
        &self.options
    }

    pub fn set_grid_options(&mut self, options: GridOptions) -> Result<(), ProjectorError> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    /// True if requests go straight to the input: either CRS is unset, or
    /// both are the same with no datum step.
    pub fn is_pass_through(&self) -> bool {
        if !self.src_crs.is_valid() || !self.dest_crs.is_valid() {
            return true;
        }
        self.src_crs == self.dest_crs
            && self.src_datum_transform == NO_DATUM_TRANSFORM
            && self.dest_datum_transform == NO_DATUM_TRANSFORM
    }

    /// Destination window and pixel size matching a source window.
    ///
    /// `None` when there is nothing to reproject (pass-through), the window
    /// is degenerate, or no representative point can be transformed.
    pub fn dest_extent_size(
        &self,
        src_extent: &Extent,
        src_width: usize,
        src_height: usize,
    ) -> Option<RasterGeometry> {
        if self.is_pass_through() {
            return None;
        }
        let transform = match self.factory.create(
            &self.src_crs,
            &self.dest_crs,
            self.src_datum_transform,
            self.dest_datum_transform,
        ) {
            Ok(t) => t,
            Err(e) => {
                debug!("cannot build transform {} -> {}: {e}", self.src_crs, self.dest_crs);
                return None;
            }
        };
        let src = RasterGeometry::new(*src_extent, src_width, src_height);
        extent_size(transform.as_ref(), Direction::Forward, &src)
    }

    /// Read `band` (1-based) for the destination window `extent` at
    /// `width` x `height` pixels.
    ///
    /// Pixels without a source sample are no-data. Cancelling through
    /// `feedback` stops at the next row and returns what was filled so far.
    pub fn block(
        &self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
        feedback: Option<&Feedback>,
    ) -> Result<RasterBlock, ProjectorError> {
        self.read_block(band, extent, width, height, feedback, (0.0, 1.0))
    }

    /// [`Self::block`] reporting row progress into `start + span * fraction`.
    fn read_block(
        &self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
        feedback: Option<&Feedback>,
        (start, span): (f64, f64),
    ) -> Result<RasterBlock, ProjectorError> {
        let input = self.input.as_ref().ok_or(ProjectorError::MissingInput)?;
        if band == 0 || band > input.band_count() {
            return Err(ProjectorError::InvalidConfig(format!(
                "band {band} out of range 1..={}",
                input.band_count()
            )));
        }

        let dest = RasterGeometry::new(*extent, width, height);
        if dest.is_empty() {
            debug!("empty destination window {extent:?} ({width}x{height})");
            return Ok(RasterBlock::empty());
        }

        let nodata = input.nodata(band);
        if feedback.is_some_and(Feedback::is_canceled) {
            debug!("block request canceled before start");
            return Ok(RasterBlock::filled_no_data(width, height, nodata));
        }

        if self.is_pass_through() {
            trace!("pass-through {} -> {}", self.src_crs, self.dest_crs);
            return input.block(band, extent, width, height, feedback);
        }

        let transform = self.factory.create(
            &self.src_crs,
            &self.dest_crs,
            self.src_datum_transform,
            self.dest_datum_transform,
        )?;
        let mut grid = ApproximationGrid::new(
            dest,
            input.as_ref(),
            transform.as_ref(),
            self.precision,
            &self.options,
        );

        let mut out = RasterBlock::filled_no_data(width, height, nodata);
        if grid.src_rows() == 0 || grid.src_cols() == 0 {
            debug!("destination window {extent:?} has no source pixels");
            return Ok(out);
        }

        let src_block = input.block(
            band,
            &grid.src_extent(),
            grid.src_cols(),
            grid.src_rows(),
            feedback,
        )?;
        if src_block.is_empty() {
            return Ok(out);
        }

        for row in 0..height {
            if feedback.is_some_and(Feedback::is_canceled) {
                debug!("block canceled at row {row} of {height}");
                break;
            }
            for col in 0..width {
                let Some((src_row, src_col)) = grid.src_row_col(row, col) else {
                    continue;
                };
                match src_block.get(src_row, src_col) {
                    Some(v) if !src_block.is_no_data_value(v) => out.set_value(row, col, v),
                    _ => {}
                }
            }
            if let Some(fb) = feedback {
                fb.set_progress(start + span * (row + 1) as f64 / height as f64);
            }
        }
        Ok(out)
    }

    /// Read several bands of the same window, one after the other.
    ///
    /// Every band builds its own grid. Progress on `feedback` covers all
    /// bands, and bands requested after a cancel come back as no-data.
    /// Parallel reads belong to the caller: clone the projector per worker.
    pub fn blocks(
        &self,
        bands: &[usize],
        extent: &Extent,
        width: usize,
        height: usize,
        feedback: Option<&Feedback>,
    ) -> Result<Vec<RasterBlock>, ProjectorError> {
        let span = 1.0 / bands.len().max(1) as f64;
        bands
            .iter()
            .enumerate()
            .map(|(i, &band)| {
                let block =
                    self.read_block(band, extent, width, height, feedback, (i as f64 * span, span))?;
                if let Some(fb) = feedback.filter(|fb| !fb.is_canceled()) {
                    fb.set_progress((i + 1) as f64 * span);
                }
                Ok(block)
            })
            .collect()
    }

    /// Snapshot of the persisted configuration.
    pub fn write_settings(&self) -> ProjectorSettings {
        ProjectorSettings {
            source_crs: self.src_crs.clone(),
            destination_crs: self.dest_crs.clone(),
            source_datum_transform: self.src_datum_transform,
            destination_datum_transform: self.dest_datum_transform,
            precision: self.precision,
        }
    }

    /// Restore a configuration written by [`Self::write_settings`].
    pub fn read_settings(&mut self, settings: &ProjectorSettings) {
        self.set_crs(
            settings.source_crs.clone(),
            settings.destination_crs.clone(),
            settings.source_datum_transform,
            settings.destination_datum_transform,
        );
        self.precision = settings.precision;
    }
}
