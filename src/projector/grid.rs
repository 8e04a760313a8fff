//! Approximation grid mapping destination pixels to source pixels.
//!
//! A coarse matrix of control points is laid over the destination window and
//! each vertex is transformed to the source CRS. The matrix is refined by
//! inserting rows/columns until interpolating between neighbours reproduces
//! the exact transform within tolerance, checked at every odd row/column:
//! the midpoint of its two neighbours is transformed back to the destination
//! and compared with the vertex. If the matrix would grow past its size
//! budget, or a vertex cannot be transformed, every pixel is transformed
//! exactly instead.
//!
//! In approximate mode per-pixel lookups interpolate linearly along the matrix
//! rows into two helper arrays (top/bottom of the current matrix row band),
//! then linearly between those. The helpers slide down as destination rows
//! increase, so lookups must be issued in non-decreasing row order for the
//! cheap path; going back up rebuilds them from the matrix.
//!
//! The source window is the bounding box of the source points of every
//! destination pixel center, so the coarse matrix never hides a pixel that
//! has a source sample.

use std::fmt::Write as _;

use log::{debug, trace};

use crate::geometry::{Extent, RasterGeometry};
use crate::proj::{CoordinateTransform, Direction};
use crate::projector::extent::extent_size;
use crate::projector::{GridOptions, Precision};
use crate::provider::SourceRasterProvider;

/// A destination vertex's position in the source CRS.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlPoint {
    pub x: f64,
    pub y: f64,
    /// False if the vertex could not be transformed.
    pub valid: bool,
}

impl ControlPoint {
    fn invalid() -> Self {
        Self::default()
    }

    fn sqr_dist(&self, other: &ControlPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Rows x cols control points spanning the destination extent edge to edge.
#[derive(Clone, Debug)]
pub struct ControlPointMatrix {
    points: Vec<Vec<ControlPoint>>,
    cols: usize,
}

impl ControlPointMatrix {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            points: vec![vec![ControlPoint::invalid(); cols]; rows],
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.points.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> ControlPoint {
        self.points[row][col]
    }

    fn set(&mut self, row: usize, col: usize, cp: ControlPoint) {
        self.points[row][col] = cp;
    }

    pub fn all_valid(&self) -> bool {
        self.points.iter().flatten().all(|cp| cp.valid)
    }

    /// Insert an empty row between every pair of rows.
    fn split_rows(&mut self) {
        let old = std::mem::take(&mut self.points);
        let n = old.len();
        for (i, row) in old.into_iter().enumerate() {
            self.points.push(row);
            if i + 1 < n {
                self.points.push(vec![ControlPoint::invalid(); self.cols]);
            }
        }
    }

    /// Insert an empty column between every pair of columns.
    fn split_cols(&mut self) {
        for row in &mut self.points {
            let old = std::mem::take(row);
            let n = old.len();
            for (i, cp) in old.into_iter().enumerate() {
                row.push(cp);
                if i + 1 < n {
                    row.push(ControlPoint::invalid());
                }
            }
        }
        self.cols += self.cols.saturating_sub(1);
    }
}

/// Per-request destination -> source pixel mapping.
///
/// Built for one destination window and discarded after the block is produced.
pub struct ApproximationGrid<'a> {
    transform: &'a dyn CoordinateTransform,
    approximate: bool,

    dest: RasterGeometry,
    dest_x_res: f64,
    dest_y_res: f64,

    /// Full extent of the source raster.
    provider_extent: Extent,
    /// Native source resolution, 0 when the source has none.
    max_src_x_res: f64,
    max_src_y_res: f64,

    src_extent: Extent,
    src_rows: usize,
    src_cols: usize,
    src_x_res: f64,
    src_y_res: f64,

    matrix: ControlPointMatrix,
    dest_rows_per_matrix_row: f64,
    dest_cols_per_matrix_col: f64,
    sqr_tolerance: f64,
    refinements: usize,

    helper_top: Vec<(f64, f64)>,
    helper_bottom: Vec<(f64, f64)>,
    helper_top_row: usize,
}

impl<'a> ApproximationGrid<'a> {
    /// Build the grid for `dest`.
    ///
    /// `transform` must map source CRS -> destination CRS in its forward
    /// direction; the grid uses its inverse for control points.
    pub fn new(
        dest: RasterGeometry,
        provider: &dyn SourceRasterProvider,
        transform: &'a dyn CoordinateTransform,
        precision: Precision,
        options: &GridOptions,
    ) -> Self {
        let dest_x_res = dest.x_res();
        let dest_y_res = dest.y_res();
        let dest_res = dest_x_res.min(dest_y_res);
        let tolerance = dest_res * options.tolerance_px;

        let provider_extent = provider.extent();
        let (max_src_x_res, max_src_y_res) = if provider.has_native_size() {
            (
                provider_extent.width() / provider.width() as f64,
                provider_extent.height() / provider.height() as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let size = match precision {
            Precision::Approximate => options.initial_size,
            Precision::Exact => options.exact_sample_size,
        }
        .max(2);

        let mut grid = Self {
            transform,
            approximate: precision == Precision::Approximate,
            dest,
            dest_x_res,
            dest_y_res,
            provider_extent,
            max_src_x_res,
            max_src_y_res,
            src_extent: Extent::default(),
            src_rows: 0,
            src_cols: 0,
            src_x_res: 0.0,
            src_y_res: 0.0,
            matrix: ControlPointMatrix::new(size, size),
            dest_rows_per_matrix_row: 0.0,
            dest_cols_per_matrix_col: 0.0,
            sqr_tolerance: tolerance * tolerance,
            refinements: 0,
            helper_top: Vec::new(),
            helper_bottom: Vec::new(),
            helper_top_row: 0,
        };

        if dest.is_empty() {
            grid.approximate = false;
            return grid;
        }

        for row in 0..grid.matrix.rows() {
            grid.calc_row(row);
        }

        if grid.approximate {
            grid.refine(options);
        }
        debug!(
            "control point matrix {}x{} after {} refinements, approximate={}",
            grid.matrix.rows(),
            grid.matrix.cols(),
            grid.refinements,
            grid.approximate
        );

        grid.dest_rows_per_matrix_row = dest.height as f64 / (grid.matrix.rows() - 1) as f64;
        grid.dest_cols_per_matrix_col = dest.width as f64 / (grid.matrix.cols() - 1) as f64;

        if grid.approximate {
            grid.helper_top = grid.calc_helper(0);
            grid.helper_bottom = grid.calc_helper(1);
            grid.helper_top_row = 0;
        }

        grid.calc_src_extent();
        grid.calc_src_rows_cols(options);
        if grid.src_rows > 0 && grid.src_cols > 0 {
            grid.src_x_res = grid.src_extent.width() / grid.src_cols as f64;
            grid.src_y_res = grid.src_extent.height() / grid.src_rows as f64;
        }
        grid
    }

    fn refine(&mut self, options: &GridOptions) {
        // never more control points than destination pixels
        let fraction = options.max_matrix_fraction.min(1.0);
        let budget = fraction * (self.dest.height * self.dest.width) as f64;
        loop {
            let cols_ok = self.check_cols();
            if !cols_ok {
                self.insert_rows();
            }
            let rows_ok = self.check_rows();
            if !rows_ok {
                self.insert_cols();
            }
            if cols_ok && rows_ok {
                trace!("control point matrix within tolerance");
                return;
            }
            self.refinements += 1;

            if (self.matrix.rows() * self.matrix.cols()) as f64 > budget {
                debug!(
                    "control point matrix too large ({}x{}), using exact transform",
                    self.matrix.rows(),
                    self.matrix.cols()
                );
                self.approximate = false;
                return;
            }
            if self.refinements >= options.max_iterations {
                if options.accept_best_effort && self.matrix.all_valid() {
                    debug!("tolerance not met after {} refinements, keeping approximation", self.refinements);
                } else {
                    debug!("tolerance not met after {} refinements, using exact transform", self.refinements);
                    self.approximate = false;
                }
                return;
            }
        }
    }

    /// Destination CRS position of matrix vertex (row, col).
    fn dest_point_on_matrix(&self, row: usize, col: usize) -> (f64, f64) {
        let e = &self.dest.extent;
        (
            e.xmin + col as f64 * e.width() / (self.matrix.cols() - 1) as f64,
            e.ymax - row as f64 * e.height() / (self.matrix.rows() - 1) as f64,
        )
    }

    fn calc_cp(&mut self, row: usize, col: usize) {
        let (x, y) = self.dest_point_on_matrix(row, col);
        let cp = match self.transform.inverse(x, y) {
            Ok((sx, sy)) if sx.is_finite() && sy.is_finite() => ControlPoint {
                x: sx,
                y: sy,
                valid: true,
            },
            Ok(_) => ControlPoint::invalid(),
            Err(e) => {
                trace!("control point ({row}, {col}) at ({x}, {y}) not transformable: {e}");
                ControlPoint::invalid()
            }
        };
        self.matrix.set(row, col, cp);
    }

    fn calc_row(&mut self, row: usize) {
        for col in 0..self.matrix.cols() {
            self.calc_cp(row, col);
        }
    }

    fn calc_col(&mut self, col: usize) {
        for row in 0..self.matrix.rows() {
            self.calc_cp(row, col);
        }
    }

    fn insert_rows(&mut self) {
        self.matrix.split_rows();
        trace!("inserted rows, matrix now has {}", self.matrix.rows());
        for row in (1..self.matrix.rows() - 1).step_by(2) {
            self.calc_row(row);
        }
    }

    fn insert_cols(&mut self) {
        self.matrix.split_cols();
        trace!("inserted columns, matrix now has {}", self.matrix.cols());
        for col in (1..self.matrix.cols() - 1).step_by(2) {
            self.calc_col(col);
        }
    }

    /// True if `mid` is reproduced by the midpoint of `a` and `b` within tolerance.
    fn within_tolerance(
        &self,
        a: ControlPoint,
        mid: ControlPoint,
        b: ControlPoint,
        dest: (f64, f64),
    ) -> bool {
        if !a.valid || !mid.valid || !b.valid {
            return false;
        }
        let approx = ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        match self.transform.forward(approx.0, approx.1) {
            Ok((dx, dy)) => {
                let d = ControlPoint {
                    x: dx,
                    y: dy,
                    valid: true,
                };
                let target = ControlPoint {
                    x: dest.0,
                    y: dest.1,
                    valid: true,
                };
                d.sqr_dist(&target) <= self.sqr_tolerance
            }
            Err(_) => false,
        }
    }

    /// Check interpolation along matrix columns (vertically).
    fn check_cols(&self) -> bool {
        for col in 0..self.matrix.cols() {
            for row in (1..self.matrix.rows() - 1).step_by(2) {
                let dest = self.dest_point_on_matrix(row, col);
                if !self.within_tolerance(
                    self.matrix.get(row - 1, col),
                    self.matrix.get(row, col),
                    self.matrix.get(row + 1, col),
                    dest,
                ) {
                    return false;
                }
            }
        }
        true
    }

    /// Check interpolation along matrix rows (horizontally).
    fn check_rows(&self) -> bool {
        for row in 0..self.matrix.rows() {
            for col in (1..self.matrix.cols() - 1).step_by(2) {
                let dest = self.dest_point_on_matrix(row, col);
                if !self.within_tolerance(
                    self.matrix.get(row, col - 1),
                    self.matrix.get(row, col),
                    self.matrix.get(row, col + 1),
                    dest,
                ) {
                    return false;
                }
            }
        }
        true
    }

    /// Bounding box of the source points of every destination pixel,
    /// clipped to the source and snapped outward to its native pixel grid.
    ///
    /// Snapping keeps reprojected pixels from jumping as the destination
    /// window pans.
    fn calc_src_extent(&mut self) {
        let mut touched: Option<Extent> = None;
        for row in 0..self.dest.height {
            for col in 0..self.dest.width {
                if let Some((x, y)) = self.src_point(row, col) {
                    match touched.as_mut() {
                        Some(e) => e.combine(x, y),
                        None => touched = Some(Extent::from_point(x, y)),
                    }
                }
            }
        }
        if self.approximate {
            self.seek_helper(0);
        }

        let Some(mut extent) = touched.and_then(|e| e.intersection(&self.provider_extent)) else {
            debug!("destination window does not overlap the source");
            self.src_extent = Extent::default();
            return;
        };

        let full = self.provider_extent;
        if self.max_src_x_res > 0.0 {
            let res = self.max_src_x_res;
            let col = ((extent.xmin - full.xmin) / res).floor();
            extent.xmin = full.xmin + col * res;
            let col = ((extent.xmax - full.xmin) / res).ceil();
            extent.xmax = full.xmin + col * res;
            // points on a single pixel edge still need that pixel
            if !(extent.width() > 0.0) {
                if extent.xmax < full.xmax {
                    extent.xmax += res;
                } else {
                    extent.xmin -= res;
                }
            }
        }
        if self.max_src_y_res > 0.0 {
            let res = self.max_src_y_res;
            let row = ((full.ymax - extent.ymax) / res).floor();
            extent.ymax = full.ymax - row * res;
            let row = ((full.ymax - extent.ymin) / res).ceil();
            extent.ymin = full.ymax - row * res;
            if !(extent.height() > 0.0) {
                if extent.ymin > full.ymin {
                    extent.ymin -= res;
                } else {
                    extent.ymax += res;
                }
            }
        }
        self.src_extent = extent;
    }

    /// Pick the source pixel size for the fetched window.
    ///
    /// Uses the finest projected matrix cell in approximate mode, the finest
    /// resolution from [`extent_size`] otherwise, never finer than the source's
    /// native resolution.
    fn calc_src_rows_cols(&mut self, options: &GridOptions) {
        if self.src_extent.is_empty() {
            self.src_rows = 0;
            self.src_cols = 0;
            return;
        }

        let mut min_size = if self.approximate {
            self.min_matrix_cell_size()
        } else if let Some(src) = extent_size(self.transform, Direction::Inverse, &self.dest) {
            src.x_res().min(src.y_res())
        } else {
            debug!(
                "cannot estimate source resolution for {:?}, using control points",
                self.dest.extent
            );
            self.min_matrix_cell_size()
        };

        min_size *= options.src_resolution_factor;

        let x_size = self.max_src_x_res.max(min_size);
        let y_size = self.max_src_y_res.max(min_size);
        self.src_cols = pixel_count(self.src_extent.width(), x_size);
        self.src_rows = pixel_count(self.src_extent.height(), y_size);
        trace!(
            "source window {:?} as {}x{} pixels",
            self.src_extent,
            self.src_cols,
            self.src_rows
        );
    }

    /// Finest source distance covered by one destination pixel over the
    /// matrix cells with valid corners, `f64::MAX` if there are none.
    fn min_matrix_cell_size(&self) -> f64 {
        let rows = self.matrix.rows();
        let cols = self.matrix.cols();
        let dest_cols_per_cell = self.dest.width as f64 / (cols - 1) as f64;
        let dest_rows_per_cell = self.dest.height as f64 / (rows - 1) as f64;
        let mut min_size = f64::MAX;
        for i in 0..rows - 1 {
            for j in 0..cols - 1 {
                let a = self.matrix.get(i, j);
                let b = self.matrix.get(i, j + 1);
                let c = self.matrix.get(i + 1, j);
                if a.valid && b.valid && c.valid {
                    min_size = min_size.min(a.sqr_dist(&b).sqrt() / dest_cols_per_cell);
                    min_size = min_size.min(a.sqr_dist(&c).sqrt() / dest_rows_per_cell);
                }
            }
        }
        min_size
    }

    /// True if a corner of matrix cell (row, col) lies inside the source.
    fn cell_touches_source(&self, m_row: usize, m_col: usize) -> bool {
        [(m_row, m_col), (m_row, m_col + 1), (m_row + 1, m_col), (m_row + 1, m_col + 1)]
            .into_iter()
            .map(|(r, c)| self.matrix.get(r, c))
            .any(|cp| cp.valid && self.provider_extent.contains(cp.x, cp.y))
    }

    fn exact_src_point(&self, dest_row: usize, dest_col: usize) -> Option<(f64, f64)> {
        let (dx, dy) = self.dest.pixel_center(dest_row, dest_col);
        let (x, y) = self.transform.inverse(dx, dy).ok()?;
        self.provider_extent.contains(x, y).then_some((x, y))
    }

    /// Source points for every destination column along matrix row `matrix_row`.
    fn calc_helper(&self, matrix_row: usize) -> Vec<(f64, f64)> {
        let matrix_row = matrix_row.min(self.matrix.rows() - 1);
        (0..self.dest.width)
            .map(|dest_col| {
                let dest_x = self.dest.extent.xmin + (dest_col as f64 + 0.5) * self.dest_x_res;
                let m_col = self.matrix_col(dest_col);
                let (x_min, _) = self.dest_point_on_matrix(matrix_row, m_col);
                let (x_max, _) = self.dest_point_on_matrix(matrix_row, m_col + 1);
                let xfrac = (dest_x - x_min) / (x_max - x_min);

                let p0 = self.matrix.get(matrix_row, m_col);
                let p1 = self.matrix.get(matrix_row, m_col + 1);
                (
                    p0.x + (p1.x - p0.x) * xfrac,
                    p0.y + (p1.y - p0.y) * xfrac,
                )
            })
            .collect()
    }

    /// Slide the helper band one matrix row down.
    fn next_helper(&mut self) {
        std::mem::swap(&mut self.helper_top, &mut self.helper_bottom);
        self.helper_top_row += 1;
        self.helper_bottom = self.calc_helper(self.helper_top_row + 1);
    }

    fn seek_helper(&mut self, matrix_row: usize) {
        if matrix_row == self.helper_top_row + 1 {
            self.next_helper();
        } else if matrix_row != self.helper_top_row {
            trace!(
                "helper rows rebuilt: matrix row {} after {}",
                matrix_row,
                self.helper_top_row
            );
            self.helper_top = self.calc_helper(matrix_row);
            self.helper_bottom = self.calc_helper(matrix_row + 1);
            self.helper_top_row = matrix_row;
        }
    }

    fn matrix_row(&self, dest_row: usize) -> usize {
        let r = ((dest_row as f64 + 0.5) / self.dest_rows_per_matrix_row).floor() as usize;
        r.min(self.matrix.rows() - 2)
    }

    fn matrix_col(&self, dest_col: usize) -> usize {
        let c = ((dest_col as f64 + 0.5) / self.dest_cols_per_matrix_col).floor() as usize;
        c.min(self.matrix.cols() - 2)
    }

    /// Source CRS position of the center of destination pixel (row, col).
    ///
    /// `None` if the point cannot be transformed or falls outside the source.
    /// An interpolated point that leaves the source is transformed exactly
    /// when its matrix cell has a corner inside the source, so pixels along
    /// the source border are not lost to interpolation error.
    pub fn src_point(&mut self, dest_row: usize, dest_col: usize) -> Option<(f64, f64)> {
        if dest_row >= self.dest.height || dest_col >= self.dest.width {
            return None;
        }
        if !self.approximate {
            return self.exact_src_point(dest_row, dest_col);
        }

        let m_row = self.matrix_row(dest_row);
        let m_col = self.matrix_col(dest_col);
        let (x, y) = self.approximate_src_point(dest_row, dest_col, m_row, m_col);
        if self.provider_extent.contains(x, y) {
            Some((x, y))
        } else if self.cell_touches_source(m_row, m_col) {
            self.exact_src_point(dest_row, dest_col)
        } else {
            None
        }
    }

    fn approximate_src_point(
        &mut self,
        dest_row: usize,
        dest_col: usize,
        m_row: usize,
        m_col: usize,
    ) -> (f64, f64) {
        self.seek_helper(m_row);

        let dest_y = self.dest.extent.ymax - (dest_row as f64 + 0.5) * self.dest_y_res;
        let (_, y_min) = self.dest_point_on_matrix(m_row + 1, m_col);
        let (_, y_max) = self.dest_point_on_matrix(m_row, m_col + 1);
        let yfrac = (dest_y - y_min) / (y_max - y_min);

        let (tx, ty) = self.helper_top[dest_col];
        let (bx, by) = self.helper_bottom[dest_col];
        (bx + (tx - bx) * yfrac, by + (ty - by) * yfrac)
    }

    /// Source pixel (row, col) within [`Self::src_extent`] for a destination pixel.
    ///
    /// In approximate mode calls should come in non-decreasing `dest_row` order.
    pub fn src_row_col(&mut self, dest_row: usize, dest_col: usize) -> Option<(usize, usize)> {
        if self.src_rows == 0 || self.src_cols == 0 {
            return None;
        }
        let (x, y) = self.src_point(dest_row, dest_col)?;
        if !self.src_extent.contains(x, y) {
            return None;
        }
        // points on the far edge belong to the last row/column
        let row = ((self.src_extent.ymax - y) / self.src_y_res).floor().max(0.0) as usize;
        let col = ((x - self.src_extent.xmin) / self.src_x_res).floor().max(0.0) as usize;
        Some((row.min(self.src_rows - 1), col.min(self.src_cols - 1)))
    }

    /// Whether lookups interpolate from the matrix (false: exact per pixel).
    pub fn is_approximate(&self) -> bool {
        self.approximate
    }

    /// Smallest source window covering the destination.
    pub fn src_extent(&self) -> Extent {
        self.src_extent
    }

    pub fn src_rows(&self) -> usize {
        self.src_rows
    }

    pub fn src_cols(&self) -> usize {
        self.src_cols
    }

    pub fn matrix(&self) -> &ControlPointMatrix {
        &self.matrix
    }

    /// (rows, cols) of the control point matrix.
    pub fn matrix_size(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }

    pub fn refinements(&self) -> usize {
        self.refinements
    }

    /// Matrix dump for debugging.
    pub fn cp_to_string(&self) -> String {
        let mut out = String::new();
        for i in 0..self.matrix.rows() {
            if i > 0 {
                out.push('\n');
            }
            for j in 0..self.matrix.cols() {
                if j > 0 {
                    out.push_str("  ");
                }
                let cp = self.matrix.get(i, j);
                if cp.valid {
                    let _ = write!(out, "{:.6}, {:.6}", cp.x, cp.y);
                } else {
                    out.push_str("invalid");
                }
            }
        }
        out
    }
}

/// Pixels needed to cover `length` at `size`, rounded to keep grid alignment.
fn pixel_count(length: f64, size: f64) -> usize {
    if !(length > 0.0) || !(size > 0.0) || !size.is_finite() {
        return 0;
    }
    let n = (length / size).round();
    if n.is_finite() {
        (n as usize).max(1)
    } else {
        0
    }
}
