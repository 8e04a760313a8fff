//! Dense single-band raster blocks.

use ndarray::{Array2, ArrayView2};
use num_traits::NumCast;

/// A row-major block of samples for one band.
///
/// Missing samples hold the block's no-data value, or NaN when the block has
/// none. Both are reported by [`RasterBlock::is_no_data`].
#[derive(Clone, Debug, PartialEq)]
pub struct RasterBlock {
    data: Array2<f64>,
    nodata: Option<f64>,
}

impl RasterBlock {
    /// A 0x0 block, returned when nothing could be produced.
    pub fn empty() -> Self {
        Self {
            data: Array2::zeros((0, 0)),
            nodata: None,
        }
    }

    /// A `width` x `height` block with every sample set to no-data.
    pub fn filled_no_data(width: usize, height: usize, nodata: Option<f64>) -> Self {
        let fill = nodata.unwrap_or(f64::NAN);
        Self {
            data: Array2::from_elem((height, width), fill),
            nodata,
        }
    }

    pub fn from_array(data: Array2<f64>, nodata: Option<f64>) -> Self {
        Self { data, nodata }
    }

    /// Convert a typed array (integer or float) into a block.
    ///
    /// Values that cannot be represented as f64 become no-data.
    pub fn from_view<T>(view: &ArrayView2<'_, T>, nodata: Option<T>) -> Self
    where
        T: Copy + NumCast,
    {
        let nodata: Option<f64> = nodata.and_then(|v| <f64 as NumCast>::from(v));
        let fill = nodata.unwrap_or(f64::NAN);
        let data = view.mapv(|v| <f64 as NumCast>::from(v).unwrap_or(fill));
        Self { data, nodata }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn nodata_value(&self) -> Option<f64> {
        self.nodata
    }

    /// Sample at (row, col), `None` outside the block.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied()
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: f64) {
        self.data[(row, col)] = value;
    }

    pub fn is_no_data_value(&self, value: f64) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    pub fn is_no_data(&self, row: usize, col: usize) -> bool {
        self.is_no_data_value(self.value(row, col))
    }

    pub fn set_no_data(&mut self, row: usize, col: usize) {
        self.data[(row, col)] = self.nodata.unwrap_or(f64::NAN);
    }

    /// Number of no-data samples.
    pub fn no_data_count(&self) -> usize {
        self.data
            .iter()
            .filter(|v| self.is_no_data_value(**v))
            .count()
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }
}
