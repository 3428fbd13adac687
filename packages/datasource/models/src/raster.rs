//! In-memory single-band raster grid.
//!
//! Rasters are read either from a windowed fetch of a published raster or
//! from the local grid produced at import time. Cells are stored row-major
//! starting at the top-left corner.

use thiserror::Error;

/// Errors constructing a [`Raster`].
#[derive(Debug, Error)]
pub enum RasterError {
    /// The value buffer does not match the grid dimensions.
    #[error("Raster expected {expected} cells ({width}x{height}), got {actual}")]
    Shape {
        /// Grid width in cells.
        width: usize,
        /// Grid height in cells.
        height: usize,
        /// Expected number of cells.
        expected: usize,
        /// Number of cells supplied.
        actual: usize,
    },
    /// The grid dimensions do not fit in memory.
    #[error("Raster dimensions {width}x{height} overflow")]
    Overflow {
        /// Grid width in cells.
        width: usize,
        /// Grid height in cells.
        height: usize,
    },
}

/// Affine placement of a north-up grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Cell width in CRS units.
    pub cell_width: f64,
    /// Cell height in CRS units (positive, rows go south).
    pub cell_height: f64,
}

impl GeoTransform {
    /// Returns the center coordinate of the cell at `col`, `row`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            (col as f64 + 0.5).mul_add(self.cell_width, self.origin_x),
            (row as f64 + 0.5).mul_add(-self.cell_height, self.origin_y),
        )
    }
}

/// A single-band raster.
///
/// Cells are ignored when NaN, equal to the grid's own nodata marker, or
/// equal to the datasource's configured nodata value. The two markers are
/// independent since the configured value does not rewrite the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    transform: GeoTransform,
    no_data: Option<f64>,
    configured_no_data: Option<f64>,
    values: Vec<f64>,
}

impl Raster {
    /// Creates a raster from row-major cell values.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Overflow`] if `width * height` does not fit in
    /// a `usize`, or [`RasterError::Shape`] if `values` does not hold exactly
    /// that many cells.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        no_data: Option<f64>,
        values: Vec<f64>,
    ) -> Result<Self, RasterError> {
        let expected = width
            .checked_mul(height)
            .ok_or(RasterError::Overflow { width, height })?;
        if values.len() != expected {
            return Err(RasterError::Shape {
                width,
                height,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            transform,
            no_data,
            configured_no_data: None,
            values,
        })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Grid placement.
    #[must_use]
    pub const fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// The grid's own nodata marker.
    #[must_use]
    pub const fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    /// The datasource's configured `noDataValue`, if applied.
    #[must_use]
    pub const fn configured_no_data(&self) -> Option<f64> {
        self.configured_no_data
    }

    /// Applies the datasource's configured `noDataValue` on top of the
    /// grid's own marker.
    #[must_use]
    pub const fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        self.configured_no_data = no_data;
        self
    }

    /// Whether `value` should be ignored.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_no_data(&self, value: f64) -> bool {
        value.is_nan()
            || self.no_data.is_some_and(|nd| nd == value)
            || self.configured_no_data.is_some_and(|nd| nd == value)
    }

    /// Iterates valid cells as `(center_x, center_y, value)`.
    pub fn valid_cells(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| !self.is_no_data(**v))
            .map(|(idx, v)| {
                let (x, y) = self.transform.cell_center(idx % self.width, idx / self.width);
                (x, y, *v)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_transform() -> GeoTransform {
        GeoTransform {
            origin_x: 0.0,
            origin_y: 2.0,
            cell_width: 1.0,
            cell_height: 1.0,
        }
    }

    #[test]
    fn rejects_wrong_cell_count() {
        let err = Raster::new(2, 2, unit_transform(), None, vec![1.0; 3]).unwrap_err();
        assert!(err.to_string().contains("expected 4 cells"));
    }

    #[test]
    fn skips_no_data_and_nan() {
        let raster = Raster::new(
            2,
            2,
            unit_transform(),
            Some(-9999.0),
            vec![1.0, -9999.0, f64::NAN, 4.0],
        )
        .unwrap();
        let cells: Vec<_> = raster.valid_cells().collect();
        assert_eq!(cells, vec![(0.5, 1.5, 1.0), (1.5, 0.5, 4.0)]);
    }

    #[test]
    fn configured_no_data_adds_to_grid_marker() {
        let raster = Raster::new(3, 1, unit_transform(), Some(-9999.0), vec![0.0, -9999.0, 5.0])
            .unwrap()
            .with_no_data(Some(0.0));
        assert_eq!(raster.no_data(), Some(-9999.0));
        assert_eq!(raster.configured_no_data(), Some(0.0));

        let sum: f64 = raster.valid_cells().map(|(_, _, v)| v).sum();
        assert_eq!(sum, 5.0);
    }

    #[test]
    fn without_configured_value_grid_marker_still_applies() {
        let raster = Raster::new(2, 1, unit_transform(), Some(-1.0), vec![-1.0, 2.0])
            .unwrap()
            .with_no_data(None);
        assert_eq!(raster.valid_cells().count(), 1);
    }

    #[test]
    fn rejects_overflowing_dimensions() {
        let err = Raster::new(usize::MAX, 2, unit_transform(), None, Vec::new()).unwrap_err();
        assert!(matches!(err, RasterError::Overflow { height: 2, .. }));
    }
}
