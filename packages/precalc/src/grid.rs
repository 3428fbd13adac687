//! ESRI ASCII grid reader.
//!
//! The raster import writes one band of the reprojected raster as an
//! `AAIGrid` file next to the COG so cell values can be read without a GDAL
//! binding.

use std::path::Path;

use mpa_datasource_models::raster::{GeoTransform, Raster};

use crate::PrecalcError;

/// Reads an ESRI ASCII grid file.
///
/// # Errors
///
/// Returns [`PrecalcError::Io`] if the file cannot be read or
/// [`PrecalcError::Grid`] if it is malformed.
pub fn read_ascii_grid(path: &Path) -> Result<Raster, PrecalcError> {
    let contents = std::fs::read_to_string(path)?;
    parse_ascii_grid(&contents).map_err(|message| PrecalcError::Grid {
        path: path.display().to_string(),
        message,
    })
}

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

/// Parses ESRI ASCII grid text.
///
/// Accepts `xllcorner`/`xllcenter`, `cellsize` or `dx`/`dy`, and an
/// optional `NODATA_value`. Header keys are case-insensitive.
///
/// # Errors
///
/// Returns a message describing the first malformed header line, missing
/// header key, unparseable value, or cell count mismatch.
pub fn parse_ascii_grid(contents: &str) -> Result<Raster, String> {
    let mut header = Header::default();
    let mut tokens = contents.split_whitespace().peekable();

    while let Some(key) = tokens.peek().copied() {
        if key.parse::<f64>().is_ok() {
            break;
        }
        tokens.next();
        let raw = tokens
            .next()
            .ok_or_else(|| format!("header key {key} has no value"))?;
        let value: f64 = raw
            .parse()
            .map_err(|_| format!("header {key} has non-numeric value {raw}"))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(as_count(key, value)?),
            "nrows" => header.nrows = Some(as_count(key, value)?),
            "xllcorner" => header.xll = Some((value, false)),
            "xllcenter" => header.xll = Some((value, true)),
            "yllcorner" => header.yll = Some((value, false)),
            "yllcenter" => header.yll = Some((value, true)),
            "cellsize" => header.cellsize = Some(value),
            "dx" => header.dx = Some(value),
            "dy" => header.dy = Some(value),
            "nodata_value" => header.nodata = Some(value),
            _ => return Err(format!("unknown header key {key}")),
        }
    }

    let width = header.ncols.ok_or("missing ncols")?;
    let height = header.nrows.ok_or("missing nrows")?;
    let (xll, x_center) = header.xll.ok_or("missing xllcorner")?;
    let (yll, y_center) = header.yll.ok_or("missing yllcorner")?;
    let cell_width = header.dx.or(header.cellsize).ok_or("missing cellsize")?;
    let cell_height = header.dy.or(header.cellsize).ok_or("missing cellsize")?;

    let min_x = if x_center { xll - cell_width / 2.0 } else { xll };
    let min_y = if y_center { yll - cell_height / 2.0 } else { yll };
    #[allow(clippy::cast_precision_loss)]
    let transform = GeoTransform {
        origin_x: min_x,
        origin_y: (height as f64).mul_add(cell_height, min_y),
        cell_width,
        cell_height,
    };

    let values = tokens
        .map(|t| t.parse::<f64>().map_err(|_| format!("cell value {t} is not a number")))
        .collect::<Result<Vec<_>, _>>()?;

    Raster::new(width, height, transform, header.nodata, values).map_err(|e| e.to_string())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn as_count(key: &str, value: f64) -> Result<usize, String> {
    if value.fract() != 0.0 || value < 0.0 {
        return Err(format!("header {key} must be a non-negative integer"));
    }
    // `usize::MAX as f64` rounds up, so equality is already out of range.
    if value >= usize::MAX as f64 {
        return Err(format!("header {key} value {value} is too large"));
    }
    Ok(value as usize)
}
