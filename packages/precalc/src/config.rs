//! Import options and the fully resolved import configuration.

use std::path::{Path, PathBuf};

use mpa_datasource_models::{
    GeoType, InternalDatasource, MeasurementType, SupportedFormat, ascii_grid_filename,
    cog_filename, flatgeobuf_filename, geojson_filename,
};

use crate::PrecalcError;

/// What the user asked to import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Id of the new datasource.
    pub datasource_id: String,
    /// Vector or raster.
    pub geo_type: GeoType,
    /// Path to the source file.
    pub src: PathBuf,
    /// Properties (vector) or class encodings (raster) to generate classes for.
    pub class_keys: Vec<String>,
    /// Vector properties to keep.
    pub properties_to_keep: Vec<String>,
    /// Formats to publish; defaults per geo type when `None`.
    pub formats: Option<Vec<SupportedFormat>>,
    /// Layer within the source file; defaults to the file stem.
    pub layer_name: Option<String>,
    /// Whether to explode multi-geometries; defaults to `true`.
    pub explode_multi: Option<bool>,
    /// Raster band; defaults to 1.
    pub band: Option<u32>,
    /// Raster nodata value.
    pub no_data_value: Option<f64>,
    /// Raster measurement type; defaults to quantitative.
    pub measurement_type: Option<MeasurementType>,
    /// Internal vector datasource masking a quantitative raster sum.
    pub filter_datasource: Option<String>,
}

impl ImportOptions {
    /// Options for a vector import with defaults for everything optional.
    #[must_use]
    pub fn vector(datasource_id: impl Into<String>, src: impl Into<PathBuf>) -> Self {
        Self::new(datasource_id, GeoType::Vector, src)
    }

    /// Options for a raster import with defaults for everything optional.
    #[must_use]
    pub fn raster(datasource_id: impl Into<String>, src: impl Into<PathBuf>) -> Self {
        Self::new(datasource_id, GeoType::Raster, src)
    }

    fn new(datasource_id: impl Into<String>, geo_type: GeoType, src: impl Into<PathBuf>) -> Self {
        Self {
            datasource_id: datasource_id.into(),
            geo_type,
            src: src.into(),
            class_keys: Vec::new(),
            properties_to_keep: Vec::new(),
            formats: None,
            layer_name: None,
            explode_multi: None,
            band: None,
            no_data_value: None,
            measurement_type: None,
            filter_datasource: None,
        }
    }
}

impl From<&InternalDatasource> for ImportOptions {
    fn from(ds: &InternalDatasource) -> Self {
        Self {
            datasource_id: ds.datasource_id.clone(),
            geo_type: ds.geo_type,
            src: PathBuf::from(&ds.src),
            class_keys: ds.class_keys.clone(),
            properties_to_keep: ds.properties_to_keep.clone(),
            formats: Some(ds.formats.clone()),
            layer_name: ds.layer_name.clone(),
            explode_multi: ds.explode_multi,
            band: ds.band,
            no_data_value: ds.no_data_value,
            measurement_type: ds.measurement_type,
            filter_datasource: ds.filter_datasource.clone(),
        }
    }
}

/// Import options with every default applied and the output directory set.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// The options as given.
    pub options: ImportOptions,
    /// Directory receiving transformed artifacts.
    pub dst_path: PathBuf,
    /// Resolved source layer name (vector only).
    pub layer_name: Option<String>,
    /// Properties kept, always including the class keys (vector only).
    pub properties_to_keep: Vec<String>,
    /// Formats to publish.
    pub formats: Vec<SupportedFormat>,
    /// Whether multi-geometries are exploded (vector only).
    pub explode_multi: bool,
    /// Band to extract (raster only).
    pub band: u32,
    /// Measurement type (raster only).
    pub measurement_type: MeasurementType,
}

impl ImportConfig {
    /// The datasource id.
    #[must_use]
    pub fn datasource_id(&self) -> &str {
        &self.options.datasource_id
    }

    /// Local `GeoJSON` artifact path.
    #[must_use]
    pub fn geojson_path(&self) -> PathBuf {
        self.dst_path.join(geojson_filename(self.datasource_id()))
    }

    /// Local `FlatGeobuf` artifact path.
    #[must_use]
    pub fn flatgeobuf_path(&self) -> PathBuf {
        self.dst_path.join(flatgeobuf_filename(self.datasource_id()))
    }

    /// Local COG artifact path.
    #[must_use]
    pub fn cog_path(&self) -> PathBuf {
        self.dst_path.join(cog_filename(self.datasource_id()))
    }

    /// Temporary reprojected raster path.
    #[must_use]
    pub fn warp_path(&self) -> PathBuf {
        self.dst_path
            .join(format!("{}_4326.tif", self.datasource_id()))
    }

    /// Local ESRI ASCII grid path used to read raster cells.
    #[must_use]
    pub fn ascii_grid_path(&self) -> PathBuf {
        self.dst_path.join(ascii_grid_filename(self.datasource_id()))
    }
}

/// Applies defaults and validates `options`.
///
/// Vector imports default to publishing `fgb` and keep at least the class
/// keys. Raster imports default to band 1, `cog`, and quantitative values.
///
/// # Errors
///
/// Returns [`PrecalcError::InvalidOptions`] if the id is empty, a format
/// cannot be produced for the geo type, or a raster-only option is set on a
/// vector import.
pub fn gen_config(options: ImportOptions, dst_path: &Path) -> Result<ImportConfig, PrecalcError> {
    if options.datasource_id.trim().is_empty() {
        return Err(invalid("datasource id must not be empty"));
    }
    match options.geo_type {
        GeoType::Vector => gen_vector_config(options, dst_path),
        GeoType::Raster => gen_raster_config(options, dst_path),
    }
}

fn gen_vector_config(options: ImportOptions, dst_path: &Path) -> Result<ImportConfig, PrecalcError> {
    if options.band.is_some() || options.measurement_type.is_some() || options.filter_datasource.is_some() {
        return Err(invalid("band, measurement type and filter datasource only apply to rasters"));
    }
    let formats = options
        .formats
        .clone()
        .unwrap_or_else(|| SupportedFormat::DEFAULT_VECTOR.to_vec());
    if let Some(bad) = formats
        .iter()
        .find(|f| !SupportedFormat::VECTOR_IMPORT.contains(*f))
    {
        return Err(invalid(&format!("format {bad} is not supported for vector import")));
    }

    let layer_name = options.layer_name.clone().or_else(|| {
        options
            .src
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });

    let mut properties_to_keep = options.properties_to_keep.clone();
    for key in &options.class_keys {
        if !properties_to_keep.contains(key) {
            properties_to_keep.push(key.clone());
        }
    }

    Ok(ImportConfig {
        dst_path: dst_path.to_path_buf(),
        layer_name,
        properties_to_keep,
        formats,
        explode_multi: options.explode_multi.unwrap_or(true),
        band: 1,
        measurement_type: MeasurementType::default(),
        options,
    })
}

fn gen_raster_config(options: ImportOptions, dst_path: &Path) -> Result<ImportConfig, PrecalcError> {
    let formats = options
        .formats
        .clone()
        .unwrap_or_else(|| SupportedFormat::DEFAULT_RASTER.to_vec());
    if let Some(bad) = formats
        .iter()
        .find(|f| !SupportedFormat::DEFAULT_RASTER.contains(*f))
    {
        return Err(invalid(&format!("format {bad} is not supported for raster import")));
    }
    if options.band == Some(0) {
        return Err(invalid("raster bands are numbered from 1"));
    }

    Ok(ImportConfig {
        dst_path: dst_path.to_path_buf(),
        layer_name: options.layer_name.clone(),
        properties_to_keep: Vec::new(),
        formats,
        explode_multi: false,
        band: options.band.unwrap_or(1),
        measurement_type: options.measurement_type.unwrap_or_default(),
        options,
    })
}

fn invalid(message: &str) -> PrecalcError {
    PrecalcError::InvalidOptions {
        message: message.to_string(),
    }
}
