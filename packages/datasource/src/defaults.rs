//! Bootstrap registry contents used before any datasource has been imported.

use mpa_datasource_models::{Datasource, ExternalDatasource, GeoType, SupportedFormat};

/// Id of the global OSM land polygon layer.
pub const GLOBAL_LAND_ID: &str = "global-clipping-osm-land";

/// Id of the global EEZ and land union layer.
pub const GLOBAL_EEZ_LAND_UNION_ID: &str = "global-clipping-eez-land-union";

const GLOBAL_LAND_URL: &str = "https://d3p1dsef9f0gjr.cloudfront.net/";
const GLOBAL_EEZ_LAND_UNION_URL: &str = "https://d3muy0hbwp5qkl.cloudfront.net";

/// The two well-known external global layers.
#[must_use]
pub fn default_datasources() -> Vec<Datasource> {
    [
        (GLOBAL_LAND_ID, GLOBAL_LAND_URL),
        (GLOBAL_EEZ_LAND_UNION_ID, GLOBAL_EEZ_LAND_UNION_URL),
    ]
    .into_iter()
    .map(|(id, url)| {
        Datasource::External(ExternalDatasource {
            datasource_id: id.to_string(),
            geo_type: GeoType::Vector,
            class_keys: Vec::new(),
            formats: vec![SupportedFormat::Subdivided],
            key_stats: None,
            no_data_value: None,
            layer_name: None,
            url: url.to_string(),
        })
    })
    .collect()
}
