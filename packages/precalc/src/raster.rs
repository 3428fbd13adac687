//! Raster key stats.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Contains, MultiPolygon, Point};
use mpa_datasource_models::raster::Raster;
use mpa_datasource_models::{ClassStats, KeyStats, MeasurementType, Stats};

use crate::PrecalcError;
use crate::vector::read_feature_collection;

/// Class key used for categorical histograms when none is declared.
pub const DEFAULT_RASTER_CLASS_KEY: &str = "value";

/// Collects every polygon of a `GeoJSON` feature collection into one
/// multipolygon mask.
///
/// # Errors
///
/// Returns any error from reading or converting the collection.
pub fn read_filter_mask(path: &Path) -> Result<MultiPolygon<f64>, PrecalcError> {
    let collection = read_feature_collection(path)?;
    let mut polygons = Vec::new();
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        match geo::Geometry::<f64>::try_from(geometry)? {
            geo::Geometry::Polygon(p) => polygons.push(p),
            geo::Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
            other => log::warn!("Ignoring non-polygon filter geometry {other:?}"),
        }
    }
    Ok(MultiPolygon(polygons))
}

/// Renders a categorical cell value, as an integer when integral.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn raster_class_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Computes key stats for a single-band raster.
///
/// Quantitative rasters produce `total.total = {sum}`, summing only cells
/// whose centre lies inside `filter` when one is given. Categorical rasters
/// produce a histogram of cell values under the first class key (or
/// [`DEFAULT_RASTER_CLASS_KEY`]) and a `total.total` bucket of nulls.
/// Nodata and NaN cells are ignored.
#[must_use]
pub fn gen_raster_key_stats(
    raster: &Raster,
    measurement_type: MeasurementType,
    class_keys: &[String],
    filter: Option<&MultiPolygon<f64>>,
) -> KeyStats {
    match measurement_type {
        MeasurementType::Quantitative => {
            let sum: f64 = raster
                .valid_cells()
                .filter(|(x, y, _)| filter.is_none_or(|mask| mask.contains(&Point::new(*x, *y))))
                .map(|(_, _, value)| value)
                .sum();
            KeyStats::with_total(Stats {
                count: None,
                area: None,
                sum: Some(sum),
            })
        }
        MeasurementType::Categorical => {
            let mut histogram: BTreeMap<String, u64> = BTreeMap::new();
            for (_, _, value) in raster.valid_cells() {
                *histogram.entry(raster_class_value(value)).or_insert(0) += 1;
            }
            let classes: ClassStats = histogram
                .into_iter()
                .map(|(value, count)| {
                    (
                        value,
                        Stats {
                            count: Some(count),
                            area: None,
                            sum: None,
                        },
                    )
                })
                .collect();
            let key = class_keys
                .first()
                .map_or(DEFAULT_RASTER_CLASS_KEY, String::as_str);

            let mut stats = KeyStats::new();
            stats.insert(key, classes);
            stats.set_total(Stats::default());
            stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use mpa_datasource_models::raster::GeoTransform;

    fn raster(values: Vec<f64>) -> Raster {
        Raster::new(
            2,
            2,
            GeoTransform {
                origin_x: 0.0,
                origin_y: 2.0,
                cell_width: 1.0,
                cell_height: 1.0,
            },
            Some(-1.0),
            values,
        )
        .unwrap()
    }

    #[test]
    fn quantitative_sum_skips_no_data() {
        let stats = gen_raster_key_stats(
            &raster(vec![1.5, -1.0, f64::NAN, 4.0]),
            MeasurementType::Quantitative,
            &[],
            None,
        );
        let total = stats.total().unwrap();
        assert_eq!(total.sum, Some(5.5));
        assert_eq!(total.count, None);
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn quantitative_sum_skips_grid_and_configured_no_data() {
        let stats = gen_raster_key_stats(
            &raster(vec![0.0, -1.0, 2.0, 3.0]).with_no_data(Some(0.0)),
            MeasurementType::Quantitative,
            &[],
            None,
        );
        assert_eq!(stats.total().unwrap().sum, Some(5.0));
    }

    #[test]
    fn quantitative_sum_respects_filter_mask() {
        // Left column only: cell centres at x = 0.5.
        let mask = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 2.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]]);
        let stats = gen_raster_key_stats(
            &raster(vec![1.0, 2.0, 3.0, 4.0]),
            MeasurementType::Quantitative,
            &[],
            Some(&mask),
        );
        assert_eq!(stats.total().unwrap().sum, Some(4.0));
    }

    #[test]
    fn categorical_histogram() {
        let stats = gen_raster_key_stats(
            &raster(vec![1.0, 2.0, 1.0, -1.0]),
            MeasurementType::Categorical,
            &[],
            None,
        );
        let ones = stats.get(DEFAULT_RASTER_CLASS_KEY, "1").unwrap();
        assert_eq!(ones.count, Some(2));
        assert_eq!(ones.area, None);
        assert_eq!(stats.get(DEFAULT_RASTER_CLASS_KEY, "2").unwrap().count, Some(1));
        assert_eq!(stats.total(), Some(&Stats::default()));

        let keyed = gen_raster_key_stats(
            &raster(vec![1.0, 2.0, 1.0, 3.0]),
            MeasurementType::Categorical,
            &["habitat".to_string()],
            None,
        );
        assert_eq!(keyed.classes("habitat").unwrap().len(), 3);
    }

    #[test]
    fn class_values() {
        assert_eq!(raster_class_value(3.0), "3");
        assert_eq!(raster_class_value(-2.0), "-2");
        assert_eq!(raster_class_value(2.5), "2.5");
    }
}
