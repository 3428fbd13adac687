//! Strict parsing of the datasources registry file.
//!
//! Records written before the `kind` discriminant existed are classified
//! once here: a record carrying `url` is external, one carrying `src` is
//! internal. Everything after this point matches on [`Datasource`].

use mpa_datasource_models::validation::{
    ConfigurationError, ValidationIssue, check_unique_ids, parse_array, record_location,
};
use mpa_datasource_models::{Datasource, DatasourceKind, GeoType};
use serde_json::Value;

/// Parses and validates the full contents of a datasources file.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] listing every malformed record, every
/// record that cannot be classified, every raster-only field set on a vector
/// record, and every duplicate or empty `datasourceId`.
pub fn parse_datasources(origin: &str, contents: &str) -> Result<Vec<Datasource>, ConfigurationError> {
    let mut issues = Vec::new();
    let items = parse_array(origin, contents, &mut issues);

    let mut records = Vec::with_capacity(items.len());
    for (idx, mut item) in items.into_iter().enumerate() {
        let location = record_location(origin, idx);
        if let Err(message) = classify(&mut item) {
            issues.push(ValidationIssue::new(location, message));
            continue;
        }
        match serde_json::from_value::<Datasource>(item) {
            Ok(ds) => {
                check_fields(&ds, &location, &mut issues);
                records.push((idx, ds));
            }
            Err(e) => issues.push(ValidationIssue::new(location, e.to_string())),
        }
    }

    check_unique_ids(
        origin,
        "datasourceId",
        records.iter().map(|(idx, ds)| (*idx, ds.datasource_id())),
        &mut issues,
    );

    ConfigurationError::check(origin, issues)?;
    Ok(records.into_iter().map(|(_, ds)| ds).collect())
}

/// Inserts the `kind` discriminant into a legacy record.
fn classify(item: &mut Value) -> Result<(), String> {
    let Value::Object(map) = item else {
        return Err("expected a datasource object".to_string());
    };
    if map.contains_key("kind") {
        return Ok(());
    }
    let kind = match (map.contains_key("url"), map.contains_key("src")) {
        (true, false) => DatasourceKind::External,
        (false, true) => DatasourceKind::Internal,
        (true, true) => {
            return Err("datasource has both 'url' and 'src'; cannot be internal and external".to_string());
        }
        (false, false) => {
            return Err("datasource has neither 'url' nor 'src'".to_string());
        }
    };
    map.insert("kind".to_string(), Value::String(kind.to_string()));
    Ok(())
}

fn check_fields(ds: &Datasource, location: &str, issues: &mut Vec<ValidationIssue>) {
    let Datasource::Internal(internal) = ds else {
        return;
    };
    if internal.geo_type != GeoType::Vector {
        return;
    }
    let raster_only = [
        ("band", internal.band.is_some()),
        ("measurementType", internal.measurement_type.is_some()),
        ("filterDatasource", internal.filter_datasource.is_some()),
    ];
    for (field, present) in raster_only {
        if present {
            issues.push(ValidationIssue::new(
                location,
                format!("'{field}' is only valid on raster datasources"),
            ));
        }
    }
}
