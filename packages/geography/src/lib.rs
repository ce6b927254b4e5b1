#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary and point-table loading with CRS reconciliation.
//!
//! Adapts the upstream file artifacts into the in-memory geography model:
//! `GeoJSON` feature collections become [`RegionSet`]s and grid-cell
//! lists, the DENUE job estimates CSV becomes a projected [`PointSet`].
//! Raw job coordinates arrive as WGS84 longitude/latitude and are
//! reprojected here, before any spatial predicate sees them.

pub mod project;

use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;
use metro_atlas_geography_models::{
    Epsg, GridCell, ModelError, PointFeature, PointSet, Region, RegionSet,
};
use serde::Deserialize;

use crate::project::wgs84_to_mexico_lcc;

/// Errors that can occur while loading geography inputs.
#[derive(Debug, thiserror::Error)]
pub enum GeographyError {
    /// Filesystem read failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Model invariant violation (duplicate ids, negative weights, ...).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Feature content that could not be converted.
    #[error("Conversion error in '{dataset}': {message}")]
    Conversion {
        /// Name of the offending dataset.
        dataset: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// Property names used to read a region feature collection.
#[derive(Debug, Clone, Copy)]
pub struct RegionSchema {
    /// Property holding the stable identifier.
    pub id_property: &'static str,
    /// Property holding the total population, if the layer carries one.
    pub population_property: Option<&'static str>,
}

/// Zone and municipality layers key regions by `codigo`.
pub const CODIGO_SCHEMA: RegionSchema = RegionSchema {
    id_property: "codigo",
    population_property: None,
};

/// AGEB layers key regions by `CVEGEO` and carry `POBTOT`.
pub const AGEB_SCHEMA: RegionSchema = RegionSchema {
    id_property: "CVEGEO",
    population_property: Some("POBTOT"),
};

/// Loads a region feature collection from a `GeoJSON` file.
///
/// `crs` is the CRS the file's coordinates are known to be expressed
/// in; upstream boundary artifacts are already projected to
/// [`Epsg::MEXICO_LCC`].
///
/// # Errors
///
/// Returns [`GeographyError`] if the file cannot be read or parsed, a
/// feature is missing its identifier, or the set violates the
/// unique-identifier invariant.
pub fn load_regions(
    path: &Path,
    crs: Epsg,
    schema: RegionSchema,
) -> Result<RegionSet, GeographyError> {
    let dataset = dataset_name(path);
    let features = read_feature_collection(path, &dataset)?;

    let mut regions = Vec::with_capacity(features.len());
    for feature in features {
        let id = property_string(&feature, schema.id_property).ok_or_else(|| {
            GeographyError::Conversion {
                dataset: dataset.clone(),
                message: format!("feature is missing '{}' property", schema.id_property),
            }
        })?;

        let geometry =
            feature_multipolygon(&feature).ok_or_else(|| GeographyError::Conversion {
                dataset: dataset.clone(),
                message: format!("feature '{id}' has no polygonal geometry"),
            })?;

        let population = schema
            .population_property
            .and_then(|name| property_f64(&feature, name));

        regions.push(Region {
            id,
            geometry,
            population,
        });
    }

    let set = RegionSet::new(&dataset, crs, regions)?;
    log::info!("Loaded {} regions from {}", set.len(), path.display());
    Ok(set)
}

/// Loads population-grid difference cells from a `GeoJSON` file.
///
/// Each cell carries the zone `codigo` it belongs to and the 2000 to
/// 2020 population `difference`.
///
/// # Errors
///
/// Returns [`GeographyError`] if the file cannot be read or a cell is
/// missing its `codigo` or `difference` property.
pub fn load_grid_cells(path: &Path) -> Result<Vec<GridCell>, GeographyError> {
    let dataset = dataset_name(path);
    let features = read_feature_collection(path, &dataset)?;

    let mut cells = Vec::with_capacity(features.len());
    for feature in features {
        let codigo =
            property_string(&feature, "codigo").ok_or_else(|| GeographyError::Conversion {
                dataset: dataset.clone(),
                message: "cell is missing 'codigo' property".to_string(),
            })?;
        let pop_difference =
            property_f64(&feature, "difference").ok_or_else(|| GeographyError::Conversion {
                dataset: dataset.clone(),
                message: format!("cell '{codigo}' is missing 'difference' property"),
            })?;
        let geometry =
            feature_multipolygon(&feature).ok_or_else(|| GeographyError::Conversion {
                dataset: dataset.clone(),
                message: format!("cell '{codigo}' has no polygonal geometry"),
            })?;

        cells.push(GridCell {
            codigo,
            geometry,
            pop_difference,
        });
    }

    log::info!("Loaded {} grid cells from {}", cells.len(), path.display());
    Ok(cells)
}

/// One row of the DENUE job estimates CSV.
#[derive(Debug, Deserialize)]
struct JobRecord {
    /// Expected job count at the establishment.
    num_empleos_esperados: f64,
    /// WGS84 longitude.
    longitud: f64,
    /// WGS84 latitude.
    latitud: f64,
}

/// Loads the job estimates point table and projects it to the planar
/// CRS.
///
/// The source CSV is the upstream DENUE estimation table with
/// `num_empleos_esperados`, `longitud`, and `latitud` columns in WGS84.
/// Every point in the returned set is in [`Epsg::MEXICO_LCC`].
///
/// # Errors
///
/// Returns [`GeographyError`] if the file cannot be read, a row fails
/// to parse, or a weight is negative.
pub fn load_job_points(path: &Path) -> Result<PointSet, GeographyError> {
    let dataset = dataset_name(path);
    let mut reader = csv::Reader::from_path(path)?;

    let mut points = Vec::new();
    for record in reader.deserialize() {
        let row: JobRecord = record?;
        let (x, y) = wgs84_to_mexico_lcc(row.longitud, row.latitud);
        points.push(PointFeature {
            x,
            y,
            weight: row.num_empleos_esperados,
        });
    }

    let set = PointSet::new(&dataset, Epsg::MEXICO_LCC, points)?;
    log::info!("Loaded {} job points from {}", set.len(), path.display());
    Ok(set)
}

/// Reads a `GeoJSON` file and returns its features.
fn read_feature_collection(
    path: &Path,
    dataset: &str,
) -> Result<Vec<geojson::Feature>, GeographyError> {
    let raw = std::fs::read_to_string(path)?;
    let geojson: GeoJson = raw.parse()?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        _ => Err(GeographyError::Conversion {
            dataset: dataset.to_string(),
            message: "expected a FeatureCollection".to_string(),
        }),
    }
}

/// Converts a feature's geometry into a [`MultiPolygon`]. Handles both
/// `Polygon` and `MultiPolygon` geometry types.
fn feature_multipolygon(feature: &geojson::Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Reads a property as a string, accepting string or numeric JSON
/// values (`codigo` columns are numeric in some vintages).
fn property_string(feature: &geojson::Feature, name: &str) -> Option<String> {
    match feature.properties.as_ref()?.get(name)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a property as an f64.
fn property_f64(feature: &geojson::Feature, name: &str) -> Option<f64> {
    feature.properties.as_ref()?.get(name)?.as_f64()
}

/// Human-readable dataset name for error messages (file stem).
fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into())
}
