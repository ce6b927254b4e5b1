#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation orchestrator.
//!
//! Ties the overlay engine, raster reducer, and classifier to the
//! three geography resolutions (zone, municipality, AGEB) and the
//! census year set. Each statistic is a single generic function
//! parameterized by a [`LevelContext`] rather than per-resolution
//! code; the per-level differences (identifier column, partitioning)
//! are data.

pub mod config;

use std::collections::BTreeMap;

use geo::{Area, MultiPolygon};
use metro_atlas_classify::{Classification, ClassifyError, natural_breaks};
use metro_atlas_geography_models::{CENSUS_YEARS, GeographyLevel, GridCell, PointSet, RegionSet};
use metro_atlas_raster::store::RasterSource;
use metro_atlas_raster::{RasterError, RasterLayer, clip, reduce};
use metro_atlas_spatial::{RegionIndex, SpatialError};
use serde::Serialize;
use thiserror::Error;

/// Bin count of the jobs choropleth legend.
pub const JOBS_BINS: usize = 6;

/// Construction-year cutoff for the recent-built share statistic.
pub const BUILT_CUTOFF_YEAR: u16 = 2000;

/// Errors that can occur while orchestrating statistics.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Filesystem read failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration schema violation.
    #[error("Config error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Overlay engine failure.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Raster load/clip/reduce failure.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Classification failure, including degeneracy; a missing legend
    /// must surface instead of rendering an unlabeled map.
    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),

    /// A year required by a series had no geography loaded.
    #[error("No AGEB geography loaded for year {year}")]
    MissingYear {
        /// The absent census year.
        year: u16,
    },

    /// A region lacked the population attribute a series needs.
    #[error("Region '{id}' in year {year} has no population attribute")]
    MissingPopulation {
        /// The census year of the offending set.
        year: u16,
        /// The offending region.
        id: String,
    },

    /// A cell statistic was asked of an empty cell set.
    #[error("Partition '{partition}' has no population-grid cells")]
    EmptyCells {
        /// The offending partition key.
        partition: String,
    },
}

/// Geography/partition context threaded through each statistic.
#[derive(Debug, Clone, Copy)]
pub struct LevelContext {
    /// Geography resolution.
    pub level: GeographyLevel,
    /// Property the region identifiers come from.
    pub id_property: &'static str,
    /// Census years the level's series cover.
    pub years: &'static [u16],
}

/// Zone-level context (`codigo`-keyed).
pub const ZONE_CONTEXT: LevelContext = LevelContext {
    level: GeographyLevel::Zone,
    id_property: "codigo",
    years: &CENSUS_YEARS,
};

/// Municipality-level context (`codigo`-keyed).
pub const MUN_CONTEXT: LevelContext = LevelContext {
    level: GeographyLevel::Mun,
    id_property: "codigo",
    years: &CENSUS_YEARS,
};

/// AGEB-level context (`CVEGEO`-keyed, zone partitioning).
pub const AGEB_CONTEXT: LevelContext = LevelContext {
    level: GeographyLevel::Ageb,
    id_property: "CVEGEO",
    years: &CENSUS_YEARS,
};

/// One region with an aggregated attribute, geometry attached for the
/// downstream renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionValue {
    /// Region identifier.
    pub id: String,
    /// Aggregated value.
    pub value: f64,
    /// Region polygon.
    pub geometry: MultiPolygon<f64>,
}

/// One point of a longitudinal statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearValue {
    /// Census year.
    pub year: u16,
    /// Statistic value for the year.
    pub value: f64,
}

/// An ordered longitudinal statistic, one entry per requested year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    /// Entries in ascending year order.
    pub points: Vec<YearValue>,
}

impl TimeSeries {
    fn from_pairs(pairs: Vec<(u16, f64)>) -> Self {
        Self {
            points: pairs
                .into_iter()
                .map(|(year, value)| YearValue { year, value })
                .collect(),
        }
    }
}

/// Joins job points onto regions and attaches the summed weights.
///
/// Left-anchored: the region set drives output order, the aggregated
/// value is attached by identifier, and regions with no matched jobs
/// are dropped (never zero-filled) so the renderer cannot shade them.
///
/// # Errors
///
/// Returns [`StatsError`] on CRS mismatches.
pub fn jobs_by_region(
    regions: &RegionSet,
    jobs: &PointSet,
) -> Result<Vec<RegionValue>, StatsError> {
    let index = RegionIndex::build(regions.crs(), regions.regions())?;
    let sums = index.sum_weights(jobs)?;

    let joined: Vec<RegionValue> = regions
        .regions()
        .iter()
        .filter_map(|region| {
            sums.get(&region.id).map(|&value| RegionValue {
                id: region.id.clone(),
                value,
                geometry: region.geometry.clone(),
            })
        })
        .collect();

    log::info!(
        "Jobs join kept {}/{} regions",
        joined.len(),
        regions.len()
    );
    Ok(joined)
}

/// Total expected jobs over a joined region set.
#[must_use]
pub fn total_jobs(joined: &[RegionValue]) -> f64 {
    joined.iter().map(|region| region.value).sum()
}

/// Classifies the joined jobs column into the choropleth legend
/// scheme (k = 6, rounded natural breaks).
///
/// # Errors
///
/// Returns [`StatsError::Classify`] on degenerate columns; the error
/// is surfaced instead of drawing a map without a legend.
pub fn classify_jobs(joined: &[RegionValue]) -> Result<Classification, StatsError> {
    let values: Vec<f64> = joined.iter().map(|region| region.value).collect();
    Ok(natural_breaks(&values, JOBS_BINS)?)
}

/// Sums AGEB population per census year.
///
/// # Errors
///
/// Returns [`StatsError::MissingYear`] if a requested year has no
/// geography, or [`StatsError::MissingPopulation`] if a region lacks
/// the attribute.
pub fn population_series(
    agebs_by_year: &BTreeMap<u16, RegionSet>,
    years: &[u16],
) -> Result<TimeSeries, StatsError> {
    let mut pairs = Vec::with_capacity(years.len());
    for &year in years {
        let set = agebs_by_year
            .get(&year)
            .ok_or(StatsError::MissingYear { year })?;

        let mut total = 0.0;
        for region in set.regions() {
            total += region
                .population
                .ok_or_else(|| StatsError::MissingPopulation {
                    year,
                    id: region.id.clone(),
                })?;
        }
        pairs.push((year, total));
    }
    Ok(TimeSeries::from_pairs(pairs))
}

/// Sums built-up raster area per census year, clipping each year's
/// GHSL layer to that year's AGEB extent.
///
/// # Errors
///
/// Any single-year load or clip failure fails the whole series.
pub fn built_area_series(
    source: &dyn RasterSource,
    agebs_by_year: &BTreeMap<u16, RegionSet>,
    years: &[u16],
) -> Result<TimeSeries, StatsError> {
    let mut masks: BTreeMap<u16, Vec<MultiPolygon<f64>>> = BTreeMap::new();
    for &year in years {
        let set = agebs_by_year
            .get(&year)
            .ok_or(StatsError::MissingYear { year })?;
        masks.insert(
            year,
            set.regions().iter().map(|r| r.geometry.clone()).collect(),
        );
    }

    let pairs = reduce::assemble_series(source, years, &masks)?;
    Ok(TimeSeries::from_pairs(pairs))
}

/// Sums AGEB polygon area per census year (planar CRS required).
///
/// # Errors
///
/// Returns [`StatsError`] if a year is missing or a set arrived in a
/// geographic CRS.
pub fn built_urban_area_series(
    agebs_by_year: &BTreeMap<u16, RegionSet>,
    years: &[u16],
) -> Result<TimeSeries, StatsError> {
    let mut pairs = Vec::with_capacity(years.len());
    for &year in years {
        let set = agebs_by_year
            .get(&year)
            .ok_or(StatsError::MissingYear { year })?;
        if !set.crs().is_projected() {
            return Err(SpatialError::GeographicCrs {
                dataset: format!("agebs_{year}"),
                crs: set.crs(),
            }
            .into());
        }

        let total: f64 = set
            .regions()
            .iter()
            .map(|region| region.geometry.unsigned_area())
            .sum();
        pairs.push((year, total));
    }
    Ok(TimeSeries::from_pairs(pairs))
}

/// Share of built cells constructed at or after the cutoff year, on
/// the partition's combined construction-year grid clipped to the
/// partition extent.
///
/// # Errors
///
/// Returns [`StatsError::Raster`] if clipping fails or the clipped
/// grid holds no built cell.
pub fn built_since_share(
    layer: &RasterLayer,
    mask: &[MultiPolygon<f64>],
) -> Result<f64, StatsError> {
    let clipped = clip::clip_to_mask(layer, mask)?;
    Ok(reduce::built_since_ratio(&clipped, BUILT_CUTOFF_YEAR)?)
}

/// Fraction of population-grid cells that lost population after 2000.
///
/// # Errors
///
/// Returns [`StatsError::EmptyCells`] for an empty cell set; a share
/// of nothing is meaningless, not zero.
pub fn lost_population_share(partition: &str, cells: &[GridCell]) -> Result<f64, StatsError> {
    if cells.is_empty() {
        return Err(StatsError::EmptyCells {
            partition: partition.to_string(),
        });
    }
    let lost = cells
        .iter()
        .filter(|cell| cell.pop_difference < 0.0)
        .count();
    #[allow(clippy::cast_precision_loss)]
    Ok(lost as f64 / cells.len() as f64)
}

/// Restricts a state's population-grid cells to a municipality: a
/// cell survives if it intersects any of the municipality's 2020
/// AGEBs.
///
/// # Errors
///
/// Returns [`StatsError::Spatial`] if the AGEB set is in a
/// geographic CRS.
pub fn cells_for_municipality(
    cells: Vec<GridCell>,
    agebs_2020: &RegionSet,
) -> Result<Vec<GridCell>, StatsError> {
    let index = RegionIndex::build(agebs_2020.crs(), agebs_2020.regions())?;

    let before = cells.len();
    let kept: Vec<GridCell> = cells
        .into_iter()
        .filter(|cell| index.intersects(&cell.geometry))
        .collect();
    log::debug!("Kept {}/{before} cells for the municipality", kept.len());
    Ok(kept)
}
