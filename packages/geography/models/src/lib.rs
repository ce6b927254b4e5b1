#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic data model for metropolitan zone statistics.
//!
//! These types describe the polygon geography (metropolitan zones,
//! municipalities, AGEBs), the weighted point features joined onto it,
//! and the population-grid cells used for longitudinal statistics. They
//! carry no I/O; loading lives in `metro_atlas_geography`.

pub mod keys;

use std::collections::BTreeSet;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Census years with AGEB-level geography available.
pub const CENSUS_YEARS: [u16; 4] = [1990, 2000, 2010, 2020];

/// An EPSG coordinate reference system tag.
///
/// Geometry sets carry their CRS explicitly so that spatial predicates
/// can refuse to compare geometry expressed in different systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epsg(pub u32);

impl Epsg {
    /// Geographic WGS84 (longitude/latitude degrees).
    pub const WGS84: Self = Self(4326);

    /// Mexico ITRF2008 / LCC, the planar metric CRS all containment and
    /// area computations run in.
    pub const MEXICO_LCC: Self = Self(6372);

    /// Whether this CRS is projected (distance-preserving planar
    /// coordinates) rather than geographic degrees.
    #[must_use]
    pub const fn is_projected(self) -> bool {
        !matches!(self, Self::WGS84)
    }
}

impl std::fmt::Display for Epsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Geographic aggregation resolution, coarsest to finest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GeographyLevel {
    /// Metropolitan zone.
    Zone,
    /// Municipality.
    Mun,
    /// Census block group (AGEB), the finest unit.
    Ageb,
}

/// Errors raised while constructing or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A region collection that must be non-empty was empty.
    #[error("Region set '{dataset}' is empty")]
    EmptyRegionSet {
        /// Name of the offending dataset.
        dataset: String,
    },

    /// Two regions in the same partition shared an identifier.
    #[error("Region set '{dataset}' contains duplicate identifier '{id}'")]
    DuplicateRegionId {
        /// Name of the offending dataset.
        dataset: String,
        /// The repeated identifier.
        id: String,
    },

    /// A point feature carried a negative weight.
    #[error("Point set '{dataset}' contains negative weight {weight} at index {index}")]
    NegativeWeight {
        /// Name of the offending dataset.
        dataset: String,
        /// Index of the offending point.
        index: usize,
        /// The negative weight value.
        weight: f64,
    },
}

/// A polygon geography unit with a stable identifier.
///
/// The identifier is the `codigo` (zones, municipalities) or `CVEGEO`
/// (AGEBs) of the source geography. Regions are immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Stable identifier, unique within its partition.
    pub id: String,
    /// Polygon geometry in the owning set's CRS.
    pub geometry: MultiPolygon<f64>,
    /// Total population attribute (`POBTOT`), when the source carries it.
    pub population: Option<f64>,
}

/// An immutable collection of regions sharing one CRS.
///
/// Construction validates the partition invariant: identifiers are
/// unique and the collection is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    crs: Epsg,
    regions: Vec<Region>,
}

impl RegionSet {
    /// Builds a region set, enforcing unique identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if `regions` is empty or contains a
    /// duplicate identifier. The `dataset` name is included in the
    /// error so callers can tell which input failed.
    pub fn new(dataset: &str, crs: Epsg, regions: Vec<Region>) -> Result<Self, ModelError> {
        if regions.is_empty() {
            return Err(ModelError::EmptyRegionSet {
                dataset: dataset.to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for region in &regions {
            if !seen.insert(region.id.as_str()) {
                return Err(ModelError::DuplicateRegionId {
                    dataset: dataset.to_string(),
                    id: region.id.clone(),
                });
            }
        }

        Ok(Self { crs, regions })
    }

    /// The CRS every geometry in this set is expressed in.
    #[must_use]
    pub const fn crs(&self) -> Epsg {
        self.crs
    }

    /// The regions, in load order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the set is empty. Always `false` for validated sets;
    /// present for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Looks up a region by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }
}

/// A weighted point feature (e.g. an establishment with an expected
/// job count) in planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFeature {
    /// Easting in the owning set's CRS.
    pub x: f64,
    /// Northing in the owning set's CRS.
    pub y: f64,
    /// Non-negative numeric weight.
    pub weight: f64,
}

/// A read-only collection of weighted points sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    crs: Epsg,
    points: Vec<PointFeature>,
}

impl PointSet {
    /// Builds a point set, rejecting negative weights.
    ///
    /// An empty collection is valid: the overlay join of an empty point
    /// set is an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NegativeWeight`] naming the dataset and the
    /// first offending point.
    pub fn new(dataset: &str, crs: Epsg, points: Vec<PointFeature>) -> Result<Self, ModelError> {
        for (index, point) in points.iter().enumerate() {
            if point.weight < 0.0 {
                return Err(ModelError::NegativeWeight {
                    dataset: dataset.to_string(),
                    index,
                    weight: point.weight,
                });
            }
        }
        Ok(Self { crs, points })
    }

    /// The CRS every point in this set is expressed in.
    #[must_use]
    pub const fn crs(&self) -> Epsg {
        self.crs
    }

    /// The points, in load order.
    #[must_use]
    pub fn points(&self) -> &[PointFeature] {
        &self.points
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A population-grid cell with its 2000 to 2020 population change.
///
/// Cells come from the population-grids difference layers and drive the
/// lost-population share statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Zone code (`codigo`) the cell belongs to.
    pub codigo: String,
    /// Cell polygon in the planar CRS.
    pub geometry: MultiPolygon<f64>,
    /// Population change between 2000 and 2020; negative means loss.
    pub pop_difference: f64,
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + side, y: y0),
            (x: x0 + side, y: y0 + side),
            (x: x0, y: y0 + side),
        ]])
    }

    #[test]
    fn region_set_rejects_duplicate_ids() {
        let regions = vec![
            Region {
                id: "09.1".into(),
                geometry: square(0.0, 0.0, 1.0),
                population: None,
            },
            Region {
                id: "09.1".into(),
                geometry: square(2.0, 0.0, 1.0),
                population: None,
            },
        ];
        let err = RegionSet::new("agebs_2020", Epsg::MEXICO_LCC, regions).unwrap_err();
        assert!(err.to_string().contains("agebs_2020"));
        assert!(err.to_string().contains("09.1"));
    }

    #[test]
    fn region_set_rejects_empty() {
        let err = RegionSet::new("muns_1990", Epsg::MEXICO_LCC, vec![]).unwrap_err();
        assert!(err.to_string().contains("muns_1990"));
    }

    #[test]
    fn point_set_rejects_negative_weight() {
        let points = vec![PointFeature {
            x: 0.0,
            y: 0.0,
            weight: -3.0,
        }];
        let err = PointSet::new("jobs", Epsg::MEXICO_LCC, points).unwrap_err();
        assert!(err.to_string().contains("jobs"));
    }

    #[test]
    fn point_set_allows_empty() {
        let set = PointSet::new("jobs", Epsg::MEXICO_LCC, vec![]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn epsg_projected_flag() {
        assert!(Epsg::MEXICO_LCC.is_projected());
        assert!(!Epsg::WGS84.is_projected());
        assert_eq!(Epsg::MEXICO_LCC.to_string(), "EPSG:6372");
    }

    #[test]
    fn level_round_trips_through_strings() {
        assert_eq!(GeographyLevel::Zone.to_string(), "zone");
        assert_eq!(GeographyLevel::Mun.to_string(), "mun");
        assert_eq!(
            "ageb".parse::<GeographyLevel>().unwrap(),
            GeographyLevel::Ageb
        );
    }
}
