#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overlay engine: spatial joins of weighted points onto polygon regions.
//!
//! Builds an R-tree over region polygons and answers point-in-polygon
//! queries with an envelope filter followed by an exact containment
//! test. The containment predicate is `geo::Contains`, i.e. interior
//! containment: a point exactly on a region boundary matches nothing.
//! That choice is used consistently everywhere this index is consulted.
//!
//! All predicates require planar (projected) coordinates; evaluating
//! containment in geographic degrees distorts the join and is rejected
//! up front.

use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, Intersects, MultiPolygon};
use metro_atlas_geography_models::{Epsg, PointSet, Region};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Aggregated weights keyed by region identifier.
///
/// A region with no contained points is absent, never zero-filled:
/// downstream renderers must not shade regions that were never joined.
pub type AggregationResult = BTreeMap<String, f64>;

/// Errors raised by overlay operations.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The two geometry sets were expressed in different CRSs.
    #[error("CRS mismatch: regions are in {regions} but points are in {points}")]
    CrsMismatch {
        /// CRS of the region set.
        regions: Epsg,
        /// CRS of the point set.
        points: Epsg,
    },

    /// A geometry set arrived in a geographic (degree-based) CRS.
    #[error("Dataset '{dataset}' is in geographic {crs}; project it before containment tests")]
    GeographicCrs {
        /// Name of the offending dataset.
        dataset: String,
        /// The geographic CRS it arrived in.
        crs: Epsg,
    },
}

/// A region polygon stored in the R-tree with its identifier.
struct RegionEntry {
    id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over one partition's region polygons.
///
/// Constructed once per partition-scoped computation and queried for
/// point containment and geometry intersection.
pub struct RegionIndex {
    crs: Epsg,
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Bulk-loads region polygons into an R-tree.
    ///
    /// An empty region slice builds an empty index (every lookup
    /// misses); a degenerate overlay input is an empty result, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeographicCrs`] if `crs` is not
    /// projected.
    pub fn build(crs: Epsg, regions: &[Region]) -> Result<Self, SpatialError> {
        if !crs.is_projected() {
            return Err(SpatialError::GeographicCrs {
                dataset: "regions".to_string(),
                crs,
            });
        }

        let entries = regions
            .iter()
            .map(|region| RegionEntry {
                id: region.id.clone(),
                envelope: compute_envelope(&region.geometry),
                polygon: region.geometry.clone(),
            })
            .collect();

        let tree = RTree::bulk_load(entries);
        log::debug!("Built region index over {} polygons", tree.size());
        Ok(Self { crs, tree })
    }

    /// The CRS the indexed polygons are expressed in.
    #[must_use]
    pub const fn crs(&self) -> Epsg {
        self.crs
    }

    /// Looks up the region containing a point.
    ///
    /// Regions within a partition tile without overlap, so the first
    /// containment match wins.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<&str> {
        let point = geo::Point::new(x, y);
        let query_env = AABB::from_point([x, y]);

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                return Some(&entry.id);
            }
        }
        None
    }

    /// Whether any indexed region intersects the probe geometry.
    ///
    /// Used to scope shared artifacts (population-grid cells) to a
    /// municipality's extent.
    #[must_use]
    pub fn intersects(&self, probe: &MultiPolygon<f64>) -> bool {
        let envelope = compute_envelope(probe);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|entry| entry.polygon.intersects(probe))
    }

    /// Sums point weights per containing region.
    ///
    /// Pure function of its inputs: each point is attributed to the
    /// region containing it (if any) and the weights are accumulated
    /// per region identifier. Regions with no matches are excluded
    /// from the result. Empty inputs yield an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the point set's CRS does not match
    /// the index's, or is geographic.
    pub fn sum_weights(&self, points: &PointSet) -> Result<AggregationResult, SpatialError> {
        if !points.crs().is_projected() {
            return Err(SpatialError::GeographicCrs {
                dataset: "points".to_string(),
                crs: points.crs(),
            });
        }
        if points.crs() != self.crs {
            return Err(SpatialError::CrsMismatch {
                regions: self.crs,
                points: points.crs(),
            });
        }

        let mut sums = AggregationResult::new();
        let mut matched = 0usize;
        for point in points.points() {
            if let Some(id) = self.locate(point.x, point.y) {
                *sums.entry(id.to_string()).or_insert(0.0) += point.weight;
                matched += 1;
            }
        }

        log::debug!(
            "Joined {matched}/{} points onto {} regions",
            points.len(),
            sums.len()
        );
        Ok(sums)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use metro_atlas_geography_models::PointFeature;

    use super::*;

    fn square(id: &str, x0: f64, y0: f64, side: f64) -> Region {
        Region {
            id: id.to_string(),
            geometry: MultiPolygon(vec![polygon![
                (x: x0, y: y0),
                (x: x0 + side, y: y0),
                (x: x0 + side, y: y0 + side),
                (x: x0, y: y0 + side),
            ]]),
            population: None,
        }
    }

    fn points(coords: &[(f64, f64, f64)]) -> PointSet {
        PointSet::new(
            "test_points",
            Epsg::MEXICO_LCC,
            coords
                .iter()
                .map(|&(x, y, weight)| PointFeature { x, y, weight })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn sums_weights_per_containing_region() {
        let regions = vec![square("a", 0.0, 0.0, 10.0), square("b", 20.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();

        let pts = points(&[
            (1.0, 1.0, 5.0),
            (9.0, 9.0, 2.5),
            (21.0, 3.0, 7.0),
            (50.0, 50.0, 100.0), // outside both
        ]);
        let result = index.sum_weights(&pts).unwrap();

        assert_eq!(result.len(), 2);
        assert!((result["a"] - 7.5).abs() < f64::EPSILON);
        assert!((result["b"] - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_match_regions_are_excluded() {
        let regions = vec![square("a", 0.0, 0.0, 10.0), square("empty", 100.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();

        let result = index.sum_weights(&points(&[(5.0, 5.0, 1.0)])).unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.contains_key("a"));
        assert!(!result.contains_key("empty"));
    }

    #[test]
    fn empty_inputs_yield_empty_result() {
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &[]).unwrap();
        let result = index.sum_weights(&points(&[(5.0, 5.0, 1.0)])).unwrap();
        assert!(result.is_empty());

        let regions = vec![square("a", 0.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();
        let result = index.sum_weights(&points(&[])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn rejects_crs_mismatch() {
        let regions = vec![square("a", 0.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();

        let pts = PointSet::new(
            "other_points",
            Epsg(32614),
            vec![PointFeature {
                x: 1.0,
                y: 1.0,
                weight: 1.0,
            }],
        )
        .unwrap();

        let err = index.sum_weights(&pts).unwrap_err();
        assert!(err.to_string().contains("EPSG:6372"));
        assert!(err.to_string().contains("EPSG:32614"));
    }

    #[test]
    fn rejects_geographic_crs() {
        let regions = vec![square("a", 0.0, 0.0, 10.0)];
        assert!(RegionIndex::build(Epsg::WGS84, &regions).is_err());

        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();
        let pts = PointSet::new(
            "wgs_points",
            Epsg::WGS84,
            vec![PointFeature {
                x: 1.0,
                y: 1.0,
                weight: 1.0,
            }],
        )
        .unwrap();
        assert!(index.sum_weights(&pts).is_err());
    }

    #[test]
    fn locate_finds_containing_region() {
        let regions = vec![square("a", 0.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();
        assert_eq!(index.locate(5.0, 5.0), Some("a"));
        assert_eq!(index.locate(15.0, 5.0), None);
    }

    #[test]
    fn intersects_detects_overlap_and_disjoint() {
        let regions = vec![square("a", 0.0, 0.0, 10.0)];
        let index = RegionIndex::build(Epsg::MEXICO_LCC, &regions).unwrap();

        let overlapping = square("probe", 5.0, 5.0, 10.0).geometry;
        let disjoint = square("probe", 50.0, 50.0, 10.0).geometry;
        assert!(index.intersects(&overlapping));
        assert!(!index.intersects(&disjoint));
    }
}
