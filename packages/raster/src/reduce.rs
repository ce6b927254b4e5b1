//! Scalar reductions over clipped raster layers and multi-year series
//! assembly.

use std::collections::BTreeMap;

use geo::MultiPolygon;

use crate::clip::clip_to_mask;
use crate::store::RasterSource;
use crate::{RasterError, RasterLayer};

/// Sums all cell values, treating the no-data sentinel as zero.
///
/// [`clip_to_mask`](crate::clip::clip_to_mask) already remaps the
/// sentinel, but the reduction guards against it anyway so the no-data
/// neutrality invariant holds for any layer.
#[must_use]
#[allow(clippy::float_cmp)] // the no-data sentinel is an exact value
pub fn sum(layer: &RasterLayer) -> f64 {
    layer
        .data
        .iter()
        .filter(|&&value| value != layer.nodata)
        .sum()
}

/// Fraction of built cells at or after a cutoff year.
///
/// The layer encodes a construction year per cell (zero meaning never
/// built). The ratio is `count(cells >= cutoff) / count(cells > 0)`.
///
/// # Errors
///
/// Returns [`RasterError::NoBuiltCells`] when the layer holds no
/// built cell at all; the ratio would otherwise be a silent NaN.
#[allow(clippy::float_cmp)] // the no-data sentinel is an exact value
pub fn built_since_ratio(layer: &RasterLayer, cutoff: u16) -> Result<f64, RasterError> {
    let mut built = 0u64;
    let mut since = 0u64;
    for &value in &layer.data {
        if value == layer.nodata || value <= 0.0 {
            continue;
        }
        built += 1;
        if value >= f64::from(cutoff) {
            since += 1;
        }
    }

    if built == 0 {
        return Err(RasterError::NoBuiltCells { year: layer.year });
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(since as f64 / built as f64)
}

/// Assembles a per-year statistic series: for each year, load the
/// layer, clip it to that year's mask, and sum the clipped grid.
///
/// Values are returned in the order of `years` (callers pass the
/// census year set in ascending order). Any single-year failure fails
/// the whole series; a time series with a silently missing year is
/// misleading when plotted as continuous.
///
/// # Errors
///
/// Returns [`RasterError`] if a year has no mask, its layer cannot be
/// loaded, or clipping fails.
pub fn assemble_series(
    source: &dyn RasterSource,
    years: &[u16],
    masks: &BTreeMap<u16, Vec<MultiPolygon<f64>>>,
) -> Result<Vec<(u16, f64)>, RasterError> {
    let mut series = Vec::with_capacity(years.len());
    for &year in years {
        let mask = masks
            .get(&year)
            .ok_or(RasterError::MissingMask { year })?;
        let layer = source.load(year)?;
        let clipped = clip_to_mask(&layer, mask)?;
        let total = sum(&clipped);
        log::info!("Reduced year {year}: {total}");
        series.push((year, total));
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::GridTransform;
    use crate::store::MemorySource;

    const NODATA: f64 = 65535.0;

    fn flat_layer(year: u16, values: &[f64]) -> RasterLayer {
        RasterLayer::new(
            year,
            values.len(),
            1,
            values.to_vec(),
            GridTransform::north_up(0.0, 100.0, 100.0),
            NODATA,
        )
        .unwrap()
    }

    fn covering_mask(cells: usize) -> Vec<MultiPolygon<f64>> {
        #[allow(clippy::cast_precision_loss)]
        let east = cells as f64 * 100.0;
        vec![MultiPolygon(vec![polygon![
            (x: -1.0, y: -1.0),
            (x: east + 1.0, y: -1.0),
            (x: east + 1.0, y: 101.0),
            (x: -1.0, y: 101.0),
        ]])]
    }

    #[test]
    fn sum_excludes_nodata() {
        let layer = flat_layer(2020, &[1.0, 2.0, NODATA, 4.0]);
        assert!((sum(&layer) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_ratio_boundary() {
        // One non-zero cell >= 2000 out of two non-zero cells.
        let layer = flat_layer(2020, &[0.0, 1999.0, 2005.0]);
        let ratio = built_since_ratio(&layer, 2000).unwrap();
        assert!((ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_ratio_ignores_nodata() {
        let layer = flat_layer(2020, &[NODATA, 2005.0]);
        let ratio = built_since_ratio(&layer, 2000).unwrap();
        assert!((ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_ratio_without_built_cells_fails() {
        let layer = flat_layer(2020, &[0.0, 0.0]);
        assert!(matches!(
            built_since_ratio(&layer, 2000),
            Err(RasterError::NoBuiltCells { year: 2020 })
        ));
    }

    #[test]
    fn series_covers_all_years_in_order() {
        let years = [1990, 2000, 2010, 2020];
        let mut source = MemorySource::new("ghsl_test");
        let mut masks = BTreeMap::new();
        for (i, &year) in years.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let base = (i + 1) as f64;
            source.insert(flat_layer(year, &[base, base * 2.0]));
            masks.insert(year, covering_mask(2));
        }

        let series = assemble_series(&source, &years, &masks).unwrap();
        assert_eq!(
            series,
            vec![(1990, 3.0), (2000, 6.0), (2010, 9.0), (2020, 12.0)]
        );
    }

    #[test]
    fn missing_year_fails_whole_series() {
        let mut source = MemorySource::new("ghsl_test");
        source.insert(flat_layer(1990, &[1.0]));
        let mut masks = BTreeMap::new();
        masks.insert(1990, covering_mask(1));
        masks.insert(2000, covering_mask(1));

        let err = assemble_series(&source, &[1990, 2000], &masks).unwrap_err();
        assert!(matches!(err, RasterError::MissingYear { year: 2000, .. }));
    }

    #[test]
    fn missing_mask_fails_whole_series() {
        let mut source = MemorySource::new("ghsl_test");
        source.insert(flat_layer(1990, &[1.0]));

        let err = assemble_series(&source, &[1990], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, RasterError::MissingMask { year: 1990 }));
    }

    #[test]
    fn reduction_is_idempotent() {
        let layer = flat_layer(2020, &[3.0, NODATA, 5.0]);
        let first = sum(&layer);
        let second = sum(&layer);
        assert!((first - second).abs() < f64::EPSILON);
        assert!(first.to_bits() == second.to_bits());
    }
}
