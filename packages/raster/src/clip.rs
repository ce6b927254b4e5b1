//! Clip-with-crop of raster layers against polygon masks.
//!
//! The output grid is shrunk to the intersection of the mask's
//! bounding box with the raster extent; cells whose centers fall
//! outside every mask polygon are zeroed, and the no-data sentinel is
//! remapped to zero so it can never contribute to a reduction.

use geo::{BoundingRect, Contains, MultiPolygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

use crate::{RasterError, RasterLayer};

/// A mask polygon in the R-tree used for cell-center tests.
struct MaskEntry {
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for MaskEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Clips a layer to a polygon mask with crop semantics.
///
/// Cell membership uses the cell center and interior containment, the
/// same predicate the overlay engine applies to point features. The
/// returned layer keeps the source's year and no-data sentinel, but
/// its grid no longer holds any sentinel-valued cell.
///
/// # Errors
///
/// Returns [`RasterError::EmptyMask`] if the mask has no extent,
/// [`RasterError::DisjointMask`] if it does not overlap the raster,
/// and [`RasterError::SingularTransform`] if the layer's transform
/// cannot be inverted.
#[allow(clippy::float_cmp)] // the no-data sentinel is an exact value
pub fn clip_to_mask(
    layer: &RasterLayer,
    mask: &[MultiPolygon<f64>],
) -> Result<RasterLayer, RasterError> {
    let bounds = mask_bounds(mask).ok_or(RasterError::EmptyMask { year: layer.year })?;
    let (row_lo, row_hi, col_lo, col_hi) = crop_window(layer, &bounds)?;

    if row_lo >= row_hi || col_lo >= col_hi {
        return Err(RasterError::DisjointMask { year: layer.year });
    }

    let entries = mask
        .iter()
        .filter_map(|polygon| {
            polygon.bounding_rect().map(|rect| MaskEntry {
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
                polygon: polygon.clone(),
            })
        })
        .collect();
    let index: RTree<MaskEntry> = RTree::bulk_load(entries);

    let (out_h, out_w) = (row_hi - row_lo, col_hi - col_lo);
    let mut data = Vec::with_capacity(out_h * out_w);
    for row in row_lo..row_hi {
        for col in col_lo..col_hi {
            let (x, y) = layer.transform.cell_center(row, col);
            let point = geo::Point::new(x, y);
            let covered = index
                .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
                .any(|entry| entry.polygon.contains(&point));

            let value = layer.get(row, col);
            data.push(if covered && value != layer.nodata {
                value
            } else {
                0.0
            });
        }
    }

    log::debug!(
        "Clipped {}x{} layer for {} to {out_w}x{out_h} window",
        layer.width,
        layer.height,
        layer.year
    );

    RasterLayer::new(
        layer.year,
        out_w,
        out_h,
        data,
        layer.transform.window(row_lo, col_lo),
        layer.nodata,
    )
}

/// Combined bounding rectangle of all mask polygons.
fn mask_bounds(mask: &[MultiPolygon<f64>]) -> Option<Rect<f64>> {
    let mut bounds: Option<Rect<f64>> = None;
    for polygon in mask {
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        bounds = Some(bounds.map_or(rect, |acc| {
            Rect::new(
                geo::coord! {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                geo::coord! {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        }));
    }
    bounds
}

/// Pixel window (rows and cols, half-open) covering the mask bounds,
/// clamped to the grid extent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn crop_window(
    layer: &RasterLayer,
    bounds: &Rect<f64>,
) -> Result<(usize, usize, usize, usize), RasterError> {
    let corners = [
        (bounds.min().x, bounds.min().y),
        (bounds.min().x, bounds.max().y),
        (bounds.max().x, bounds.min().y),
        (bounds.max().x, bounds.max().y),
    ];

    let mut col_min = f64::INFINITY;
    let mut col_max = f64::NEG_INFINITY;
    let mut row_min = f64::INFINITY;
    let mut row_max = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (col, row) = layer
            .transform
            .world_to_grid(x, y)
            .ok_or(RasterError::SingularTransform { year: layer.year })?;
        col_min = col_min.min(col);
        col_max = col_max.max(col);
        row_min = row_min.min(row);
        row_max = row_max.max(row);
    }

    #[allow(clippy::cast_precision_loss)]
    let (width, height) = (layer.width as f64, layer.height as f64);
    let col_lo = col_min.floor().clamp(0.0, width) as usize;
    let col_hi = col_max.ceil().clamp(0.0, width) as usize;
    let row_lo = row_min.floor().clamp(0.0, height) as usize;
    let row_hi = row_max.ceil().clamp(0.0, height) as usize;
    Ok((row_lo, row_hi, col_lo, col_hi))
}
