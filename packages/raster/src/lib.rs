#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raster clipping and multi-year reduction.
//!
//! A [`RasterLayer`] is a row-major numeric grid with an affine
//! transform mapping cells to planar coordinates and a no-data
//! sentinel. Layers are clipped to polygon masks with crop semantics
//! ([`clip`]), reduced to scalar statistics ([`reduce`]), and loaded
//! per year through the [`store::RasterSource`] seam.

pub mod clip;
pub mod reduce;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during raster operations.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Filesystem read failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Grid file contents could not be parsed.
    #[error("Parse error in '{path}': {message}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    /// No raster layer was available for a requested year.
    #[error("No raster layer for year {year} in '{source_name}'")]
    MissingYear {
        /// The requested census year.
        year: u16,
        /// The source that was asked.
        source_name: String,
    },

    /// No mask polygons were supplied for a requested year.
    #[error("No mask polygons for year {year}")]
    MissingMask {
        /// The requested census year.
        year: u16,
    },

    /// The clip mask had no area at all.
    #[error("Clip mask for year {year} is empty")]
    EmptyMask {
        /// Year of the layer being clipped.
        year: u16,
    },

    /// The clip mask did not intersect the raster extent.
    #[error("Clip mask for year {year} does not intersect the raster extent")]
    DisjointMask {
        /// Year of the layer being clipped.
        year: u16,
    },

    /// Grid dimensions disagreed with the data length.
    #[error("Grid for year {year} has {len} cells, expected {width}x{height}")]
    ShapeMismatch {
        /// Year of the offending layer.
        year: u16,
        /// Actual data length.
        len: usize,
        /// Declared width.
        width: usize,
        /// Declared height.
        height: usize,
    },

    /// The affine transform was not invertible.
    #[error("Affine transform for year {year} is singular")]
    SingularTransform {
        /// Year of the offending layer.
        year: u16,
    },

    /// A ratio statistic had an empty denominator.
    #[error("Grid for year {year} has no built cells; ratio is undefined")]
    NoBuiltCells {
        /// Year of the offending layer.
        year: u16,
    },
}

/// Affine transform from grid cells to planar world coordinates.
///
/// `x = a*col + b*row + c`, `y = d*col + e*row + f`, with (col, row)
/// addressing the top-left corner of a cell. North-up grids have
/// `b = d = 0` and a negative `e`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// Cell width term.
    pub a: f64,
    /// Row shear term.
    pub b: f64,
    /// X origin (west edge).
    pub c: f64,
    /// Column shear term.
    pub d: f64,
    /// Cell height term (negative for north-up grids).
    pub e: f64,
    /// Y origin (north edge).
    pub f: f64,
}

impl GridTransform {
    /// A north-up transform with square cells.
    #[must_use]
    pub const fn north_up(west: f64, north: f64, cell_size: f64) -> Self {
        Self {
            a: cell_size,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -cell_size,
            f: north,
        }
    }

    /// World coordinates of a cell's center.
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        #[allow(clippy::cast_precision_loss)]
        let (col, row) = (col as f64 + 0.5, row as f64 + 0.5);
        (
            self.a.mul_add(col, self.b.mul_add(row, self.c)),
            self.d.mul_add(col, self.e.mul_add(row, self.f)),
        )
    }

    /// Fractional (col, row) grid coordinates of a world point, or
    /// `None` if the transform is singular.
    #[must_use]
    pub fn world_to_grid(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a.mul_add(self.e, -(self.b * self.d));
        if det.abs() < f64::EPSILON {
            return None;
        }
        let (dx, dy) = (x - self.c, y - self.f);
        let col = self.e.mul_add(dx, -(self.b * dy)) / det;
        let row = self.a.mul_add(dy, -(self.d * dx)) / det;
        Some((col, row))
    }

    /// The transform of a crop window whose top-left cell is
    /// (`row0`, `col0`) of this grid.
    #[must_use]
    pub fn window(&self, row0: usize, col0: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let (col0, row0) = (col0 as f64, row0 as f64);
        Self {
            c: self.a.mul_add(col0, self.b.mul_add(row0, self.c)),
            f: self.d.mul_add(col0, self.e.mul_add(row0, self.f)),
            ..*self
        }
    }
}

/// A single-band numeric raster tagged with its census year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    /// Census year (or built-up epoch) this layer measures.
    pub year: u16,
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// Row-major cell values.
    pub data: Vec<f64>,
    /// Cell-to-world transform.
    pub transform: GridTransform,
    /// Sentinel value meaning "no measurement"; never contributes to
    /// reductions.
    pub nodata: f64,
}

impl RasterLayer {
    /// Builds a layer, validating that the data length matches the
    /// declared shape.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::ShapeMismatch`] when it does not.
    pub fn new(
        year: u16,
        width: usize,
        height: usize,
        data: Vec<f64>,
        transform: GridTransform,
        nodata: f64,
    ) -> Result<Self, RasterError> {
        if data.len() != width * height {
            return Err(RasterError::ShapeMismatch {
                year,
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            year,
            width,
            height,
            data,
            transform,
            nodata,
        })
    }

    /// Value at (row, col). Row 0 is the northernmost row.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }
}
