//! Per-year raster layer sources.
//!
//! [`RasterSource`] is the seam between the reducer and raster
//! storage: each call opens, reads, and releases one year's layer, so
//! no handle is ever held across (year, partition) computations.
//! Heavyweight raster formats are converted upstream; the on-disk
//! adapter carried here reads ESRI ASCII grids.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{GridTransform, RasterError, RasterLayer};

/// Loads one raster layer per year.
pub trait RasterSource {
    /// Loads the layer for a census year.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::MissingYear`] if the source has no layer
    /// for `year`, or another [`RasterError`] if reading fails.
    fn load(&self, year: u16) -> Result<RasterLayer, RasterError>;
}

/// A directory of per-year ESRI ASCII grid files (`<dir>/<year>.asc`).
///
/// The file's own `nodata_value` header is honored when present;
/// otherwise the configured sentinel applies (GHSL built-up grids use
/// 65535 without declaring it).
pub struct AsciiGridSource {
    dir: PathBuf,
    nodata: f64,
}

impl AsciiGridSource {
    /// Creates a source rooted at `dir` with a default no-data
    /// sentinel.
    #[must_use]
    pub fn new(dir: &Path, nodata: f64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            nodata,
        }
    }
}

impl RasterSource for AsciiGridSource {
    fn load(&self, year: u16) -> Result<RasterLayer, RasterError> {
        let path = self.dir.join(format!("{year}.asc"));
        if !path.exists() {
            return Err(RasterError::MissingYear {
                year,
                source_name: self.dir.display().to_string(),
            });
        }
        let layer = read_ascii_grid(&path, year, self.nodata)?;
        log::debug!(
            "Loaded {}x{} grid for {year} from {}",
            layer.width,
            layer.height,
            path.display()
        );
        Ok(layer)
    }
}

/// Reads a single ESRI ASCII grid file into a layer tagged `year`.
///
/// # Errors
///
/// Returns [`RasterError`] if the file cannot be read or parsed.
pub fn read_ascii_grid(path: &Path, year: u16, nodata: f64) -> Result<RasterLayer, RasterError> {
    let contents = std::fs::read_to_string(path)?;
    parse_ascii_grid(&contents, path, year, nodata)
}

/// An in-memory source, used by tests and by callers that already
/// decoded their rasters.
#[derive(Default)]
pub struct MemorySource {
    name: String,
    layers: BTreeMap<u16, RasterLayer>,
}

impl MemorySource {
    /// Creates an empty source with a name used in error messages.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: BTreeMap::new(),
        }
    }

    /// Adds a layer, keyed by its year.
    pub fn insert(&mut self, layer: RasterLayer) {
        self.layers.insert(layer.year, layer);
    }
}

impl RasterSource for MemorySource {
    fn load(&self, year: u16) -> Result<RasterLayer, RasterError> {
        self.layers
            .get(&year)
            .cloned()
            .ok_or_else(|| RasterError::MissingYear {
                year,
                source_name: self.name.clone(),
            })
    }
}

/// Parses an ESRI ASCII grid.
///
/// Header keys (`ncols`, `nrows`, `xllcorner`, `yllcorner`,
/// `cellsize`, optional `nodata_value`) are case-insensitive; data
/// rows follow north to south.
fn parse_ascii_grid(
    contents: &str,
    path: &Path,
    year: u16,
    default_nodata: f64,
) -> Result<RasterLayer, RasterError> {
    let parse_err = |message: String| RasterError::Parse {
        path: path.display().to_string(),
        message,
    };

    let mut header: BTreeMap<String, f64> = BTreeMap::new();
    let mut values: Vec<f64> = Vec::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        if values.is_empty() && first.chars().next().is_some_and(char::is_alphabetic) {
            let value: f64 = tokens
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| parse_err(format!("bad header line '{line}'")))?;
            header.insert(first.to_ascii_lowercase(), value);
        } else {
            for token in line.split_whitespace() {
                values.push(
                    token
                        .parse()
                        .map_err(|_| parse_err(format!("bad cell value '{token}'")))?,
                );
            }
        }
    }

    let require = |key: &str| {
        header
            .get(key)
            .copied()
            .ok_or_else(|| parse_err(format!("missing header '{key}'")))
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ncols = require("ncols")? as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nrows = require("nrows")? as usize;
    let xllcorner = require("xllcorner")?;
    let yllcorner = require("yllcorner")?;
    let cellsize = require("cellsize")?;
    let nodata = header
        .get("nodata_value")
        .copied()
        .unwrap_or(default_nodata);

    if cellsize <= 0.0 {
        return Err(parse_err(format!("non-positive cellsize {cellsize}")));
    }

    #[allow(clippy::cast_precision_loss)]
    let north = (nrows as f64).mul_add(cellsize, yllcorner);
    let transform = GridTransform::north_up(xllcorner, north, cellsize);

    RasterLayer::new(year, ncols, nrows, values, transform, nodata)
}
