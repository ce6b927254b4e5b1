//! Atlas configuration.
//!
//! An explicitly constructed, immutable value passed into the
//! orchestrator at startup, replacing env-derived globals: one TOML
//! document holds the data paths and the per-geography map bounds
//! plus optional label/legend overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use metro_atlas_geography_models::GeographyLevel;
use serde::Deserialize;

use crate::StatsError;

/// Root data paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    /// GHSL built-up raster directory (`BUILT_100/<year>.asc` below it).
    pub ghsl_dir: PathBuf,
    /// Population grids directory (difference layers below it).
    pub population_grids_dir: PathBuf,
    /// DENUE job estimates directory.
    pub jobs_dir: PathBuf,
    /// Partition-scoped boundary and overlay artifacts.
    pub data_dir: PathBuf,
}

/// Per-geography presentation and extent configuration.
///
/// Keys of every map are partition keys (`"9.1"`, `"9014"`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LevelConfig {
    /// Map extents per partition: `[min_x, min_y, max_x, max_y]`.
    pub bounds: BTreeMap<String, [f64; 4]>,
    /// Display name overrides.
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    /// Boundary line width overrides for the renderer.
    #[serde(default)]
    pub linewidths: BTreeMap<String, f64>,
    /// Legend position overrides for the renderer.
    #[serde(default)]
    pub legend_pos: BTreeMap<String, String>,
}

/// The full immutable configuration value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AtlasConfig {
    /// Root data paths.
    pub paths: PathsConfig,
    /// Metropolitan zone configuration.
    pub zone: LevelConfig,
    /// Municipality configuration.
    #[serde(default)]
    pub mun: LevelConfig,
}

impl AtlasConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Config`] on schema violations.
    pub fn from_toml_str(raw: &str) -> Result<Self, StatsError> {
        toml::from_str(raw).map_err(|err| StatsError::Config {
            message: err.to_string(),
        })
    }

    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::info!(
            "Loaded config from {} ({} zone bounds, {} mun bounds)",
            path.display(),
            config.zone.bounds.len(),
            config.mun.bounds.len()
        );
        Ok(config)
    }

    /// The level configuration a geography resolution renders with.
    /// AGEB maps share the zone partitioning and therefore its
    /// configuration.
    #[must_use]
    pub const fn level(&self, level: GeographyLevel) -> &LevelConfig {
        match level {
            GeographyLevel::Zone | GeographyLevel::Ageb => &self.zone,
            GeographyLevel::Mun => &self.mun,
        }
    }

    /// Map extent for a partition, if configured.
    #[must_use]
    pub fn bounds_for(&self, level: GeographyLevel, partition: &str) -> Option<[f64; 4]> {
        self.level(level).bounds.get(partition).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [paths]
        ghsl_dir = "/data/ghsl"
        population_grids_dir = "/data/population_grids"
        jobs_dir = "/data/jobs"
        data_dir = "/data/atlas"

        [zone.bounds]
        "9.1" = [-99.4, 19.1, -98.9, 19.6]

        [zone.names]
        "9.1" = "Valle de México"

        [mun.bounds]
        "9014" = [-99.2, 19.3, -99.1, 19.5]

        [mun.legend_pos]
        "9014" = "lower right"
    "#;

    #[test]
    fn parses_full_schema() {
        let config = AtlasConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.paths.ghsl_dir, PathBuf::from("/data/ghsl"));
        assert_eq!(config.zone.names["9.1"], "Valle de México");
        assert_eq!(config.mun.legend_pos["9014"], "lower right");
    }

    #[test]
    fn ageb_level_shares_zone_bounds() {
        let config = AtlasConfig::from_toml_str(CONFIG).unwrap();
        let bounds = config.bounds_for(GeographyLevel::Ageb, "9.1").unwrap();
        assert!((bounds[0] - -99.4).abs() < f64::EPSILON);
        assert!(config.bounds_for(GeographyLevel::Mun, "9.1").is_none());
    }

    #[test]
    fn rejects_missing_paths() {
        let err = AtlasConfig::from_toml_str("[zone.bounds]\n").unwrap_err();
        assert!(err.to_string().contains("paths"));
    }
}
