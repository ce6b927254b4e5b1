#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the metropolitan zone statistics runner.
//!
//! Each invocation computes one statistic for one partition at one
//! geography resolution and writes it under the output directory:
//! CSV for longitudinal series, GeoJSON for geometry-attached
//! aggregates, plain text for scalars.
//!
//! Expected data layout below the configured roots:
//! - `{data_dir}/agebs/{partition}/{year}.geojson` — census AGEBs per year
//! - `{data_dir}/cells/{level}/{partition}.geojson` — aggregation units
//! - `{jobs_dir}/{partition}.csv` — DENUE expected-jobs points (WGS84)
//! - `{population_grids_dir}/differences/2000_2020/{key}.geojson` —
//!   population-change grid cells, per zone or per state
//! - `{ghsl_dir}/BUILT_100/{year}.asc` and `{ghsl_dir}/BUILT_YEAR_100.asc`
//!   — GHSL built-up grids

mod output;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use metro_atlas_geography::{
    AGEB_SCHEMA, CODIGO_SCHEMA, load_grid_cells, load_job_points, load_regions,
};
use metro_atlas_geography_models::keys::PartitionKey;
use metro_atlas_geography_models::{Epsg, GeographyLevel, GridCell, RegionSet};
use metro_atlas_raster::store::{AsciiGridSource, read_ascii_grid};
use metro_atlas_stats::config::AtlasConfig;
use metro_atlas_stats::{
    AGEB_CONTEXT, LevelContext, MUN_CONTEXT, ZONE_CONTEXT, built_area_series, built_since_share,
    built_urban_area_series, cells_for_municipality, classify_jobs, jobs_by_region,
    lost_population_share, population_series, total_jobs,
};

/// GHSL built-up grids use 65535 as their (undeclared) no-data value.
const GHSL_NODATA: f64 = 65535.0;

#[derive(Parser)]
#[command(name = "metro-atlas", about = "Metropolitan zone statistics runner")]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "atlas.toml")]
    config: PathBuf,

    /// Output directory.
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Geography resolution (zone, mun, ageb).
    #[arg(long, default_value = "zone")]
    level: GeographyLevel,

    /// Partition key: `state.seq` for zones (`"9.1"`), CVEGEO for
    /// municipalities (`"9014"`).
    #[arg(long)]
    partition: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choropleth of expected jobs per unit, with a natural-breaks legend
    Jobs,
    /// Total expected jobs over the partition
    TotalJobs,
    /// Total AGEB population per census year
    Population,
    /// Built-up raster area per census year
    BuiltArea,
    /// Built urban (AGEB polygon) area per census year
    UrbanArea,
    /// Share of built cells constructed since 2000
    BuiltSince,
    /// Share of population-grid cells that lost population after 2000
    LostPopulation,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let started = Instant::now();

    let config = AtlasConfig::load(&cli.config)?;
    let key = PartitionKey::parse(&cli.partition)?;
    check_level(&key, cli.level)?;
    if config.bounds_for(cli.level, &cli.partition).is_none() {
        log::warn!(
            "No map bounds configured for partition {} at level {}",
            cli.partition,
            cli.level
        );
    }
    std::fs::create_dir_all(&cli.out)?;

    run(&cli, &config, &key)?;
    log::info!("Finished in {:?}", started.elapsed());
    Ok(())
}

fn run(
    cli: &Cli,
    config: &AtlasConfig,
    key: &PartitionKey,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = context_for(cli.level);
    let name = |stem: &str, ext: &str| {
        cli.out
            .join(format!("{stem}_{}_{}.{ext}", context.level, cli.partition))
    };

    match cli.command {
        Command::Jobs => {
            let units = load_units(config, cli.level, &cli.partition)?;
            let points =
                load_job_points(&config.paths.jobs_dir.join(format!("{}.csv", cli.partition)))?;
            let joined = jobs_by_region(&units, &points)?;
            let classification = classify_jobs(&joined)?;
            output::write_classified_regions(&name("jobs", "geojson"), &joined, &classification)?;
        }
        Command::TotalJobs => {
            let units = load_units(config, cli.level, &cli.partition)?;
            let points =
                load_job_points(&config.paths.jobs_dir.join(format!("{}.csv", cli.partition)))?;
            let joined = jobs_by_region(&units, &points)?;
            output::write_scalar(&name("total_jobs", "txt"), total_jobs(&joined))?;
        }
        Command::Population => {
            let agebs = load_agebs_by_year(config, &cli.partition, context.years)?;
            let series = population_series(&agebs, context.years)?;
            output::write_time_series(&name("population", "csv"), &series)?;
        }
        Command::BuiltArea => {
            let agebs = load_agebs_by_year(config, &cli.partition, context.years)?;
            let source =
                AsciiGridSource::new(&config.paths.ghsl_dir.join("BUILT_100"), GHSL_NODATA);
            let series = built_area_series(&source, &agebs, context.years)?;
            output::write_time_series(&name("built_area", "csv"), &series)?;
        }
        Command::UrbanArea => {
            let agebs = load_agebs_by_year(config, &cli.partition, context.years)?;
            let series = built_urban_area_series(&agebs, context.years)?;
            output::write_time_series(&name("urban_area", "csv"), &series)?;
        }
        Command::BuiltSince => {
            let agebs = load_agebs(config, &cli.partition, 2020)?;
            let mask: Vec<_> = agebs
                .regions()
                .iter()
                .map(|region| region.geometry.clone())
                .collect();
            let layer = read_ascii_grid(
                &config.paths.ghsl_dir.join("BUILT_YEAR_100.asc"),
                2020,
                GHSL_NODATA,
            )?;
            output::write_scalar(
                &name("built_since", "txt"),
                built_since_share(&layer, &mask)?,
            )?;
        }
        Command::LostPopulation => {
            let cells = load_cells(config, cli.level, key, &cli.partition)?;
            let share = lost_population_share(&cli.partition, &cells)?;
            output::write_scalar(&name("lost_population", "txt"), share)?;
        }
    }
    Ok(())
}

const fn context_for(level: GeographyLevel) -> LevelContext {
    match level {
        GeographyLevel::Zone => ZONE_CONTEXT,
        GeographyLevel::Mun => MUN_CONTEXT,
        GeographyLevel::Ageb => AGEB_CONTEXT,
    }
}

/// Zone keys drive zone and AGEB runs; municipality keys drive
/// municipality runs. Anything else is a mixed-up invocation.
fn check_level(key: &PartitionKey, level: GeographyLevel) -> Result<(), String> {
    let ok = match key {
        PartitionKey::Zone { .. } => {
            matches!(level, GeographyLevel::Zone | GeographyLevel::Ageb)
        }
        PartitionKey::Municipality { .. } => matches!(level, GeographyLevel::Mun),
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "Partition key '{key}' does not belong to level '{level}'"
        ))
    }
}

fn load_agebs(
    config: &AtlasConfig,
    partition: &str,
    year: u16,
) -> Result<RegionSet, Box<dyn std::error::Error>> {
    let path = config
        .paths
        .data_dir
        .join("agebs")
        .join(partition)
        .join(format!("{year}.geojson"));
    Ok(load_regions(&path, Epsg::MEXICO_LCC, AGEB_SCHEMA)?)
}

fn load_agebs_by_year(
    config: &AtlasConfig,
    partition: &str,
    years: &[u16],
) -> Result<BTreeMap<u16, RegionSet>, Box<dyn std::error::Error>> {
    let mut sets = BTreeMap::new();
    for &year in years {
        sets.insert(year, load_agebs(config, partition, year)?);
    }
    Ok(sets)
}

fn load_units(
    config: &AtlasConfig,
    level: GeographyLevel,
    partition: &str,
) -> Result<RegionSet, Box<dyn std::error::Error>> {
    match level {
        GeographyLevel::Ageb => load_agebs(config, partition, 2020),
        GeographyLevel::Zone | GeographyLevel::Mun => {
            let path = config
                .paths
                .data_dir
                .join("cells")
                .join(level.to_string())
                .join(format!("{partition}.geojson"));
            Ok(load_regions(&path, Epsg::MEXICO_LCC, CODIGO_SCHEMA)?)
        }
    }
}

/// Loads the population-change cells for a partition. Zones have their
/// own difference layer; municipalities carve theirs out of the state
/// layer by intersection with their 2020 AGEBs.
fn load_cells(
    config: &AtlasConfig,
    level: GeographyLevel,
    key: &PartitionKey,
    partition: &str,
) -> Result<Vec<GridCell>, Box<dyn std::error::Error>> {
    let differences = config
        .paths
        .population_grids_dir
        .join("differences")
        .join("2000_2020");

    match level {
        GeographyLevel::Zone | GeographyLevel::Ageb => Ok(load_grid_cells(
            &differences.join(format!("{partition}.geojson")),
        )?),
        GeographyLevel::Mun => {
            let state =
                load_grid_cells(&differences.join(format!("{}.geojson", key.state_code())))?;
            let agebs = load_agebs(config, partition, 2020)?;
            Ok(cells_for_municipality(state, &agebs)?)
        }
    }
}
