//! Output writers: CSV for time series, GeoJSON for classified
//! region aggregates, plain text for scalar shares and totals.

use std::path::Path;

use metro_atlas_classify::Classification;
use metro_atlas_stats::{RegionValue, TimeSeries};

/// Writes a longitudinal statistic as a two-column CSV (`year,value`).
pub fn write_time_series(
    path: &Path,
    series: &TimeSeries,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for point in &series.points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    log::info!("Wrote {} rows to {}", series.points.len(), path.display());
    Ok(())
}

/// Writes joined regions as a GeoJSON feature collection, each feature
/// carrying its aggregated value, bin number, and legend label.
///
/// `joined` and the classification's categories are parallel, both in
/// region-set order.
pub fn write_classified_regions(
    path: &Path,
    joined: &[RegionValue],
    classification: &Classification,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut features = Vec::with_capacity(joined.len());
    for (region, category) in joined.iter().zip(&classification.categories) {
        let mut properties = geojson::JsonObject::new();
        properties.insert("id".to_string(), region.id.clone().into());
        properties.insert("jobs".to_string(), region.value.into());
        if let Some(bin) = category {
            properties.insert("bin".to_string(), (*bin).into());
            if let Some(label) = classification.scheme.labels().get(bin) {
                properties.insert("binLabel".to_string(), label.clone().into());
            }
        }

        features.push(geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::from(&region.geometry)),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, collection.to_string())?;
    log::info!("Wrote {} features to {}", joined.len(), path.display());
    Ok(())
}

/// Writes a scalar statistic as a single text line.
pub fn write_scalar(path: &Path, value: f64) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, format!("{value}\n"))?;
    log::info!("Wrote {value} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use metro_atlas_classify::natural_breaks;
    use metro_atlas_stats::YearValue;

    use super::*;

    #[test]
    fn time_series_csv_has_year_and_value_columns() {
        let path = std::env::temp_dir().join("metro_atlas_cli_series.csv");
        let series = TimeSeries {
            points: vec![
                YearValue {
                    year: 1990,
                    value: 10.0,
                },
                YearValue {
                    year: 2000,
                    value: 12.5,
                },
            ],
        };

        write_time_series(&path, &series).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("year,value"));
        assert_eq!(lines.next(), Some("1990,10.0"));
        assert_eq!(lines.next(), Some("2000,12.5"));
    }

    #[test]
    fn classified_regions_round_trip_as_geojson() {
        let path = std::env::temp_dir().join("metro_atlas_cli_regions.geojson");
        let geometry: MultiPolygon<f64> = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ]]);
        let joined = vec![
            RegionValue {
                id: "a".to_string(),
                value: 150.0,
                geometry: geometry.clone(),
            },
            RegionValue {
                id: "b".to_string(),
                value: 9800.0,
                geometry,
            },
        ];
        let classification = natural_breaks(&[150.0, 9800.0], 1).unwrap();

        write_classified_regions(&path, &joined, &classification).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: geojson::GeoJson = contents.parse().unwrap();
        let geojson::GeoJson::FeatureCollection(collection) = parsed else {
            panic!("expected a feature collection");
        };
        assert_eq!(collection.features.len(), 2);

        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["id"], "a");
        assert_eq!(properties["bin"], 1);
        assert!(properties["binLabel"].as_str().unwrap().contains('-'));
    }

    #[test]
    fn scalar_is_a_single_line() {
        let path = std::env::temp_dir().join("metro_atlas_cli_scalar.txt");
        write_scalar(&path, 0.25).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0.25\n");
    }
}
