//! Reads model inputs from a data directory.
//!
//! The directory layout is:
//!
//! ```text
//! tracts.geojson                  zone geometry, `properties.tract` is the code
//! agents_tract.csv                tract,n_agents
//! agents_home.csv                 date,tract,prob_stay_at_home
//! agents_percentage_home.csv      date,tract,percentage_time_home
//! flow/agents_flow_YYYY-MM-DD.csv origin,destination,flow_ratio
//! ```
//!
//! Coordinates must already be in one projected reference system.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::behavior::BehaviorTable;
use crate::error::ModelError;
use crate::flows::{FlowRecord, FlowSource};
use crate::geometry::{MultiPolygon, Point, Polygon};
use crate::hashing::{HashMap, HashMapExt};
use crate::model::{ModelInputs, ZoneInput};
use crate::zones::ZoneCode;

pub const ZONES_FILE: &str = "tracts.geojson";
pub const POPULATION_FILE: &str = "agents_tract.csv";
pub const STAY_HOME_FILE: &str = "agents_home.csv";
pub const TIME_HOME_FILE: &str = "agents_percentage_home.csv";
pub const FLOW_DIR: &str = "flow";

const FLOW_FILE_PREFIX: &str = "agents_flow_";
const FLOW_FILE_SUFFIX: &str = ".csv";

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: GeoJsonGeometry,
}

type Ring = Vec<Vec<f64>>;

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeoJsonGeometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

#[derive(Deserialize)]
struct PopulationRow {
    tract: ZoneCode,
    n_agents: f64,
}

#[derive(Deserialize)]
struct StayHomeRow {
    date: NaiveDate,
    tract: ZoneCode,
    prob_stay_at_home: f64,
}

#[derive(Deserialize)]
struct TimeHomeRow {
    date: NaiveDate,
    tract: ZoneCode,
    percentage_time_home: f64,
}

fn parse_ring(ring: Ring) -> Result<Vec<Point>, ModelError> {
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Point::new(*x, *y)),
            _ => Err(ModelError::ParseError(format!(
                "position {position:?} has fewer than two coordinates"
            ))),
        })
        .collect()
}

fn parse_polygon(rings: Vec<Ring>) -> Result<Polygon, ModelError> {
    let mut rings = rings.into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| ModelError::ParseError("polygon has no rings".to_string()))?;
    let holes = rings.map(parse_ring).collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(parse_ring(exterior)?, holes))
}

fn parse_geometry(geometry: GeoJsonGeometry) -> Result<MultiPolygon, ModelError> {
    match geometry {
        GeoJsonGeometry::Polygon(rings) => Ok(parse_polygon(rings)?.into()),
        GeoJsonGeometry::MultiPolygon(polygons) => Ok(MultiPolygon(
            polygons
                .into_iter()
                .map(parse_polygon)
                .collect::<Result<_, _>>()?,
        )),
    }
}

fn zone_code(properties: Option<&Map<String, Value>>) -> Result<ZoneCode, ModelError> {
    match properties.and_then(|properties| properties.get("tract")) {
        Some(Value::String(code)) => Ok(ZoneCode::from(code.as_str())),
        Some(Value::Number(code)) => Ok(ZoneCode::from(code.to_string())),
        other => Err(ModelError::ParseError(format!(
            "feature has no usable tract property: {other:?}"
        ))),
    }
}

/// Reads zone codes and geometry, in file order.
///
/// # Errors
///
/// Returns an error if the file is missing or is not a FeatureCollection of
/// `Polygon`/`MultiPolygon` features with a `tract` property.
pub fn read_zone_geometry(path: &Path) -> Result<Vec<(ZoneCode, MultiPolygon)>, ModelError> {
    let collection: FeatureCollection = serde_json::from_str(&fs::read_to_string(path)?)?;
    collection
        .features
        .into_iter()
        .map(|feature| {
            Ok((
                zone_code(feature.properties.as_ref())?,
                parse_geometry(feature.geometry)?,
            ))
        })
        .collect()
}

/// Reads resident counts keyed by zone.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or
/// `ModelError::InvariantViolation` for a negative or non-finite count.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn read_populations(path: &Path) -> Result<HashMap<ZoneCode, u64>, ModelError> {
    let mut populations = HashMap::new();
    for row in csv::Reader::from_path(path)?.deserialize() {
        let row: PopulationRow = row?;
        if !row.n_agents.is_finite() || row.n_agents < 0.0 {
            return Err(ModelError::InvariantViolation(format!(
                "zone {} has invalid population {}",
                row.tract, row.n_agents
            )));
        }
        populations.insert(row.tract, row.n_agents.floor() as u64);
    }
    Ok(populations)
}

/// Joins geometry with population counts.
///
/// # Errors
///
/// Returns `ModelError::DataUnavailable` if a zone has no population row.
pub fn load_zones(data_dir: &Path) -> Result<Vec<ZoneInput>, ModelError> {
    let populations = read_populations(&data_dir.join(POPULATION_FILE))?;
    read_zone_geometry(&data_dir.join(ZONES_FILE))?
        .into_iter()
        .map(|(code, geometry)| {
            let population = *populations.get(&code).ok_or_else(|| {
                ModelError::DataUnavailable(format!("no population for zone {code}"))
            })?;
            Ok(ZoneInput {
                code,
                geometry,
                population,
            })
        })
        .collect()
}

/// Reads the per-day stay-home probabilities and home-time percentages.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed.
pub fn load_behavior(data_dir: &Path) -> Result<BehaviorTable, ModelError> {
    let mut table = BehaviorTable::new();
    for row in csv::Reader::from_path(data_dir.join(STAY_HOME_FILE))?.deserialize() {
        let row: StayHomeRow = row?;
        table.set_prob_stay_home(row.date, row.tract, row.prob_stay_at_home);
    }
    for row in csv::Reader::from_path(data_dir.join(TIME_HOME_FILE))?.deserialize() {
        let row: TimeHomeRow = row?;
        table.set_time_in_zone(row.date, row.tract, row.percentage_time_home / 100.0);
    }
    Ok(table)
}

fn flow_file_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(FLOW_FILE_PREFIX)?
        .strip_suffix(FLOW_FILE_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Flow tables stored one file per date.
#[derive(Debug, Clone)]
pub struct FlowDirectory {
    files: BTreeMap<NaiveDate, PathBuf>,
}

impl FlowDirectory {
    /// Indexes `agents_flow_YYYY-MM-DD.csv` files in `dir`. Other files are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn open(dir: &Path) -> Result<FlowDirectory, ModelError> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let date = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(flow_file_date);
            if let Some(date) = date {
                files.insert(date, path);
            }
        }
        debug!("found {} flow files in {}", files.len(), dir.display());
        Ok(FlowDirectory { files })
    }
}

impl FlowSource for FlowDirectory {
    fn available_dates(&self) -> Result<Vec<NaiveDate>, ModelError> {
        Ok(self.files.keys().copied().collect())
    }

    fn load(&self, date: NaiveDate) -> Result<Vec<FlowRecord>, ModelError> {
        let path = self.files.get(&date).ok_or_else(|| {
            ModelError::DataUnavailable(format!("no flow file for {date}"))
        })?;
        csv::Reader::from_path(path)?
            .deserialize()
            .map(|row| row.map_err(ModelError::from))
            .collect()
    }
}

/// Loads everything under `data_dir`.
///
/// # Errors
///
/// Returns the first error from any of the loaders.
pub fn load_inputs(data_dir: &Path) -> Result<ModelInputs, ModelError> {
    let zones = load_zones(data_dir)?;
    let behavior = load_behavior(data_dir)?;
    let flows = FlowDirectory::open(&data_dir.join(FLOW_DIR))?;
    info!(
        "loaded {} zones and {} flow dates from {}",
        zones.len(),
        flows.files.len(),
        data_dir.display()
    );
    Ok(ModelInputs {
        zones,
        behavior: Box::new(behavior),
        flows: Box::new(flows),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorSource;
    use approx::assert_relative_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"tract": "1001"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"tract": 1002},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20, 0, 5], [30, 0, 5], [30, 10, 5], [20, 10, 5], [20, 0, 5]]],
                        [[[40, 0], [50, 0], [50, 10], [40, 10], [40, 0]]]
                    ]
                }
            }
        ]
    }"#;

    fn write(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    #[test]
    fn reads_geometry_with_string_and_number_codes() {
        let dir = tempdir().unwrap();
        write(dir.path(), ZONES_FILE, GEOJSON);
        let zones = read_zone_geometry(&dir.path().join(ZONES_FILE)).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].0, ZoneCode::from("1001"));
        assert_eq!(zones[1].0, ZoneCode::from("1002"));
        assert_eq!(zones[1].1 .0.len(), 2);
        assert_relative_eq!(zones[0].1.area(), 100.0);
        assert_relative_eq!(zones[1].1.area(), 200.0);
    }

    #[test]
    fn rejects_point_geometry() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            ZONES_FILE,
            r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
                "properties": {"tract": "1"},
                "geometry": {"type": "Point", "coordinates": [0, 0]}}]}"#,
        );
        let result = read_zone_geometry(&dir.path().join(ZONES_FILE));
        assert!(matches!(result, Err(ModelError::JsonError(_))));
    }

    #[test]
    fn zone_without_population_is_unavailable() {
        let dir = tempdir().unwrap();
        write(dir.path(), ZONES_FILE, GEOJSON);
        write(dir.path(), POPULATION_FILE, "tract,n_agents\n1001,40\n");
        let result = load_zones(dir.path());
        assert!(matches!(result, Err(ModelError::DataUnavailable(_))));
    }

    #[test]
    fn joins_population() {
        let dir = tempdir().unwrap();
        write(dir.path(), ZONES_FILE, GEOJSON);
        write(
            dir.path(),
            POPULATION_FILE,
            "tract,n_agents\n1001,40\n1002,12.7\n9999,5\n",
        );
        let zones = load_zones(dir.path()).unwrap();
        assert_eq!(zones[0].population, 40);
        assert_eq!(zones[1].population, 12);
    }

    #[test]
    fn behaviour_percentages_are_scaled() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            STAY_HOME_FILE,
            "date,tract,prob_stay_at_home\n2020-03-02,1001,0.25\n2020-03-02,1002,0.5\n",
        );
        write(
            dir.path(),
            TIME_HOME_FILE,
            "date,tract,percentage_time_home\n2020-03-02,1001,60\n",
        );
        let table = load_behavior(dir.path()).unwrap();
        let behavior = table.behavior(date(2), &ZoneCode::from("1001")).unwrap();
        assert_relative_eq!(behavior.prob_stay_home, 0.25);
        assert_relative_eq!(behavior.time_in_zone, 0.6);
        // Only one of the two measures is present for 1002.
        assert!(table.behavior(date(2), &ZoneCode::from("1002")).is_none());
    }

    #[test]
    fn flow_directory() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "agents_flow_2020-03-09.csv",
            "origin,destination,flow_ratio\n1001,1002,0.5\n",
        );
        write(
            dir.path(),
            "agents_flow_2020-03-02.csv",
            "origin,destination,flow_ratio\n1001,1002,0.1\n1002,1001,0.3\n",
        );
        write(dir.path(), "notes.txt", "ignored");
        let flows = FlowDirectory::open(dir.path()).unwrap();
        assert_eq!(flows.available_dates().unwrap(), vec![date(2), date(9)]);
        let records = flows.load(date(2)).unwrap();
        assert_eq!(
            records,
            vec![
                FlowRecord::new("1001", "1002", 0.1),
                FlowRecord::new("1002", "1001", 0.3)
            ]
        );
        assert!(matches!(
            flows.load(date(3)),
            Err(ModelError::DataUnavailable(_))
        ));
    }

    #[test]
    fn flow_file_names() {
        assert_eq!(flow_file_date("agents_flow_2020-03-02.csv"), Some(date(2)));
        assert_eq!(flow_file_date("agents_flow_latest.csv"), None);
        assert_eq!(flow_file_date("flows_2020-03-02.csv"), None);
    }
}
