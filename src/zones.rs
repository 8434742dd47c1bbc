//! Zones (census tracts): geometry, population, daily behaviour and residents.
use std::fmt::{self, Display};

use chrono::NaiveDate;
use log::{debug, trace};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorSource;
use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;
use crate::geometry::{MultiPolygon, Point};
use crate::hashing::{HashMap, HashMapExt};
use crate::people::PersonId;
use crate::random::{ContextRandomExt, ModelRng};

/// The stable code a zone is known by in the input data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneCode(pub String);

impl Display for ZoneCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneCode {
    fn from(code: &str) -> Self {
        ZoneCode(code.to_string())
    }
}

impl From<String> for ZoneCode {
    fn from(code: String) -> Self {
        ZoneCode(code)
    }
}

/// Index of a registered zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub usize);

impl Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "zone {}", self.0)
    }
}

fn check_unit_interval(name: &str, zone: &ZoneCode, value: f64) -> Result<(), ModelError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::InvariantViolation(format!(
            "{name} of zone {zone} must be in [0, 1], got {value}"
        )))
    }
}

/// A census tract with its residents and the behaviour for the current day.
///
/// The zone's outbound trip distribution is not stored here. It lives in the
/// active [`FlowTable`](crate::flows::FlowTable), keyed by zone code: see
/// [`FlowTable::outbound_weights`](crate::flows::FlowTable::outbound_weights)
/// and `ContextFlowsExt::current_flow_table`.
#[derive(Debug, Clone)]
pub struct Zone {
    code: ZoneCode,
    geometry: MultiPolygon,
    population: u64,
    prob_stay_home: f64,
    time_in_zone: f64,
    refreshed_for: Option<NaiveDate>,
    residents: Vec<PersonId>,
    stayed_home: u32,
}

impl Zone {
    #[must_use]
    pub fn new(code: ZoneCode, geometry: MultiPolygon, population: u64) -> Zone {
        Zone {
            code,
            geometry,
            population,
            prob_stay_home: 0.0,
            time_in_zone: 0.0,
            refreshed_for: None,
            residents: Vec::new(),
            stayed_home: 0,
        }
    }

    #[must_use]
    pub fn code(&self) -> &ZoneCode {
        &self.code
    }

    #[must_use]
    pub fn geometry(&self) -> &MultiPolygon {
        &self.geometry
    }

    /// Resident population in the input data (before sampling).
    #[must_use]
    pub fn population(&self) -> u64 {
        self.population
    }

    #[must_use]
    pub fn prob_stay_home(&self) -> f64 {
        self.prob_stay_home
    }

    #[must_use]
    pub fn time_in_zone(&self) -> f64 {
        self.time_in_zone
    }

    /// The date whose behaviour is currently loaded.
    #[must_use]
    pub fn refreshed_for(&self) -> Option<NaiveDate> {
        self.refreshed_for
    }

    /// Simulated residents, in creation order.
    #[must_use]
    pub fn residents(&self) -> &[PersonId] {
        &self.residents
    }

    /// Residents who decided to stay home today.
    #[must_use]
    pub fn stayed_home(&self) -> u32 {
        self.stayed_home
    }

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` unless `value` is in `[0, 1]`.
    pub fn set_prob_stay_home(&mut self, value: f64) -> Result<(), ModelError> {
        check_unit_interval("stay-home probability", &self.code, value)?;
        self.prob_stay_home = value;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` unless `value` is in `[0, 1]`.
    pub fn set_time_in_zone(&mut self, value: f64) -> Result<(), ModelError> {
        check_unit_interval("in-zone time fraction", &self.code, value)?;
        self.time_in_zone = value;
        Ok(())
    }

    /// Loads this zone's behaviour for `date`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if `source` has no record for
    /// `(date, zone)`, or `ModelError::InvariantViolation` if the record is
    /// out of range.
    pub fn refresh_for_date(
        &mut self,
        date: NaiveDate,
        source: &dyn BehaviorSource,
    ) -> Result<(), ModelError> {
        let behavior = source.behavior(date, &self.code).ok_or_else(|| {
            ModelError::DataUnavailable(format!(
                "no behaviour data for zone {} on {date}",
                self.code
            ))
        })?;
        self.set_prob_stay_home(behavior.prob_stay_home)?;
        self.set_time_in_zone(behavior.time_in_zone)?;
        self.refreshed_for = Some(date);
        Ok(())
    }

    pub fn on_day_start(&mut self) {
        self.stayed_home = 0;
    }

    pub fn record_stay_home(&mut self) {
        self.stayed_home += 1;
    }

    pub fn sample_interior_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        self.geometry.sample_interior_point(rng)
    }
}

struct ZonesData {
    zones: Vec<Zone>,
    by_code: HashMap<ZoneCode, ZoneId>,
    behavior: Option<Box<dyn BehaviorSource>>,
}

define_data_plugin!(
    ZonesPlugin,
    ZonesData,
    ZonesData {
        zones: Vec::new(),
        by_code: HashMap::new(),
        behavior: None,
    }
);

fn unknown_zone(zone_id: ZoneId) -> ModelError {
    ModelError::InvariantViolation(format!("{zone_id} is not registered"))
}

pub trait ContextZonesExt {
    /// Registers a zone. Zones are numbered in registration order.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the code is already registered.
    fn add_zone(
        &mut self,
        code: ZoneCode,
        geometry: MultiPolygon,
        population: u64,
    ) -> Result<ZoneId, ModelError>;

    fn set_behavior_source(&mut self, source: Box<dyn BehaviorSource>);

    fn get_zone_count(&self) -> usize;

    fn get_zone_ids(&self) -> Vec<ZoneId>;

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered.
    fn get_zone(&self, zone_id: ZoneId) -> Result<&Zone, ModelError>;

    /// Resolves a zone code.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if no zone has this code.
    fn get_zone_id(&self, code: &ZoneCode) -> Result<ZoneId, ModelError>;

    /// Loads every zone's behaviour for `date`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if any zone lacks a record, or
    /// there is no behaviour source.
    fn refresh_zones_for_date(&mut self, date: NaiveDate) -> Result<(), ModelError>;

    /// Resets every zone's daily stay-home counter.
    fn start_zone_day(&mut self);

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered.
    fn record_stay_home(&mut self, zone_id: ZoneId) -> Result<(), ModelError>;

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered.
    fn add_resident(&mut self, zone_id: ZoneId, person_id: PersonId) -> Result<(), ModelError>;

    /// Samples a uniform point inside the zone with the model rng.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered.
    fn sample_point_in_zone(&self, zone_id: ZoneId) -> Result<Point, ModelError>;
}

impl ContextZonesExt for Context {
    fn add_zone(
        &mut self,
        code: ZoneCode,
        geometry: MultiPolygon,
        population: u64,
    ) -> Result<ZoneId, ModelError> {
        let data_container = self.get_data_mut(ZonesPlugin);
        if data_container.by_code.contains_key(&code) {
            return Err(ModelError::InvariantViolation(format!(
                "zone {code} is registered twice"
            )));
        }
        let zone_id = ZoneId(data_container.zones.len());
        trace!("registering zone {code} as {zone_id}");
        data_container.by_code.insert(code.clone(), zone_id);
        data_container
            .zones
            .push(Zone::new(code, geometry, population));
        Ok(zone_id)
    }

    fn set_behavior_source(&mut self, source: Box<dyn BehaviorSource>) {
        self.get_data_mut(ZonesPlugin).behavior = Some(source);
    }

    fn get_zone_count(&self) -> usize {
        self.get_data(ZonesPlugin).map_or(0, |data| data.zones.len())
    }

    fn get_zone_ids(&self) -> Vec<ZoneId> {
        (0..self.get_zone_count()).map(ZoneId).collect()
    }

    fn get_zone(&self, zone_id: ZoneId) -> Result<&Zone, ModelError> {
        self.get_data(ZonesPlugin)
            .and_then(|data| data.zones.get(zone_id.0))
            .ok_or_else(|| unknown_zone(zone_id))
    }

    fn get_zone_id(&self, code: &ZoneCode) -> Result<ZoneId, ModelError> {
        self.get_data(ZonesPlugin)
            .and_then(|data| data.by_code.get(code).copied())
            .ok_or_else(|| {
                ModelError::InvariantViolation(format!("zone code {code} is not registered"))
            })
    }

    fn refresh_zones_for_date(&mut self, date: NaiveDate) -> Result<(), ModelError> {
        let ZonesData {
            zones, behavior, ..
        } = self.get_data_mut(ZonesPlugin);
        let source = behavior
            .as_deref()
            .ok_or_else(|| ModelError::DataUnavailable("no behaviour source".to_string()))?;
        for zone in zones.iter_mut() {
            zone.refresh_for_date(date, source)?;
        }
        debug!("refreshed behaviour of {} zones for {date}", zones.len());
        Ok(())
    }

    fn start_zone_day(&mut self) {
        for zone in &mut self.get_data_mut(ZonesPlugin).zones {
            zone.on_day_start();
        }
    }

    fn record_stay_home(&mut self, zone_id: ZoneId) -> Result<(), ModelError> {
        self.get_data_mut(ZonesPlugin)
            .zones
            .get_mut(zone_id.0)
            .ok_or_else(|| unknown_zone(zone_id))?
            .record_stay_home();
        Ok(())
    }

    fn add_resident(&mut self, zone_id: ZoneId, person_id: PersonId) -> Result<(), ModelError> {
        self.get_data_mut(ZonesPlugin)
            .zones
            .get_mut(zone_id.0)
            .ok_or_else(|| unknown_zone(zone_id))?
            .residents
            .push(person_id);
        Ok(())
    }

    fn sample_point_in_zone(&self, zone_id: ZoneId) -> Result<Point, ModelError> {
        let zone = self.get_zone(zone_id)?;
        Ok(self.sample(ModelRng, |rng| zone.sample_interior_point(rng)))
    }
}
