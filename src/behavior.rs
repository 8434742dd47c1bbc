//! Daily behavioural data per zone: how likely residents are to stay home,
//! and what share of their time they spend in the zone.
use chrono::NaiveDate;

use crate::hashing::{HashMap, HashMapExt};
use crate::zones::ZoneCode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBehavior {
    pub prob_stay_home: f64,
    pub time_in_zone: f64,
}

pub trait BehaviorSource {
    /// The record for `(date, zone)`, if there is one.
    fn behavior(&self, date: NaiveDate, zone: &ZoneCode) -> Option<ZoneBehavior>;
}

/// Behaviour records held in memory. The two measures are stored separately
/// since they usually come from different files; a record exists only where
/// both are known.
#[derive(Debug, Clone, Default)]
pub struct BehaviorTable {
    prob_stay_home: HashMap<(NaiveDate, ZoneCode), f64>,
    time_in_zone: HashMap<(NaiveDate, ZoneCode), f64>,
}

impl BehaviorTable {
    #[must_use]
    pub fn new() -> Self {
        BehaviorTable {
            prob_stay_home: HashMap::new(),
            time_in_zone: HashMap::new(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate, zone: ZoneCode, behavior: ZoneBehavior) {
        self.set_prob_stay_home(date, zone.clone(), behavior.prob_stay_home);
        self.set_time_in_zone(date, zone, behavior.time_in_zone);
    }

    pub fn set_prob_stay_home(&mut self, date: NaiveDate, zone: ZoneCode, value: f64) {
        self.prob_stay_home.insert((date, zone), value);
    }

    pub fn set_time_in_zone(&mut self, date: NaiveDate, zone: ZoneCode, value: f64) {
        self.time_in_zone.insert((date, zone), value);
    }

    /// Stores the same behaviour for every `(date, zone)` pair given.
    pub fn fill(&mut self, dates: &[NaiveDate], zones: &[ZoneCode], behavior: ZoneBehavior) {
        for date in dates {
            for zone in zones {
                self.insert(*date, zone.clone(), behavior);
            }
        }
    }
}

impl BehaviorSource for BehaviorTable {
    fn behavior(&self, date: NaiveDate, zone: &ZoneCode) -> Option<ZoneBehavior> {
        let key = (date, zone.clone());
        Some(ZoneBehavior {
            prob_stay_home: *self.prob_stay_home.get(&key)?,
            time_in_zone: *self.time_in_zone.get(&key)?,
        })
    }
}
