//! Origin-destination flow tables and destination sampling.
//!
//! Flow data comes in dated tables. The table dated `d` is active from `d`
//! until the next dated table; the last one stays active to the end of the
//! run. Switching tables replaces the whole table at once.
use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::Deserialize;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;
use crate::hashing::{HashMap, HashMapExt};
use crate::random::{ContextRandomExt, ModelRng};
use crate::zones::ZoneCode;

/// One row of a flow table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowRecord {
    pub origin: ZoneCode,
    pub destination: ZoneCode,
    #[serde(rename = "flow_ratio")]
    pub weight: f64,
}

impl FlowRecord {
    pub fn new(origin: impl Into<ZoneCode>, destination: impl Into<ZoneCode>, weight: f64) -> Self {
        FlowRecord {
            origin: origin.into(),
            destination: destination.into(),
            weight,
        }
    }
}

/// Where dated flow tables come from.
pub trait FlowSource {
    /// Every date that has a flow table, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be listed.
    fn available_dates(&self) -> Result<Vec<NaiveDate>, ModelError>;

    /// The rows of the table dated `date`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if there is no such table, or an
    /// I/O or parse error if it cannot be read.
    fn load(&self, date: NaiveDate) -> Result<Vec<FlowRecord>, ModelError>;
}

/// Flow tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFlows {
    tables: BTreeMap<NaiveDate, Vec<FlowRecord>>,
}

impl InMemoryFlows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table. A date without any rows is still an available date.
    pub fn insert_table(&mut self, date: NaiveDate, records: Vec<FlowRecord>) -> &mut Self {
        self.tables.entry(date).or_default().extend(records);
        self
    }
}

impl FlowSource for InMemoryFlows {
    fn available_dates(&self) -> Result<Vec<NaiveDate>, ModelError> {
        Ok(self.tables.keys().copied().collect())
    }

    fn load(&self, date: NaiveDate) -> Result<Vec<FlowRecord>, ModelError> {
        self.tables
            .get(&date)
            .cloned()
            .ok_or_else(|| ModelError::DataUnavailable(format!("no flow table for {date}")))
    }
}

#[derive(Debug, Clone)]
struct Outbound {
    destinations: Vec<ZoneCode>,
    weights: Vec<f64>,
    // `None` when every weight is zero.
    sampler: Option<WeightedIndex<f64>>,
}

#[derive(Debug, Clone)]
pub struct FlowTable {
    date: NaiveDate,
    outbound: HashMap<ZoneCode, Outbound>,
}

impl FlowTable {
    /// Builds a table from raw rows. Self-pairs are dropped and repeated
    /// pairs are summed.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` for a negative or non-finite weight.
    pub fn from_records(date: NaiveDate, records: &[FlowRecord]) -> Result<FlowTable, ModelError> {
        let mut grouped: HashMap<ZoneCode, (Vec<ZoneCode>, Vec<f64>)> = HashMap::new();
        for record in records {
            if !(record.weight.is_finite() && record.weight >= 0.0) {
                return Err(ModelError::InvariantViolation(format!(
                    "flow weight from {} to {} on {date} is {}",
                    record.origin, record.destination, record.weight
                )));
            }
            if record.origin == record.destination {
                continue;
            }
            let (destinations, weights) = grouped.entry(record.origin.clone()).or_default();
            match destinations.iter().position(|d| *d == record.destination) {
                Some(i) => weights[i] += record.weight,
                None => {
                    destinations.push(record.destination.clone());
                    weights.push(record.weight);
                }
            }
        }

        let mut outbound = HashMap::with_capacity(grouped.len());
        for (origin, (destinations, weights)) in grouped {
            let sampler = if weights.iter().sum::<f64>() > 0.0 {
                Some(WeightedIndex::new(&weights).map_err(|error| {
                    ModelError::InvariantViolation(format!(
                        "flow weights from {origin} on {date}: {error}"
                    ))
                })?)
            } else {
                None
            };
            outbound.insert(
                origin,
                Outbound {
                    destinations,
                    weights,
                    sampler,
                },
            );
        }
        Ok(FlowTable { date, outbound })
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Outbound `(destination, weight)` pairs of `origin`, in input order.
    #[must_use]
    pub fn outbound_weights(&self, origin: &ZoneCode) -> Vec<(ZoneCode, f64)> {
        self.outbound.get(origin).map_or_else(Vec::new, |outbound| {
            outbound
                .destinations
                .iter()
                .cloned()
                .zip(outbound.weights.iter().copied())
                .collect()
        })
    }

    /// Draws a destination in proportion to the outbound weights of `origin`.
    /// An origin with no outbound weight keeps people where they are.
    pub fn sample_destination<R: Rng + ?Sized>(&self, origin: &ZoneCode, rng: &mut R) -> ZoneCode {
        match self.outbound.get(origin) {
            Some(Outbound {
                destinations,
                sampler: Some(sampler),
                ..
            }) => destinations[sampler.sample(rng)].clone(),
            _ => origin.clone(),
        }
    }
}

struct FlowsData {
    source: Option<Box<dyn FlowSource>>,
    dates: Vec<NaiveDate>,
    current: Option<FlowTable>,
}

define_data_plugin!(
    FlowsPlugin,
    FlowsData,
    FlowsData {
        source: None,
        dates: Vec::new(),
        current: None,
    }
);

pub trait ContextFlowsExt {
    /// Installs the flow source and returns its dates within
    /// `[min_date, max_date]`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot list its dates.
    fn init_flows(
        &mut self,
        source: Box<dyn FlowSource>,
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<Vec<NaiveDate>, ModelError>;

    /// Makes the table whose window covers `date` active, loading it if it is
    /// not already.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no table covers `date` or it
    /// cannot be loaded.
    fn advance_flows_to(&mut self, date: NaiveDate) -> Result<(), ModelError>;

    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no table has been loaded.
    fn current_flow_table(&self) -> Result<&FlowTable, ModelError>;

    /// Samples a destination for someone leaving `origin`, using the active table.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no table has been loaded.
    fn sample_destination(&self, origin: &ZoneCode) -> Result<ZoneCode, ModelError>;
}

impl ContextFlowsExt for Context {
    fn init_flows(
        &mut self,
        source: Box<dyn FlowSource>,
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<Vec<NaiveDate>, ModelError> {
        let mut dates: Vec<NaiveDate> = source
            .available_dates()?
            .into_iter()
            .filter(|date| min_date.map_or(true, |min| *date >= min))
            .filter(|date| max_date.map_or(true, |max| *date <= max))
            .collect();
        dates.sort_unstable();
        dates.dedup();
        debug!("found {} flow tables", dates.len());

        let data_container = self.get_data_mut(FlowsPlugin);
        data_container.source = Some(source);
        data_container.dates.clone_from(&dates);
        data_container.current = None;
        Ok(dates)
    }

    fn advance_flows_to(&mut self, date: NaiveDate) -> Result<(), ModelError> {
        let data_container = self.get_data_mut(FlowsPlugin);
        let covering = data_container.dates.partition_point(|d| *d <= date);
        let Some(&window_date) = covering
            .checked_sub(1)
            .and_then(|i| data_container.dates.get(i))
        else {
            return Err(ModelError::DataUnavailable(format!(
                "no flow table covers {date}"
            )));
        };
        if data_container
            .current
            .as_ref()
            .is_some_and(|table| table.date() == window_date)
        {
            return Ok(());
        }

        let source = data_container
            .source
            .as_ref()
            .ok_or_else(|| ModelError::DataUnavailable("no flow source".to_string()))?;
        let records = source.load(window_date)?;
        let table = FlowTable::from_records(window_date, &records)?;
        debug!(
            "loaded flow table {window_date} ({} rows) for {date}",
            records.len()
        );
        data_container.current = Some(table);
        Ok(())
    }

    fn current_flow_table(&self) -> Result<&FlowTable, ModelError> {
        self.get_data(FlowsPlugin)
            .and_then(|data| data.current.as_ref())
            .ok_or_else(|| ModelError::DataUnavailable("no flow table is loaded".to_string()))
    }

    fn sample_destination(&self, origin: &ZoneCode) -> Result<ZoneCode, ModelError> {
        let table = self.current_flow_table()?;
        Ok(self.sample(ModelRng, |rng| table.sample_destination(origin, rng)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn code(s: &str) -> ZoneCode {
        ZoneCode::from(s)
    }

    #[test]
    fn drops_self_pairs_and_sums_duplicates() {
        let table = FlowTable::from_records(
            date(2),
            &[
                FlowRecord::new("A", "A", 5.0),
                FlowRecord::new("A", "B", 1.0),
                FlowRecord::new("A", "C", 2.0),
                FlowRecord::new("A", "B", 0.5),
            ],
        )
        .unwrap();
        assert_eq!(
            table.outbound_weights(&code("A")),
            vec![(code("B"), 1.5), (code("C"), 2.0)]
        );
        assert!(table.outbound_weights(&code("B")).is_empty());
    }

    #[test]
    fn rejects_bad_weights() {
        for weight in [-1.0, f64::NAN, f64::INFINITY] {
            let result = FlowTable::from_records(date(2), &[FlowRecord::new("A", "B", weight)]);
            assert!(matches!(result, Err(ModelError::InvariantViolation(_))));
        }
    }

    #[test]
    fn zero_weights_return_origin() {
        let table = FlowTable::from_records(
            date(2),
            &[FlowRecord::new("A", "B", 0.0), FlowRecord::new("A", "C", 0.0)],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(table.sample_destination(&code("A"), &mut rng), code("A"));
            // No outbound row at all behaves the same way.
            assert_eq!(table.sample_destination(&code("Z"), &mut rng), code("Z"));
        }
    }

    #[test]
    fn samples_in_proportion_to_weights() {
        let table = FlowTable::from_records(
            date(2),
            &[FlowRecord::new("A", "B", 1.0), FlowRecord::new("A", "C", 3.0)],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let n = 4000;
        let to_c = (0..n)
            .filter(|_| table.sample_destination(&code("A"), &mut rng) == code("C"))
            .count();
        assert!((2800..3200).contains(&to_c));
    }

    fn flows() -> InMemoryFlows {
        let mut flows = InMemoryFlows::new();
        flows
            .insert_table(date(9), vec![FlowRecord::new("A", "C", 1.0)])
            .insert_table(date(2), vec![FlowRecord::new("A", "B", 1.0)])
            .insert_table(date(30), vec![]);
        flows
    }

    #[test]
    fn init_filters_and_sorts_dates() {
        let mut context = Context::new();
        let dates = context
            .init_flows(Box::new(flows()), None, Some(date(20)))
            .unwrap();
        assert_eq!(dates, vec![date(2), date(9)]);
    }

    #[test]
    fn advance_selects_covering_window() {
        let mut context = Context::new();
        context.init_random(42);
        context.init_flows(Box::new(flows()), None, None).unwrap();
        assert!(matches!(
            context.current_flow_table(),
            Err(ModelError::DataUnavailable(_))
        ));

        context.advance_flows_to(date(4)).unwrap();
        assert_eq!(context.current_flow_table().unwrap().date(), date(2));
        assert_eq!(context.sample_destination(&code("A")).unwrap(), code("B"));

        context.advance_flows_to(date(9)).unwrap();
        assert_eq!(context.current_flow_table().unwrap().date(), date(9));
        assert_eq!(context.sample_destination(&code("A")).unwrap(), code("C"));
    }

    #[test]
    fn advance_before_first_table_fails() {
        let mut context = Context::new();
        context.init_flows(Box::new(flows()), None, None).unwrap();
        let result = context.advance_flows_to(date(1));
        assert!(matches!(result, Err(ModelError::DataUnavailable(_))));
    }

    #[test]
    fn in_memory_missing_table() {
        let result = flows().load(date(3));
        assert!(matches!(result, Err(ModelError::DataUnavailable(_))));
    }
}
