#![allow(dead_code)]

use chrono::NaiveDate;
use commuter_sir::prelude::*;
use std::path::PathBuf;

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
}

pub fn parameters() -> ParametersValues {
    ParametersValues {
        beta: 0.4,
        gamma: 0.5,
        exposure_distance: 3.0,
        initial_condition: InitialCondition {
            susceptible: 0.7,
            infected: 0.3,
            recovered: 0.0,
        },
        min_date: None,
        max_date: None,
        population_fraction: 1.0,
        seed: None,
        data_dir: PathBuf::new(),
        avg_trips: None,
    }
}

pub fn new_context(seed: u64, parameters: ParametersValues) -> Context {
    let mut context = Context::new();
    context.init_random(seed);
    context
        .set_global_property_value(Parameters, parameters)
        .unwrap();
    context
}

/// 10x10 zones laid out 100 units apart along the x axis.
pub fn zones(codes: &[&str], population: u64) -> Vec<ZoneInput> {
    codes
        .iter()
        .enumerate()
        .map(|(i, code)| {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64 * 100.0;
            ZoneInput {
                code: ZoneCode::from(*code),
                geometry: MultiPolygon::rectangle(Point::new(x, 0.0), Point::new(x + 10.0, 10.0)),
                population,
            }
        })
        .collect()
}

pub fn behavior(codes: &[&str], dates: &[NaiveDate], prob_stay_home: f64) -> BehaviorTable {
    let codes: Vec<ZoneCode> = codes.iter().map(|code| ZoneCode::from(*code)).collect();
    let mut table = BehaviorTable::new();
    table.fill(
        dates,
        &codes,
        ZoneBehavior {
            prob_stay_home,
            time_in_zone: 0.5,
        },
    );
    table
}

pub fn flows(tables: Vec<(NaiveDate, Vec<FlowRecord>)>) -> InMemoryFlows {
    let mut flows = InMemoryFlows::new();
    for (date, records) in tables {
        flows.insert_table(date, records);
    }
    flows
}

/// Zones A, B and C with flows between all of them, tables on March 2 and 5.
pub fn mixing_inputs(prob_stay_home: f64, population: u64) -> ModelInputs {
    let codes = ["A", "B", "C"];
    let records = vec![
        FlowRecord::new("A", "B", 0.6),
        FlowRecord::new("A", "C", 0.4),
        FlowRecord::new("B", "A", 1.0),
        FlowRecord::new("C", "A", 0.5),
        FlowRecord::new("C", "B", 0.5),
    ];
    ModelInputs {
        zones: zones(&codes, population),
        behavior: Box::new(behavior(&codes, &[date(2), date(5)], prob_stay_home)),
        flows: Box::new(flows(vec![
            (date(2), records.clone()),
            (date(5), records.into_iter().rev().collect()),
        ])),
    }
}

/// Everyone's status, indexed by person.
pub fn statuses(context: &Context) -> Vec<HealthStatus> {
    context
        .get_person_ids()
        .into_iter()
        .map(|person_id| context.get_person(person_id).unwrap().status())
        .collect()
}
