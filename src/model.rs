//! Model setup and the step protocol.
//!
//! Step `k` runs at time `k / 3` days as two plans. The `Normal` plan moves
//! and updates everyone:
//!
//! 1. at Morning, zones reset their daily counters and decisions are cleared;
//! 2. everyone, in a fresh random order, does their phase behaviour and then
//!    their health update;
//! 3. at Evening, everyone, in another fresh order, returns home if they went
//!    out and, if susceptible, gets one more exposure check at home. People
//!    later in that order may still be out when an earlier person is checked.
//!
//! The `Last` plan tallies the step, advances the clock (reloading flows and
//! zone behaviour when a new flow window starts) and schedules the next step
//! unless the run is complete.
use log::info;

use crate::behavior::BehaviorSource;
use crate::calendar::{ClockEvent, ContextCalendarExt, Phase};
use crate::collector::ContextCollectorExt;
use crate::context::Context;
use crate::error::ModelError;
use crate::flows::{ContextFlowsExt, FlowSource};
use crate::geometry::{MultiPolygon, Point};
use crate::mobility::ContextMobilityExt;
use crate::parameters::{ContextParametersExt, ParametersValues};
use crate::people::{ContextPeopleExt, HealthStatus};
use crate::plan::ExecutionPhase;
use crate::random::{ContextRandomExt, ModelRng};
use crate::spatial::GridIndex;
use crate::transmission::ContextTransmissionExt;
use crate::zones::{ContextZonesExt, ZoneCode};

/// A zone as supplied by the input data.
#[derive(Debug, Clone)]
pub struct ZoneInput {
    pub code: ZoneCode,
    pub geometry: MultiPolygon,
    pub population: u64,
}

/// Everything the model needs besides `Parameters`.
pub struct ModelInputs {
    pub zones: Vec<ZoneInput>,
    pub behavior: Box<dyn BehaviorSource>,
    pub flows: Box<dyn FlowSource>,
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sampled_population(population: u64, fraction: f64) -> usize {
    (population as f64 * fraction).floor() as usize
}

fn init_population(context: &mut Context, parameters: &ParametersValues) -> Result<(), ModelError> {
    let weights = parameters.initial_condition.weights();
    for zone_id in context.get_zone_ids() {
        let n = sampled_population(
            context.get_zone(zone_id)?.population(),
            parameters.population_fraction,
        );
        let positions = (0..n)
            .map(|_| context.sample_point_in_zone(zone_id))
            .collect::<Result<Vec<Point>, _>>()?;
        let statuses = (0..n)
            .map(|_| {
                context
                    .sample_weighted(ModelRng, &weights)
                    .map(|i| HealthStatus::ALL[i])
            })
            .collect::<Result<Vec<HealthStatus>, _>>()?;
        for (position, status) in positions.into_iter().zip(statuses) {
            context.add_person(zone_id, position, status)?;
        }
    }
    Ok(())
}

/// Builds zones, flows, the clock and the population, and schedules the
/// first step. `Parameters` and the random seed must already be set.
///
/// # Errors
///
/// Returns `ModelError::ConfigError` if parameters are missing,
/// `ModelError::DataUnavailable` if flow or behaviour data is missing for the
/// start date, or `ModelError::InvariantViolation` for invalid input data.
pub fn init(context: &mut Context, inputs: ModelInputs) -> Result<(), ModelError> {
    let parameters = context.get_parameters()?.clone();

    for zone in inputs.zones {
        context.add_zone(zone.code, zone.geometry, zone.population)?;
    }
    context.set_behavior_source(inputs.behavior);
    let flow_dates = context.init_flows(inputs.flows, parameters.min_date, parameters.max_date)?;
    context.init_calendar(&flow_dates, parameters.min_date, parameters.max_date)?;

    let calendar = context.calendar()?;
    let (start, end) = (calendar.today(), calendar.end_date());
    context.advance_flows_to(start)?;
    context.refresh_zones_for_date(start)?;
    info!(
        "initialized {} zones; simulating {start} to {end}",
        context.get_zone_count()
    );

    context.set_proximity_index(Box::new(GridIndex::new(parameters.exposure_distance)?));
    init_population(context, &parameters)?;
    info!("initialized {} people", context.get_current_population());

    schedule_step(context, 0);
    Ok(())
}

/// Initializes the model and runs it to completion.
///
/// # Errors
///
/// Returns the first error raised during setup or by any step.
pub fn run(context: &mut Context, inputs: ModelInputs) -> Result<(), ModelError> {
    init(context, inputs)?;
    context.execute()
}

fn schedule_step(context: &mut Context, step: usize) {
    #[allow(clippy::cast_precision_loss)]
    let time = step as f64 / Phase::PER_DAY as f64;
    context.add_plan(time, update_people);
    context.add_plan_with_phase(
        time,
        move |context| finish_step(context, step),
        ExecutionPhase::Last,
    );
}

fn update_people(context: &mut Context) -> Result<(), ModelError> {
    let phase = context.calendar()?.phase();
    if phase == Phase::Morning {
        context.start_zone_day();
        context.clear_decisions();
    }

    let mut order = context.get_person_ids();
    context.shuffle(ModelRng, &mut order);
    for &person_id in &order {
        context.run_phase_behavior(person_id, phase)?;
        context.update_health(person_id)?;
    }

    if phase == Phase::Evening {
        end_of_day(context)?;
    }
    Ok(())
}

fn end_of_day(context: &mut Context) -> Result<(), ModelError> {
    let mut order = context.get_person_ids();
    context.shuffle(ModelRng, &mut order);
    for &person_id in &order {
        context.return_home(person_id)?;
        context.check_exposure(person_id)?;
    }
    Ok(())
}

fn finish_step(context: &mut Context, step: usize) -> Result<(), ModelError> {
    let tally = context.tally_step(step)?;
    if tally.phase == Phase::Evening {
        context.report_zone_stay_home()?;
    }

    match context.advance_clock()? {
        ClockEvent::Completed => {
            let counts = tally.counts;
            info!(
                "simulation complete after {} steps: S={} I={} R={}",
                step + 1,
                counts.susceptible,
                counts.infected,
                counts.recovered
            );
        }
        ClockEvent::DayChanged {
            date,
            window_changed,
        } => {
            if window_changed {
                context.advance_flows_to(date)?;
                context.refresh_zones_for_date(date)?;
            }
            schedule_step(context, step + 1);
        }
        ClockEvent::PhaseChanged(_) => schedule_step(context, step + 1),
    }
    Ok(())
}
