//! Daily movement: the morning stay-home decision, trips in each active
//! phase, and the evening return home.
use log::trace;

use crate::calendar::Phase;
use crate::context::Context;
use crate::error::ModelError;
use crate::flows::ContextFlowsExt;
use crate::people::{ContextPeopleExt, Decision, PersonId};
use crate::random::{ContextRandomExt, ModelRng};
use crate::zones::ContextZonesExt;

/// What one person does in one phase.
pub type PhaseBehavior = fn(&mut Context, PersonId) -> Result<(), ModelError>;

/// The behaviour table keyed by phase.
#[must_use]
pub fn phase_behavior(phase: Phase) -> PhaseBehavior {
    match phase {
        Phase::Morning => morning_step,
        Phase::Afternoon | Phase::Evening => travel_step,
    }
}

fn morning_step(context: &mut Context, person_id: PersonId) -> Result<(), ModelError> {
    let zone_id = context.get_person(person_id)?.current_zone();
    let prob_stay_home = context.get_zone(zone_id)?.prob_stay_home();
    if context.sample_bool(ModelRng, prob_stay_home) {
        context.set_person_decision(person_id, Some(Decision::StayHome))?;
        context.record_stay_home(zone_id)
    } else {
        context.set_person_decision(person_id, Some(Decision::GoOut))?;
        context.move_person(person_id)
    }
}

fn travel_step(context: &mut Context, person_id: PersonId) -> Result<(), ModelError> {
    match context.get_person(person_id)?.decision() {
        Some(Decision::GoOut) => context.move_person(person_id),
        Some(Decision::StayHome) | None => Ok(()),
    }
}

pub trait ContextMobilityExt {
    /// Runs the person's behaviour for `phase`.
    ///
    /// # Errors
    ///
    /// Propagates flow, zone and person lookup failures.
    fn run_phase_behavior(&mut self, person_id: PersonId, phase: Phase) -> Result<(), ModelError>;

    /// Samples a destination from the person's current zone and moves them to
    /// a fresh point inside it.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no flow table is loaded, or
    /// `ModelError::InvariantViolation` if the destination is not a registered zone.
    fn move_person(&mut self, person_id: PersonId) -> Result<(), ModelError>;

    /// Sends someone who went out back to their home zone and home point and
    /// clears their decision. People who stayed home are left alone.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person does not exist.
    fn return_home(&mut self, person_id: PersonId) -> Result<(), ModelError>;
}

impl ContextMobilityExt for Context {
    fn run_phase_behavior(&mut self, person_id: PersonId, phase: Phase) -> Result<(), ModelError> {
        phase_behavior(phase)(self, person_id)
    }

    fn move_person(&mut self, person_id: PersonId) -> Result<(), ModelError> {
        let origin = self.get_person(person_id)?.current_zone();
        let origin_code = self.get_zone(origin)?.code().clone();
        let destination_code = self.sample_destination(&origin_code)?;
        let destination = self.get_zone_id(&destination_code)?;
        let position = self.sample_point_in_zone(destination)?;
        trace!("{person_id} moves from {origin_code} to {destination_code}");
        self.relocate_person(person_id, destination, position)
    }

    fn return_home(&mut self, person_id: PersonId) -> Result<(), ModelError> {
        let person = self.get_person(person_id)?;
        if person.decision() != Some(Decision::GoOut) {
            return Ok(());
        }
        let (home_zone, home_position) = (person.home_zone(), person.home_position());
        self.relocate_person(person_id, home_zone, home_position)?;
        self.set_person_decision(person_id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorTable, ZoneBehavior};
    use crate::flows::{FlowRecord, InMemoryFlows};
    use crate::geometry::{MultiPolygon, Point};
    use crate::people::HealthStatus;
    use crate::spatial::GridIndex;
    use crate::zones::{ZoneCode, ZoneId};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 2).unwrap()
    }

    // Zone A (0..10) sends everyone to B (20..30); B sends everyone to A.
    fn setup(prob_stay_home: f64, flows: Vec<FlowRecord>) -> (Context, ZoneId, ZoneId) {
        let mut context = Context::new();
        context.init_random(8);
        let a = context
            .add_zone(
                ZoneCode::from("A"),
                MultiPolygon::rectangle(Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
                10,
            )
            .unwrap();
        let b = context
            .add_zone(
                ZoneCode::from("B"),
                MultiPolygon::rectangle(Point::new(20.0, 0.0), Point::new(30.0, 10.0)),
                10,
            )
            .unwrap();
        let mut behavior = BehaviorTable::new();
        behavior.fill(
            &[date()],
            &[ZoneCode::from("A"), ZoneCode::from("B")],
            ZoneBehavior {
                prob_stay_home,
                time_in_zone: 0.5,
            },
        );
        context.set_behavior_source(Box::new(behavior));
        context.refresh_zones_for_date(date()).unwrap();

        let mut source = InMemoryFlows::new();
        source.insert_table(date(), flows);
        context.init_flows(Box::new(source), None, None).unwrap();
        context.advance_flows_to(date()).unwrap();
        context.set_proximity_index(Box::new(GridIndex::new(5.0).unwrap()));
        (context, a, b)
    }

    fn swap_flows() -> Vec<FlowRecord> {
        vec![FlowRecord::new("A", "B", 1.0), FlowRecord::new("B", "A", 1.0)]
    }

    #[test]
    fn stay_home_never_moves() {
        let (mut context, a, _) = setup(1.0, swap_flows());
        let person_id = context
            .add_person(a, Point::new(5.0, 5.0), HealthStatus::S)
            .unwrap();
        for phase in [Phase::Morning, Phase::Afternoon, Phase::Evening] {
            context.run_phase_behavior(person_id, phase).unwrap();
            let person = context.get_person(person_id).unwrap();
            assert_eq!(person.current_zone(), a);
            assert_eq!(person.position(), Point::new(5.0, 5.0));
            assert_eq!(person.decision(), Some(Decision::StayHome));
        }
        assert_eq!(context.get_zone(a).unwrap().stayed_home(), 1);
    }

    #[test]
    fn going_out_moves_every_phase_and_returns_home() {
        let (mut context, a, b) = setup(0.0, swap_flows());
        let home = Point::new(5.0, 5.0);
        let person_id = context.add_person(a, home, HealthStatus::S).unwrap();

        context
            .run_phase_behavior(person_id, Phase::Morning)
            .unwrap();
        let person = context.get_person(person_id).unwrap();
        assert_eq!(person.decision(), Some(Decision::GoOut));
        assert_eq!(person.current_zone(), b);
        assert!(context
            .get_zone(b)
            .unwrap()
            .geometry()
            .contains(&person.position()));

        context
            .run_phase_behavior(person_id, Phase::Afternoon)
            .unwrap();
        assert_eq!(context.get_person(person_id).unwrap().current_zone(), a);
        context
            .run_phase_behavior(person_id, Phase::Evening)
            .unwrap();
        assert_eq!(context.get_person(person_id).unwrap().current_zone(), b);

        context.return_home(person_id).unwrap();
        let person = context.get_person(person_id).unwrap();
        assert_eq!(person.current_zone(), a);
        assert_eq!(person.position(), home);
        assert_eq!(person.decision(), None);
        assert_eq!(context.get_zone(a).unwrap().stayed_home(), 0);
    }

    #[test]
    fn zero_outbound_weight_stays_in_origin_zone() {
        let (mut context, a, _) = setup(0.0, vec![FlowRecord::new("A", "B", 0.0)]);
        let person_id = context
            .add_person(a, Point::new(5.0, 5.0), HealthStatus::S)
            .unwrap();
        context
            .run_phase_behavior(person_id, Phase::Morning)
            .unwrap();
        let person = context.get_person(person_id).unwrap();
        assert_eq!(person.decision(), Some(Decision::GoOut));
        assert_eq!(person.current_zone(), a);
    }

    #[test]
    fn unregistered_destination_is_rejected() {
        let (mut context, a, _) = setup(0.0, vec![FlowRecord::new("A", "Q", 1.0)]);
        let person_id = context
            .add_person(a, Point::new(5.0, 5.0), HealthStatus::S)
            .unwrap();
        let result = context.run_phase_behavior(person_id, Phase::Morning);
        assert!(matches!(result, Err(ModelError::InvariantViolation(_))));
        assert_eq!(context.get_person(person_id).unwrap().current_zone(), a);
    }

    #[test]
    fn return_home_ignores_stay_home() {
        let (mut context, a, _) = setup(1.0, swap_flows());
        let person_id = context
            .add_person(a, Point::new(5.0, 5.0), HealthStatus::S)
            .unwrap();
        context
            .run_phase_behavior(person_id, Phase::Morning)
            .unwrap();
        context.return_home(person_id).unwrap();
        assert_eq!(
            context.get_person(person_id).unwrap().decision(),
            Some(Decision::StayHome)
        );
    }
}
