//! The simulated population.
//!
//! People are stored in a flat vector indexed by [`PersonId`] and refer to
//! zones by [`ZoneId`]. Positions are mirrored into a [`ProximityIndex`] so
//! that every move is immediately visible to proximity queries.
use std::fmt::{self, Display};

use log::trace;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;
use crate::geometry::Point;
use crate::spatial::ProximityIndex;
use crate::zones::{ContextZonesExt, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonId(pub usize);

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "person {}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumIter,
)]
pub enum HealthStatus {
    /// Susceptible
    S,
    /// Infected (and infectious)
    I,
    /// Recovered
    R,
}

impl HealthStatus {
    /// Statuses in the order used for initial-condition weights.
    pub const ALL: [HealthStatus; 3] = [HealthStatus::S, HealthStatus::I, HealthStatus::R];

    /// Status only moves forward: S to I, I to R.
    #[must_use]
    pub fn can_become(self, next: HealthStatus) -> bool {
        matches!(
            (self, next),
            (HealthStatus::S, HealthStatus::I) | (HealthStatus::I, HealthStatus::R)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    StayHome,
    GoOut,
}

#[derive(Debug, Clone)]
pub struct Person {
    home_zone: ZoneId,
    home_position: Point,
    current_zone: ZoneId,
    position: Point,
    status: HealthStatus,
    decision: Option<Decision>,
    steps_in_status: u32,
}

impl Person {
    #[must_use]
    pub fn home_zone(&self) -> ZoneId {
        self.home_zone
    }

    /// Where the person lives; every return home comes back to this point.
    #[must_use]
    pub fn home_position(&self) -> Point {
        self.home_position
    }

    #[must_use]
    pub fn current_zone(&self) -> ZoneId {
        self.current_zone
    }

    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Today's decision; `None` before the morning draw and after returning home.
    #[must_use]
    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    /// Consecutive progression updates spent in the current status.
    #[must_use]
    pub fn steps_in_status(&self) -> u32 {
        self.steps_in_status
    }
}

struct PeopleData {
    people: Vec<Person>,
    index: Option<Box<dyn ProximityIndex>>,
}

define_data_plugin!(
    PeoplePlugin,
    PeopleData,
    PeopleData {
        people: Vec::new(),
        index: None,
    }
);

fn unknown_person(person_id: PersonId) -> ModelError {
    ModelError::InvariantViolation(format!("{person_id} does not exist"))
}

fn person_mut(context: &mut Context, person_id: PersonId) -> Result<&mut Person, ModelError> {
    context
        .get_data_mut(PeoplePlugin)
        .people
        .get_mut(person_id.0)
        .ok_or_else(|| unknown_person(person_id))
}

pub trait ContextPeopleExt {
    /// Installs the proximity index. Must be called before anyone is added.
    fn set_proximity_index(&mut self, index: Box<dyn ProximityIndex>);

    /// Creates a person at home, registers them as a resident of `home_zone`
    /// and adds them to the proximity index.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered,
    /// or an error if there is no proximity index.
    fn add_person(
        &mut self,
        home_zone: ZoneId,
        home_position: Point,
        status: HealthStatus,
    ) -> Result<PersonId, ModelError>;

    fn get_current_population(&self) -> usize;

    fn get_person_ids(&self) -> Vec<PersonId>;

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person does not exist.
    fn get_person(&self, person_id: PersonId) -> Result<&Person, ModelError>;

    /// Moves a person along S to I to R and resets their in-status counter.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` for any other transition.
    fn set_person_status(
        &mut self,
        person_id: PersonId,
        status: HealthStatus,
    ) -> Result<(), ModelError>;

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person does not exist.
    fn increment_steps_in_status(&mut self, person_id: PersonId) -> Result<u32, ModelError>;

    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person does not exist.
    fn set_person_decision(
        &mut self,
        person_id: PersonId,
        decision: Option<Decision>,
    ) -> Result<(), ModelError>;

    /// Clears everyone's decision.
    fn clear_decisions(&mut self);

    /// Places a person in `zone_id` at `position`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the zone is not registered
    /// or the person does not exist.
    fn relocate_person(
        &mut self,
        person_id: PersonId,
        zone_id: ZoneId,
        position: Point,
    ) -> Result<(), ModelError>;

    /// Everyone else within `radius` of the person's position, in index order.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InvariantViolation` if the person does not exist,
    /// or an error if there is no proximity index.
    fn get_neighbors(&self, person_id: PersonId, radius: f64) -> Result<Vec<PersonId>, ModelError>;
}

fn missing_index() -> ModelError {
    ModelError::ModelError("the proximity index has not been set".to_string())
}

impl ContextPeopleExt for Context {
    fn set_proximity_index(&mut self, index: Box<dyn ProximityIndex>) {
        self.get_data_mut(PeoplePlugin).index = Some(index);
    }

    fn add_person(
        &mut self,
        home_zone: ZoneId,
        home_position: Point,
        status: HealthStatus,
    ) -> Result<PersonId, ModelError> {
        self.get_zone(home_zone)?;
        let data_container = self.get_data_mut(PeoplePlugin);
        let person_id = PersonId(data_container.people.len());
        data_container
            .index
            .as_mut()
            .ok_or_else(missing_index)?
            .insert(person_id, home_position)?;
        data_container.people.push(Person {
            home_zone,
            home_position,
            current_zone: home_zone,
            position: home_position,
            status,
            decision: None,
            steps_in_status: 0,
        });
        self.add_resident(home_zone, person_id)?;
        trace!("created {person_id} in {home_zone} with status {status}");
        Ok(person_id)
    }

    fn get_current_population(&self) -> usize {
        self.get_data(PeoplePlugin).map_or(0, |data| data.people.len())
    }

    fn get_person_ids(&self) -> Vec<PersonId> {
        (0..self.get_current_population()).map(PersonId).collect()
    }

    fn get_person(&self, person_id: PersonId) -> Result<&Person, ModelError> {
        self.get_data(PeoplePlugin)
            .and_then(|data| data.people.get(person_id.0))
            .ok_or_else(|| unknown_person(person_id))
    }

    fn set_person_status(
        &mut self,
        person_id: PersonId,
        status: HealthStatus,
    ) -> Result<(), ModelError> {
        let person = person_mut(self, person_id)?;
        if !person.status.can_become(status) {
            return Err(ModelError::InvariantViolation(format!(
                "{person_id} cannot go from {} to {status}",
                person.status
            )));
        }
        trace!("{person_id}: {} -> {status}", person.status);
        person.status = status;
        person.steps_in_status = 0;
        Ok(())
    }

    fn increment_steps_in_status(&mut self, person_id: PersonId) -> Result<u32, ModelError> {
        let person = person_mut(self, person_id)?;
        person.steps_in_status += 1;
        Ok(person.steps_in_status)
    }

    fn set_person_decision(
        &mut self,
        person_id: PersonId,
        decision: Option<Decision>,
    ) -> Result<(), ModelError> {
        person_mut(self, person_id)?.decision = decision;
        Ok(())
    }

    fn clear_decisions(&mut self) {
        for person in &mut self.get_data_mut(PeoplePlugin).people {
            person.decision = None;
        }
    }

    fn relocate_person(
        &mut self,
        person_id: PersonId,
        zone_id: ZoneId,
        position: Point,
    ) -> Result<(), ModelError> {
        self.get_zone(zone_id)?;
        let data_container = self.get_data_mut(PeoplePlugin);
        let person = data_container
            .people
            .get_mut(person_id.0)
            .ok_or_else(|| unknown_person(person_id))?;
        person.current_zone = zone_id;
        person.position = position;
        data_container
            .index
            .as_mut()
            .ok_or_else(missing_index)?
            .update(person_id, position)
    }

    fn get_neighbors(&self, person_id: PersonId, radius: f64) -> Result<Vec<PersonId>, ModelError> {
        let position = self.get_person(person_id)?.position;
        let index = self
            .get_data(PeoplePlugin)
            .and_then(|data| data.index.as_deref())
            .ok_or_else(missing_index)?;
        Ok(index.neighbors_within(position, radius, Some(person_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MultiPolygon;
    use crate::spatial::GridIndex;
    use crate::zones::ZoneCode;
    use strum::IntoEnumIterator;

    fn setup() -> (Context, ZoneId, ZoneId) {
        let mut context = Context::new();
        let square = MultiPolygon::rectangle(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let a = context
            .add_zone(ZoneCode::from("A"), square.clone(), 2)
            .unwrap();
        let b = context.add_zone(ZoneCode::from("B"), square, 2).unwrap();
        context.set_proximity_index(Box::new(GridIndex::new(1.0).unwrap()));
        (context, a, b)
    }

    #[test]
    fn transitions_are_monotone() {
        for from in HealthStatus::iter() {
            for to in HealthStatus::iter() {
                let allowed = matches!(
                    (from, to),
                    (HealthStatus::S, HealthStatus::I) | (HealthStatus::I, HealthStatus::R)
                );
                assert_eq!(from.can_become(to), allowed, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn add_person_registers_everywhere() {
        let (mut context, a, _) = setup();
        let person_id = context
            .add_person(a, Point::new(1.0, 1.0), HealthStatus::S)
            .unwrap();
        assert_eq!(context.get_current_population(), 1);
        assert_eq!(context.get_zone(a).unwrap().residents(), &[person_id]);

        let person = context.get_person(person_id).unwrap();
        assert_eq!(person.current_zone(), a);
        assert_eq!(person.position(), Point::new(1.0, 1.0));
        assert_eq!(person.decision(), None);
        assert_eq!(person.steps_in_status(), 0);

        assert!(matches!(
            context.add_person(ZoneId(9), Point::new(1.0, 1.0), HealthStatus::S),
            Err(ModelError::InvariantViolation(_))
        ));
        assert_eq!(context.get_current_population(), 1);
    }

    #[test]
    fn add_person_requires_index() {
        let mut context = Context::new();
        let a = context
            .add_zone(ZoneCode::from("A"), MultiPolygon::default(), 1)
            .unwrap();
        assert!(context
            .add_person(a, Point::default(), HealthStatus::S)
            .is_err());
    }

    #[test]
    fn status_changes() {
        let (mut context, a, _) = setup();
        let person_id = context
            .add_person(a, Point::new(1.0, 1.0), HealthStatus::S)
            .unwrap();
        context.increment_steps_in_status(person_id).unwrap();
        context
            .set_person_status(person_id, HealthStatus::I)
            .unwrap();
        assert_eq!(context.get_person(person_id).unwrap().steps_in_status(), 0);

        assert!(matches!(
            context.set_person_status(person_id, HealthStatus::S),
            Err(ModelError::InvariantViolation(_))
        ));
        context
            .set_person_status(person_id, HealthStatus::R)
            .unwrap();
        assert!(context
            .set_person_status(person_id, HealthStatus::I)
            .is_err());
        assert_eq!(
            context.get_person(person_id).unwrap().status(),
            HealthStatus::R
        );
    }

    #[test]
    fn relocation_updates_neighbors() {
        let (mut context, a, b) = setup();
        let p0 = context
            .add_person(a, Point::new(1.0, 1.0), HealthStatus::S)
            .unwrap();
        let p1 = context
            .add_person(a, Point::new(1.5, 1.0), HealthStatus::I)
            .unwrap();
        assert_eq!(context.get_neighbors(p0, 1.0).unwrap(), vec![p1]);

        context
            .relocate_person(p1, b, Point::new(8.0, 8.0))
            .unwrap();
        assert!(context.get_neighbors(p0, 1.0).unwrap().is_empty());
        let person = context.get_person(p1).unwrap();
        assert_eq!(person.current_zone(), b);
        assert_eq!(person.home_zone(), a);
        assert_eq!(person.home_position(), Point::new(1.5, 1.0));

        assert!(matches!(
            context.relocate_person(p1, ZoneId(4), Point::new(0.0, 0.0)),
            Err(ModelError::InvariantViolation(_))
        ));
        assert_eq!(context.get_person(p1).unwrap().current_zone(), b);
    }

    #[test]
    fn decisions() {
        let (mut context, a, _) = setup();
        let person_id = context
            .add_person(a, Point::new(1.0, 1.0), HealthStatus::S)
            .unwrap();
        context
            .set_person_decision(person_id, Some(Decision::GoOut))
            .unwrap();
        assert_eq!(
            context.get_person(person_id).unwrap().decision(),
            Some(Decision::GoOut)
        );
        context.clear_decisions();
        assert_eq!(context.get_person(person_id).unwrap().decision(), None);
    }
}
