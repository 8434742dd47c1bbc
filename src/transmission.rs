//! Infection by proximity and recovery after a fixed number of phases.
//!
//! A susceptible person scans everyone within the exposure distance in the
//! order the proximity index returns them and draws once per infectious
//! neighbour; the first successful draw infects and ends the scan. An
//! infected person recovers on the update that brings their time in status
//! to `Phase::PER_DAY / gamma` phases.
use log::trace;

use crate::calendar::Phase;
use crate::context::Context;
use crate::error::ModelError;
use crate::parameters::ContextParametersExt;
use crate::people::{ContextPeopleExt, HealthStatus, PersonId};
use crate::random::{ContextRandomExt, ModelRng};

/// Number of progression updates an infected person needs to recover.
#[must_use]
pub fn recovery_threshold(gamma: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let phases_per_day = Phase::PER_DAY as f64;
    phases_per_day / gamma
}

pub trait ContextTransmissionExt {
    /// Applies one step of transmission or progression to the person,
    /// depending on their status.
    ///
    /// # Errors
    ///
    /// Returns an error if parameters are missing or the person does not exist.
    fn update_health(&mut self, person_id: PersonId) -> Result<(), ModelError>;

    /// Runs the exposure check for a susceptible person. Returns `true` if
    /// they were infected. Anyone not susceptible is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if parameters are missing or the person does not exist.
    fn check_exposure(&mut self, person_id: PersonId) -> Result<bool, ModelError>;
}

fn progress_infection(
    context: &mut Context,
    person_id: PersonId,
    threshold: f64,
) -> Result<(), ModelError> {
    let steps = context.get_person(person_id)?.steps_in_status();
    if f64::from(steps + 1) >= threshold {
        trace!("{person_id} recovers after {} updates", steps + 1);
        context.set_person_status(person_id, HealthStatus::R)
    } else {
        context.increment_steps_in_status(person_id)?;
        Ok(())
    }
}

impl ContextTransmissionExt for Context {
    fn update_health(&mut self, person_id: PersonId) -> Result<(), ModelError> {
        match self.get_person(person_id)?.status() {
            HealthStatus::S => self.check_exposure(person_id).map(|_| ()),
            HealthStatus::I => {
                let threshold = recovery_threshold(self.get_parameters()?.gamma);
                progress_infection(self, person_id, threshold)
            }
            HealthStatus::R => self.increment_steps_in_status(person_id).map(|_| ()),
        }
    }

    fn check_exposure(&mut self, person_id: PersonId) -> Result<bool, ModelError> {
        if self.get_person(person_id)?.status() != HealthStatus::S {
            return Ok(false);
        }
        let parameters = self.get_parameters()?;
        let (beta, exposure_distance) = (parameters.beta, parameters.exposure_distance);

        for neighbor in self.get_neighbors(person_id, exposure_distance)? {
            if self.get_person(neighbor)?.status() != HealthStatus::I {
                continue;
            }
            if self.sample_bool(ModelRng, beta) {
                trace!("{person_id} infected by {neighbor}");
                self.set_person_status(person_id, HealthStatus::I)?;
                return Ok(true);
            }
        }
        self.increment_steps_in_status(person_id)?;
        Ok(false)
    }
}
