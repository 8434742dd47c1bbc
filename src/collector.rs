//! Per-step S/I/R tallies and the model's reports.
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::calendar::{ContextCalendarExt, Phase};
use crate::context::Context;
use crate::error::ModelError;
use crate::people::{ContextPeopleExt, HealthStatus, PersonId};
use crate::report::ContextReportExt;
use crate::zones::{ContextZonesExt, ZoneCode};
use crate::{define_data_plugin, define_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::S => self.susceptible += 1,
            HealthStatus::I => self.infected += 1,
            HealthStatus::R => self.recovered += 1,
        }
    }

    #[must_use]
    pub fn get(&self, status: HealthStatus) -> usize {
        match status {
            HealthStatus::S => self.susceptible,
            HealthStatus::I => self.infected,
            HealthStatus::R => self.recovered,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }
}

/// The tally for one step, taken after that step's updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounts {
    pub step: usize,
    pub date: NaiveDate,
    pub phase: Phase,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusCountsReport {
    pub step: usize,
    pub date: NaiveDate,
    pub phase: Phase,
    #[serde(rename = "S")]
    pub susceptible: usize,
    #[serde(rename = "I")]
    pub infected: usize,
    #[serde(rename = "R")]
    pub recovered: usize,
}

define_report!(StatusCountsReport);

#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneStayHomeReport {
    pub date: NaiveDate,
    pub zone: ZoneCode,
    pub residents: usize,
    pub stayed_home: u32,
    pub prob_stay_home: f64,
    pub time_in_zone: f64,
}

define_report!(ZoneStayHomeReport);

struct CollectorData {
    history: Vec<StepCounts>,
}

define_data_plugin!(
    CollectorPlugin,
    CollectorData,
    CollectorData {
        history: Vec::new()
    }
);

pub trait ContextCollectorExt {
    /// Registers the `status_counts` and `zone_stay_home` reports.
    ///
    /// # Errors
    ///
    /// Returns an error if either report file cannot be created.
    fn add_model_reports(&mut self) -> Result<(), ModelError>;

    /// Counts everyone by status.
    ///
    /// # Errors
    ///
    /// Returns an error if a person cannot be read.
    fn count_statuses(&self) -> Result<StatusCounts, ModelError>;

    /// Tallies the step that just ran, keeps it in the history and writes
    /// the `status_counts` row if that report is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the calendar is missing or the row cannot be written.
    fn tally_step(&mut self, step: usize) -> Result<StepCounts, ModelError>;

    /// Writes one `zone_stay_home` row per zone for today, if that report is
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the calendar is missing or a row cannot be written.
    fn report_zone_stay_home(&self) -> Result<(), ModelError>;

    /// Every tally taken so far, oldest first.
    fn get_step_counts(&self) -> &[StepCounts];
}

impl ContextCollectorExt for Context {
    fn add_model_reports(&mut self) -> Result<(), ModelError> {
        self.add_report::<StatusCountsReport>("status_counts")?;
        self.add_report::<ZoneStayHomeReport>("zone_stay_home")
    }

    fn count_statuses(&self) -> Result<StatusCounts, ModelError> {
        let mut counts = StatusCounts::default();
        for person_id in (0..self.get_current_population()).map(PersonId) {
            counts.add(self.get_person(person_id)?.status());
        }
        Ok(counts)
    }

    fn tally_step(&mut self, step: usize) -> Result<StepCounts, ModelError> {
        let calendar = self.calendar()?;
        let (date, phase) = (calendar.today(), calendar.phase());
        let counts = self.count_statuses()?;
        info!(
            "step {step} {date} {phase}: S={} I={} R={}",
            counts.susceptible, counts.infected, counts.recovered
        );

        if self.has_report::<StatusCountsReport>() {
            self.send_report(StatusCountsReport {
                step,
                date,
                phase,
                susceptible: counts.susceptible,
                infected: counts.infected,
                recovered: counts.recovered,
            })?;
        }
        let step_counts = StepCounts {
            step,
            date,
            phase,
            counts,
        };
        self.get_data_mut(CollectorPlugin).history.push(step_counts);
        Ok(step_counts)
    }

    fn report_zone_stay_home(&self) -> Result<(), ModelError> {
        if !self.has_report::<ZoneStayHomeReport>() {
            return Ok(());
        }
        let date = self.calendar()?.today();
        for zone_id in self.get_zone_ids() {
            let zone = self.get_zone(zone_id)?;
            self.send_report(ZoneStayHomeReport {
                date,
                zone: zone.code().clone(),
                residents: zone.residents().len(),
                stayed_home: zone.stayed_home(),
                prob_stay_home: zone.prob_stay_home(),
                time_in_zone: zone.time_in_zone(),
            })?;
        }
        Ok(())
    }

    fn get_step_counts(&self) -> &[StepCounts] {
        self.get_data(CollectorPlugin)
            .map(|data| data.history.as_slice())
            .unwrap_or_default()
    }
}
