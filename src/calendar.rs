//! The simulation clock: a date plus one of three sub-daily phases.
//!
//! The clock also tracks which flow window is active. A flow window starts
//! at each date with flow data and lasts until the next one; the last window
//! runs to the end of the simulation.
use chrono::{Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;

/// Days simulated after the last flow date.
pub const TRAILING_DAYS: u64 = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Phase {
    Morning,
    Afternoon,
    Evening,
}

impl Phase {
    pub const PER_DAY: usize = 3;

    #[must_use]
    pub fn next(self) -> Phase {
        match self {
            Phase::Morning => Phase::Afternoon,
            Phase::Afternoon => Phase::Evening,
            Phase::Evening => Phase::Morning,
        }
    }
}

/// What happened when the clock advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    PhaseChanged(Phase),
    /// The date rolled over; `window_changed` is set when a new flow window starts.
    DayChanged {
        date: NaiveDate,
        window_changed: bool,
    },
    /// The last day's Evening has finished. The clock no longer moves.
    Completed,
}

#[derive(Debug, Clone)]
pub struct Calendar {
    today: NaiveDate,
    phase: Phase,
    end_date: NaiveDate,
    complete: bool,
    flow_dates: Vec<NaiveDate>,
    window: usize,
}

impl Calendar {
    /// Builds a clock from the dates that have flow data. Dates outside
    /// `[min_date, max_date]` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no flow date is in range.
    pub fn new(
        available_dates: &[NaiveDate],
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<Calendar, ModelError> {
        let mut flow_dates: Vec<NaiveDate> = available_dates
            .iter()
            .copied()
            .filter(|date| min_date.map_or(true, |min| *date >= min))
            .filter(|date| max_date.map_or(true, |max| *date <= max))
            .collect();
        flow_dates.sort_unstable();
        flow_dates.dedup();

        let (Some(&first), Some(&last)) = (flow_dates.first(), flow_dates.last()) else {
            return Err(ModelError::DataUnavailable(format!(
                "no flow data between {} and {}",
                min_date.map_or("the beginning".to_string(), |d| d.to_string()),
                max_date.map_or("the end".to_string(), |d| d.to_string()),
            )));
        };
        let trailing_end = last
            .checked_add_days(Days::new(TRAILING_DAYS))
            .unwrap_or(NaiveDate::MAX);
        let end_date = max_date.map_or(trailing_end, |max| trailing_end.min(max));
        debug!(
            "calendar runs {first} to {end_date} over {} flow windows",
            flow_dates.len()
        );

        Ok(Calendar {
            today: first,
            phase: Phase::Morning,
            end_date,
            complete: false,
            flow_dates,
            window: 0,
        })
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// First date of the following flow window, if there is one.
    #[must_use]
    pub fn next_window_start(&self) -> Option<NaiveDate> {
        self.flow_dates.get(self.window + 1).copied()
    }

    /// Moves to the next phase. Leaving Evening moves to the next day, unless
    /// today is the end date, in which case the clock freezes and reports
    /// `Completed` from then on.
    pub fn advance(&mut self) -> ClockEvent {
        if self.complete {
            return ClockEvent::Completed;
        }
        if self.phase != Phase::Evening {
            self.phase = self.phase.next();
            return ClockEvent::PhaseChanged(self.phase);
        }
        if self.today >= self.end_date {
            self.complete = true;
            return ClockEvent::Completed;
        }

        self.today = self.today.succ_opt().unwrap_or(NaiveDate::MAX);
        self.phase = Phase::Morning;
        let mut window_changed = false;
        while self
            .next_window_start()
            .is_some_and(|start| start <= self.today)
        {
            self.window += 1;
            window_changed = true;
        }
        ClockEvent::DayChanged {
            date: self.today,
            window_changed,
        }
    }
}

struct CalendarData {
    calendar: Option<Calendar>,
}

define_data_plugin!(CalendarPlugin, CalendarData, CalendarData { calendar: None });

fn not_initialized() -> ModelError {
    ModelError::ModelError("the calendar has not been initialized".to_string())
}

pub trait ContextCalendarExt {
    /// Installs the clock. See [`Calendar::new`].
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DataUnavailable` if no flow date is in range.
    fn init_calendar(
        &mut self,
        available_dates: &[NaiveDate],
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<(), ModelError>;

    /// # Errors
    ///
    /// Returns an error if the calendar has not been initialized.
    fn calendar(&self) -> Result<&Calendar, ModelError>;

    /// # Errors
    ///
    /// Returns an error if the calendar has not been initialized.
    fn advance_clock(&mut self) -> Result<ClockEvent, ModelError>;
}

impl ContextCalendarExt for Context {
    fn init_calendar(
        &mut self,
        available_dates: &[NaiveDate],
        min_date: Option<NaiveDate>,
        max_date: Option<NaiveDate>,
    ) -> Result<(), ModelError> {
        let calendar = Calendar::new(available_dates, min_date, max_date)?;
        self.get_data_mut(CalendarPlugin).calendar = Some(calendar);
        Ok(())
    }

    fn calendar(&self) -> Result<&Calendar, ModelError> {
        self.get_data(CalendarPlugin)
            .and_then(|data| data.calendar.as_ref())
            .ok_or_else(not_initialized)
    }

    fn advance_clock(&mut self) -> Result<ClockEvent, ModelError> {
        let calendar = self
            .get_data_mut(CalendarPlugin)
            .calendar
            .as_mut()
            .ok_or_else(not_initialized)?;
        Ok(calendar.advance())
    }
}
