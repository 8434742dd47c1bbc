//! An agent-based SIR model of disease spread among commuters.
//!
//! People live in geographic zones. Each simulated day has three phases
//! (Morning, Afternoon, Evening). In the morning every person decides whether
//! to stay home, using their home zone's stay-home probability for the day;
//! those who go out move to a destination zone sampled from an
//! origin-destination flow table in every phase, and return home at the end
//! of the evening. Susceptible people are infected by infectious people within
//! a fixed distance with probability `beta` per contact; infected people
//! recover after `3 / gamma` phases.
//!
//! The central object is the [`Context`], which owns all simulation state and
//! runs scheduled plans in time order. Each concern of the model keeps its data
//! in a data plugin and exposes an extension trait on `Context`:
//! * [`zones`]: the zone registry and per-day behaviour
//! * [`people`]: the population, statuses and the proximity index
//! * [`flows`]: dated origin-destination tables and destination sampling
//! * [`calendar`]: the date/phase clock
//! * [`mobility`] and [`transmission`]: what each person does every phase
//! * [`collector`]: per-step S/I/R tallies and CSV reports
//!
//! [`model`] wires these together into the step protocol, [`loader`] reads
//! inputs from disk and [`runner`] provides the command line entry point.
pub mod behavior;
pub mod calendar;
pub mod collector;
pub mod context;
pub mod error;
pub mod flows;
pub mod geometry;
pub mod global_properties;
pub mod hashing;
pub mod loader;
pub mod log;
pub mod mobility;
pub mod model;
pub mod parameters;
pub mod people;
pub mod plan;
pub mod prelude;
pub mod random;
pub mod report;
pub mod runner;
pub mod spatial;
pub mod transmission;
pub mod zones;

pub use crate::context::Context;
pub use crate::error::ModelError;
pub use crate::global_properties::ContextGlobalPropertiesExt;
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::model::{ModelInputs, ZoneInput};
pub use crate::random::ContextRandomExt;
pub use crate::report::ContextReportExt;
pub use crate::runner::{run_with_args, run_with_custom_args, BaseArgs};

// Re-exported for use in macros
pub use csv;
pub use rand;
