//! Run configuration, stored as the `Parameters` global property.
//!
//! A configuration file looks like:
//!
//! ```json
//! {
//!   "commuter_sir.Parameters": {
//!     "beta": 0.5,
//!     "gamma": 0.5,
//!     "exposure_distance": 100.0,
//!     "initial_condition": { "S": 0.99, "I": 0.01, "R": 0.0 },
//!     "min_date": "2020-03-01",
//!     "max_date": "2020-03-31",
//!     "population_fraction": 0.1,
//!     "seed": 42,
//!     "data_dir": "data"
//!   }
//! }
//! ```
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_global_property;
use crate::error::ModelError;
use crate::global_properties::ContextGlobalPropertiesExt;

/// Relative weights of the three health statuses at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    #[serde(rename = "S")]
    pub susceptible: f64,
    #[serde(rename = "I")]
    pub infected: f64,
    #[serde(rename = "R")]
    pub recovered: f64,
}

impl InitialCondition {
    /// Weights in `HealthStatus` order (S, I, R).
    #[must_use]
    pub fn weights(&self) -> [f64; 3] {
        [self.susceptible, self.infected, self.recovered]
    }
}

fn default_population_fraction() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersValues {
    /// Probability that one contact with an infectious person infects.
    pub beta: f64,
    /// Recovery rate per day.
    pub gamma: f64,
    /// Radius within which two people are in contact, in map units.
    pub exposure_distance: f64,
    pub initial_condition: InitialCondition,
    #[serde(default)]
    pub min_date: Option<NaiveDate>,
    #[serde(default)]
    pub max_date: Option<NaiveDate>,
    /// Share of each zone's population that is simulated.
    #[serde(default = "default_population_fraction")]
    pub population_fraction: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub data_dir: PathBuf,
    /// Average trips per person. Kept for provenance; the model does not use it.
    #[serde(default)]
    pub avg_trips: Option<f64>,
}

fn validate_inputs(parameters: &ParametersValues) -> Result<(), ModelError> {
    if !(0.0..=1.0).contains(&parameters.beta) {
        return Err(ModelError::ConfigError(format!(
            "beta must be a probability, got {}",
            parameters.beta
        )));
    }
    if !(parameters.gamma.is_finite() && parameters.gamma > 0.0) {
        return Err(ModelError::ConfigError(format!(
            "gamma must be positive, got {}",
            parameters.gamma
        )));
    }
    if !(parameters.exposure_distance.is_finite() && parameters.exposure_distance > 0.0) {
        return Err(ModelError::ConfigError(format!(
            "exposure_distance must be positive, got {}",
            parameters.exposure_distance
        )));
    }
    let weights = parameters.initial_condition.weights();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(ModelError::ConfigError(format!(
            "initial_condition weights must be non-negative with a positive sum, got {weights:?}"
        )));
    }
    if !(parameters.population_fraction > 0.0 && parameters.population_fraction <= 1.0) {
        return Err(ModelError::ConfigError(format!(
            "population_fraction must be in (0, 1], got {}",
            parameters.population_fraction
        )));
    }
    if let (Some(min_date), Some(max_date)) = (parameters.min_date, parameters.max_date) {
        if min_date > max_date {
            return Err(ModelError::ConfigError(format!(
                "min_date {min_date} is after max_date {max_date}"
            )));
        }
    }
    Ok(())
}

define_global_property!(Parameters, ParametersValues, validate_inputs);

pub trait ContextParametersExt {
    /// Loads `Parameters` from a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the values are invalid.
    fn init_parameters(&mut self, file_path: &Path) -> Result<(), ModelError>;

    /// Returns the run parameters.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::ConfigError` if no parameters have been set.
    fn get_parameters(&self) -> Result<&ParametersValues, ModelError>;
}

impl ContextParametersExt for Context {
    fn init_parameters(&mut self, file_path: &Path) -> Result<(), ModelError> {
        self.load_global_property_from_file(Parameters, file_path)
    }

    fn get_parameters(&self) -> Result<&ParametersValues, ModelError> {
        self.get_global_property_value(Parameters)
            .ok_or_else(|| ModelError::ConfigError("Parameters have not been set".to_string()))
    }
}
