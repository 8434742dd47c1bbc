//! Diagnostic logging for the model. Not to be confused with _reporting_ (see `report`),
//! which records the simulation's results.
//!
//! This module (re)exports the five logging macros `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`, where `error!` is the highest priority and `trace!` the lowest:
//!
//! ```rust
//! use commuter_sir::log::info;
//!
//! pub fn do_a_thing() {
//!     info!("A thing is being done.");
//! }
//! ```
//!
//! Logging is _disabled_ by default. The runner enables it with `--log-level <level>` or
//! `-v`/`-vv`/`-vvv`. From code:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!
//! Per-module filtering is configured with `set_module_filter()` / `set_module_filters()` and
//! `remove_module_filter()`:
//!
//! ```rust
//! use commuter_sir::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! pub fn setup_logging() {
//!     // Enable `info` log messages globally.
//!     set_log_level(LevelFilter::Info);
//!     // Show every infection and recovery.
//!     set_module_filter("commuter_sir::transmission", LevelFilter::Trace);
//! }
//! ```
mod standard_logger;

use std::collections::hash_map::Entry;
use std::sync::{LazyLock, Mutex, MutexGuard};

pub use log::{debug, error, info, trace, warn, LevelFilter};
use log4rs::Handle;

use crate::hashing::HashMap;

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
// Default module specific filters
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [
    // The plan loop traces every plan it schedules.
    ("commuter_sir::context", LevelFilter::Debug),
];

/// A global instance of the logging configuration.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter applied to the messages emitted from one module path
/// (e.g. `"commuter_sir::mobility"`).
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Tracks the filter levels of modules and holds the handle to the global logger.
///
/// Loggers are installed globally, so only one instance of this struct exists. The public
/// API are free functions which fetch the singleton and call the matching method.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// The level filter for modules without an explicitly set filter. `LevelFilter::Off`
    /// disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,
    /// Handle to the `log4rs` logger, set the first time a configuration is installed.
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        let module_configurations = DEFAULT_MODULE_FILTERS
            .map(|(module, level)| (module.to_string(), (module, level).into()));
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: module_configurations.into_iter().collect(),
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration was mutated, false otherwise.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().level == level {
                    return false;
                }
                entry.get_mut().level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module, *level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

// The public API

/// Enables the logger with no global level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. A global filter level of `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Removes a module-specific level filter for the given module path. The global level filter will
/// apply to the module.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// Sets the level filters for a set of modules. Use this instead of `set_module_filter()` to set
/// filters in bulk; the logger is rebuilt at most once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// Fetches a mutable reference to the global `LogConfiguration`.
fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
