//! The `Context` owns all simulation state and drives the plan loop.
//!
//! Each concern of the model (zones, people, flows, the calendar, reports, ...)
//! keeps its data in a *data plugin*: a container type stored in the `Context`
//! and keyed by a marker type declared with [`define_data_plugin!`]. Each
//! concern then exposes an extension trait (`ContextZonesExt`,
//! `ContextPeopleExt`, ...) implemented on `Context`.
//!
//! Work is scheduled as plans: callbacks that run at a simulated time. Callbacks
//! are fallible; the first error stops the loop and is returned from
//! [`Context::execute`].
use std::any::{Any, TypeId};

use log::trace;

use crate::error::ModelError;
use crate::hashing::{HashMap, HashMapExt};
use crate::plan::{ExecutionPhase, Queue};

pub trait DataPlugin: Any + Copy {
    type DataContainer: Any;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new marker type for storing data in `Context`.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context) -> Result<(), ModelError>;

pub struct Context {
    plan_queue: Queue<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            data_plugins: HashMap::new(),
            current_time: 0.0,
        }
    }

    /// Schedule `callback` to run at `time` in the `Normal` phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) -> Result<(), ModelError> + 'static,
    ) {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal);
    }

    /// Schedule `callback` to run at `time` in the given phase. Plans at the
    /// same time run `First`, then `Normal`, then `Last`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) -> Result<(), ModelError> + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Invalid time value"
        );
        trace!("adding plan at {time} ({phase:?})");
        self.plan_queue.add_plan(time, Box::new(callback), phase);
    }

    /// Returns a mutable reference to the container for `T`, creating it if it
    /// does not exist yet.
    #[allow(clippy::missing_panics_doc)]
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            // The entry for `T` is only ever created with `T::DataContainer`.
            .expect("data plugin container has the wrong type")
    }

    /// Returns the container for `T` if it has been created.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Run plans in time order until none are left or one fails.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by a callback. The remaining plans are
    /// dropped; nothing is retried.
    pub fn execute(&mut self) -> Result<(), ModelError> {
        trace!("entering event loop");
        while let Some(plan) = self.plan_queue.get_next_plan() {
            self.current_time = plan.time;
            if let Err(error) = (plan.data)(self) {
                self.plan_queue.clear();
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
