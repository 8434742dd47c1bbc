//! Global properties are typed, validated, write-once values shared by the whole
//! simulation. They are how run configuration reaches the model.
//!
//! A property is declared with [`define_global_property!`], which creates a marker
//! type. Values can be set directly or read from a JSON file whose top-level keys
//! are `"<crate>.<PropertyName>"`:
//!
//! ```json
//! { "commuter_sir.Parameters": { "beta": 0.5, "gamma": 0.5, "...": "..." } }
//! ```
use std::any::{Any, TypeId};
use std::fs;
use std::path::Path;

use log::trace;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;
use crate::hashing::{HashMap, HashMapExt};

pub trait GlobalProperty: Any + Copy {
    type Value: Any + DeserializeOwned;

    /// The key the property is stored under in a configuration file.
    fn name() -> String;

    /// Checks a candidate value before it is stored.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the value is unacceptable.
    fn validate(value: &Self::Value) -> Result<(), ModelError>;
}

/// Defines a global property with the following parameters:
/// * `$global_property`: Name for the identifier type of the global property
/// * `$value`: The type of the property's value
/// * `$validate`: A function (or closure) that checks the validity of the property (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate: expr) => {
        #[derive(Copy, Clone, Debug)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn name() -> String {
                let module = module_path!();
                let prefix = module.split("::").next().unwrap_or(module);
                format!("{}.{}", prefix, stringify!($global_property))
            }

            fn validate(value: &$value) -> Result<(), $crate::error::ModelError> {
                $validate(value)
            }
        }
    };

    ($global_property: ident, $value: ty) => {
        $crate::define_global_property!($global_property, $value, |_| Ok(()));
    };
}
pub use define_global_property;

struct GlobalPropertiesData {
    values: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesData,
    GlobalPropertiesData {
        values: HashMap::new(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Validates and stores `value`. Each property may be set only once.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::ConfigError` if the value fails validation or the
    /// property was already set.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), ModelError>;

    /// Returns the property's value, or `None` if it has not been set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads `property` from the JSON object in `file_path` and stores it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, the key is missing,
    /// or the value fails validation.
    fn load_global_property_from_file<T: GlobalProperty>(
        &mut self,
        property: T,
        file_path: &Path,
    ) -> Result<(), ModelError>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), ModelError> {
        T::validate(&value).map_err(|error| match error {
            ModelError::ConfigError(_) => error,
            other => ModelError::ConfigError(format!("{}: {other}", T::name())),
        })?;
        let data_container = self.get_data_mut(GlobalPropertiesPlugin);
        if data_container.values.contains_key(&TypeId::of::<T>()) {
            return Err(ModelError::ConfigError(format!(
                "Entry for global property {} already exists",
                T::name()
            )));
        }
        trace!("setting global property {}", T::name());
        data_container
            .values
            .insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data(GlobalPropertiesPlugin)?
            .values
            .get(&TypeId::of::<T>())?
            .downcast_ref::<T::Value>()
    }

    fn load_global_property_from_file<T: GlobalProperty>(
        &mut self,
        property: T,
        file_path: &Path,
    ) -> Result<(), ModelError> {
        let contents = fs::read_to_string(file_path)?;
        let mut entries: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)?;
        let name = T::name();
        let raw = entries.remove(&name).ok_or_else(|| {
            ModelError::ConfigError(format!(
                "{} does not define global property {name}",
                file_path.display()
            ))
        })?;
        let value: T::Value = serde_json::from_value(raw)?;
        self.set_global_property_value(property, value)
    }
}
