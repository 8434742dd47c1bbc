//! CSV reports: the model's result sink.
//!
//! A report is a `Serialize` row type registered with `add_report`, which
//! creates `<directory>/<file_prefix><short_name>.csv`. Rows are written with
//! `send_report`.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;
use log::{debug, trace};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::ModelError;
use crate::hashing::{HashMap, HashMapExt};

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), ModelError>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::ModelError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}
pub use define_report;

#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl ReportOptions {
    /// Sets the file prefix option (e.g., "run_1_")
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ReportOptions {
        self.file_prefix = file_prefix;
        self
    }
    /// Sets the directory where reports will be output
    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }
    /// Sets whether to overwrite existing reports of the same name if they exist
    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    config: ReportOptions,
}

// Registers a data container that stores
// * file_writers: Maps report type to file writer
// * config: Contains all the customizable filename options that the user supplies
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::new()),
        config: ReportOptions::default(),
    }
);

pub trait ContextReportExt {
    /// Returns the report options so they can be changed before reports are added.
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Creates the file for report type `T` and registers its writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the report type is already registered, the file
    /// exists and `overwrite` is off, or the file cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), ModelError>;

    /// Writes a new row to the file registered for the report's type.
    ///
    /// # Errors
    ///
    /// Returns an error if no file was registered for the type or the row
    /// cannot be written.
    fn send_report<T: Report>(&self, report: T) -> Result<(), ModelError>;

    /// Returns `true` if a report of type `T` has been registered.
    fn has_report<T: Report>(&self) -> bool;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).config
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), ModelError> {
        let data_container = self.get_data_mut(ReportPlugin);
        let mut file_writers = data_container.file_writers.borrow_mut();
        if file_writers.contains_key(&TypeId::of::<T>()) {
            return Err(ModelError::ReportError(format!(
                "Duplicate report type for {short_name}"
            )));
        }

        let config = &data_container.config;
        let path = config
            .directory
            .join(format!("{}{short_name}.csv", config.file_prefix));
        if path.exists() && !config.overwrite {
            return Err(ModelError::ReportError(format!(
                "File already exists: {}. Please set `overwrite` to true in the file configuration and rerun.",
                path.display()
            )));
        }
        create_dir_all(&config.directory)?;
        let file = File::create(&path)?;
        debug!("writing report {short_name} to {}", path.display());
        file_writers.insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) -> Result<(), ModelError> {
        let data_container = self
            .get_data(ReportPlugin)
            .ok_or_else(|| ModelError::ReportError("No reports have been added".to_string()))?;
        let mut file_writers = data_container.file_writers.borrow_mut();
        let writer = file_writers
            .get_mut(&report.type_id())
            .ok_or_else(|| ModelError::ReportError("No writer found for the report type".to_string()))?;
        trace!("writing report row");
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn has_report<T: Report>(&self) -> bool {
        self.get_data(ReportPlugin).is_some_and(|data_container| {
            data_container
                .file_writers
                .borrow()
                .contains_key(&TypeId::of::<T>())
        })
    }
}
