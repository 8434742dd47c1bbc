use std::fmt::{self, Display};
use std::io;

/// Provides `ModelError` and maps other errors to
/// convert to a `ModelError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum ModelError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    ParseError(String),
    /// Required behavioural or flow data is missing for a date or zone.
    DataUnavailable(String),
    /// An entity was assigned a value outside its valid domain.
    InvariantViolation(String),
    ConfigError(String),
    ReportError(String),
    ModelError(String),
}

impl From<io::Error> for ModelError {
    fn from(error: io::Error) -> Self {
        ModelError::IoError(error)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(error: serde_json::Error) -> Self {
        ModelError::JsonError(error)
    }
}

impl From<csv::Error> for ModelError {
    fn from(error: csv::Error) -> Self {
        ModelError::CsvError(error)
    }
}

impl From<chrono::ParseError> for ModelError {
    fn from(error: chrono::ParseError) -> Self {
        ModelError::ParseError(error.to_string())
    }
}

impl From<std::num::ParseFloatError> for ModelError {
    fn from(error: std::num::ParseFloatError) -> Self {
        ModelError::ParseError(error.to_string())
    }
}

impl From<String> for ModelError {
    fn from(error: String) -> Self {
        ModelError::ModelError(error)
    }
}

impl From<&str> for ModelError {
    fn from(error: &str) -> Self {
        ModelError::ModelError(error.to_string())
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::IoError(error) => Some(error),
            ModelError::JsonError(error) => Some(error),
            ModelError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::IoError(error) => write!(f, "I/O error: {error}"),
            ModelError::JsonError(error) => write!(f, "JSON error: {error}"),
            ModelError::CsvError(error) => write!(f, "CSV error: {error}"),
            ModelError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ModelError::DataUnavailable(msg) => write!(f, "Data unavailable: {msg}"),
            ModelError::InvariantViolation(msg) => write!(f, "Invariant violation: {msg}"),
            ModelError::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            ModelError::ReportError(msg) => write!(f, "Report error: {msg}"),
            ModelError::ModelError(msg) => write!(f, "Error: {msg}"),
        }
    }
}
