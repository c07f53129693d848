use std::{fmt, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum CeError {
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid xml file '{}': {message}", .path.display())]
    XmlParse { path: PathBuf, message: String },
    #[error("Invalid xml file '{}'. Msg: {reason}", .path.display())]
    Schema { path: PathBuf, reason: String },
    #[error("The file '{}' isn't a valid Xml Schema Document: {reason}", .path.display())]
    SchemaDefinition { path: PathBuf, reason: String },
    #[error("Element '{element}' is missing required field '{field}'")]
    MissingField { element: String, field: String },
    #[error("element of type '{0}' not handled")]
    UnhandledElementType(String),
    #[error("Directory '{}' is not a BannerLord module.", .0.display())]
    NotBannerLordModule(PathBuf),
    #[error("Directory '{}' is not a Captivity Events submodule.", .0.display())]
    NotCeSubmodule(PathBuf),
    #[error("Ingestion infrastructure failure: {0}")]
    IngestionInfrastructure(String),
}

impl CeError {
    /// Errors that concern a single input file. The ingestor records these in the bad xml
    /// collection instead of aborting the batch.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            CeError::XmlParse { .. }
                | CeError::Schema { .. }
                | CeError::MissingField { .. }
                | CeError::UnhandledElementType(_)
                | CeError::Io(_)
                | CeError::NotFound(_)
                | CeError::PermissionDenied
        )
    }
}

/// Returned by [`EventRegistry::lookup`](crate::eventbase::EventRegistry::lookup) when no event
/// carries the requested name. Forward references make this a common, expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot find event with name '{name}' in the registry")]
pub struct EventNotFound {
    pub name: String,
}

impl From<toml::de::Error> for CeError {
    fn from(src: toml::de::Error) -> CeError {
        CeError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CeError {
    fn from(src: toml::ser::Error) -> CeError {
        CeError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<serde_json::Error> for CeError {
    fn from(src: serde_json::Error) -> CeError {
        CeError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for CeError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CeError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => CeError::PermissionDenied,
            _ => CeError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for CeError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => CeError::from(io_error),
            None => CeError::Io("Filesystem loop detected while walking directory".to_string()),
        }
    }
}

impl From<fmt::Error> for CeError {
    fn from(x: fmt::Error) -> Self {
        CeError::Serialization(format!("{x}"))
    }
}
