//! Diagnostic records accumulated during a load run.
//!
//! None of these abort anything. Bad files, dangling references and registry overrides are
//! expected in real module collections, so they are collected as values and shown to the user
//! afterwards.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::CeError;

/// A file that failed XML parsing, schema validation or binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadXml {
    pub file: PathBuf,
    pub message: String,
}

impl BadXml {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BadXml {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Keeps the bare reason for parse and schema errors, the full display text otherwise.
    pub fn from_error(file: impl Into<PathBuf>, error: &CeError) -> Self {
        let message = match error {
            CeError::XmlParse { message, .. } => message.clone(),
            CeError::Schema { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        BadXml::new(file, message)
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for BadXml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid xml file: {}. Msg: {}",
            self.file.display(),
            self.message
        )
    }
}

/// An outbound trigger reference that names no event of the completed registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAncestryError {
    pub source_event: String,
    pub missing_child: String,
    pub source_file: Option<PathBuf>,
}

impl fmt::Display for EventAncestryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Child Not Found: Cannot find event with name '{}' in the registry. (event '{}'",
            self.missing_child, self.source_event
        )?;
        match &self.source_file {
            Some(file) => write!(f, ", bound file '{}')", file.display()),
            None => write!(f, ")"),
        }
    }
}

/// A registry insertion that replaced an event of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub name: String,
    pub previous_file: Option<PathBuf>,
    pub new_file: Option<PathBuf>,
}
