use crate::{error::CeError, paths::ModulePath};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

/// What a load run needs: a schema and an ordered list of module directories.
///
/// Module order is priority order. When two modules define the same event, the one listed later
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub xsd_file: Option<PathBuf>,
    pub modules: Vec<PathBuf>,
    pub workers: Option<usize>,
}

/// A configured directory that [`ModulePath::open`] refused.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedModule {
    pub path: PathBuf,
    pub error: CeError,
}

impl Settings {
    pub fn schema_path(&self) -> Result<&Path, CeError> {
        self.xsd_file
            .as_deref()
            .ok_or_else(|| CeError::NotFound("no xsd file configured".to_string()))
    }

    /// Validates every configured directory, keeping configured order for the accepted ones.
    pub fn module_paths(&self) -> (Vec<ModulePath>, Vec<RejectedModule>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for path in &self.modules {
            match ModulePath::open(path) {
                Ok(module) => accepted.push(module),
                Err(error) => {
                    tracing::warn!("Rejected module directory {:?}: {}", path, error);
                    rejected.push(RejectedModule {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        (accepted, rejected)
    }

    /// Appends `path` unless it is already listed. Returns whether it was added.
    pub fn add_module(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.modules.contains(&path) {
            return false;
        }
        self.modules.push(path);
        true
    }

    pub fn remove_module(&mut self, path: &Path) -> bool {
        let before = self.modules.len();
        self.modules.retain(|module| module != path);
        before != self.modules.len()
    }

    /// Swaps the module with its predecessor. No-op for the first entry or unknown paths.
    pub fn move_module_up(&mut self, path: &Path) -> bool {
        match self.position(path) {
            Some(idx) if idx > 0 => {
                self.modules.swap(idx - 1, idx);
                true
            }
            _ => false,
        }
    }

    pub fn move_module_down(&mut self, path: &Path) -> bool {
        match self.position(path) {
            Some(idx) if idx + 1 < self.modules.len() => {
                self.modules.swap(idx, idx + 1);
                true
            }
            _ => false,
        }
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.modules.iter().position(|module| module == path)
    }
}

pub trait SettingsProvider: Send + Sync {
    fn get_settings(&self) -> Result<Settings, CeError>;
    fn set_settings(&self, settings: &Settings) -> Result<(), CeError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlSettingsProvider {
    path: PathBuf,
}

impl TomlSettingsProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlSettingsProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsProvider for TomlSettingsProvider {
    fn get_settings(&self) -> Result<Settings, CeError> {
        tracing::debug!("Attempting to read settings from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Settings file not found, returning default settings.");
            return Ok(Settings::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn set_settings(&self, settings: &Settings) -> Result<(), CeError> {
        tracing::debug!("Attempting to write settings to: {:?}", &self.path);
        let toml_string = toml::to_string(settings)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
