//! Validation and layout of module directories.
//!
//! A module is accepted when it either has an `Events` directory or a `SubModule.xml` descriptor.
//! A descriptor, when present, must declare a dependency on the Captivity Events base module.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::error::CeError;

/// Id of the base module every content pack has to depend on.
pub const REQUIRED_MODULE_ID: &str = "zCaptivityEvents";
pub const SUBMODULE_FILE: &str = "SubModule.xml";
pub const EVENTS_DIR: &str = "Events";
pub const IMAGES_DIR: &str = "Images";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePath {
    root: PathBuf,
    name: String,
}

impl ModulePath {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CeError> {
        let root = dir.as_ref().to_path_buf();
        let submodule = root.join(SUBMODULE_FILE);
        let events = root.join(EVENTS_DIR);
        if !submodule.exists() && !events.exists() {
            return Err(CeError::NotBannerLordModule(root));
        }

        let dir_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let name = if submodule.exists() {
            let descriptor = read_submodule(&submodule)?;
            if !descriptor.depends_on_base {
                return Err(CeError::NotCeSubmodule(root));
            }
            descriptor.name.unwrap_or(dir_name)
        } else {
            dir_name
        };
        tracing::debug!("[ModulePath::open] accepted module '{}' at {:?}", name, root);
        Ok(ModulePath { root, name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declared submodule name, or the directory name when there is no descriptor.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join(EVENTS_DIR)
    }

    /// `Events/*.xml`, sorted by file name. Subdirectories are not searched.
    pub fn events_files(&self) -> Result<Vec<PathBuf>, CeError> {
        collect_files(&self.events_dir(), Some(1), "xml")
    }

    /// `Images/**/*.png`, sorted by path.
    pub fn image_files(&self) -> Result<Vec<PathBuf>, CeError> {
        collect_files(&self.root.join(IMAGES_DIR), None, "png")
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

struct Submodule {
    name: Option<String>,
    depends_on_base: bool,
}

fn read_submodule(path: &Path) -> Result<Submodule, CeError> {
    let text = fs::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| CeError::XmlParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = doc
        .descendants()
        .find(|node| node.has_tag_name("Name"))
        .and_then(|node| node.attribute("value"))
        .map(str::to_string);
    let depends_on_base = doc
        .descendants()
        .filter(|node| node.has_tag_name("DependedModules"))
        .flat_map(|node| node.children())
        .filter(|node| node.has_tag_name("DependedModule"))
        .any(|node| node.attribute("Id") == Some(REQUIRED_MODULE_ID));
    Ok(Submodule {
        name,
        depends_on_base,
    })
}

fn collect_files(
    dir: &Path,
    max_depth: Option<usize>,
    extension: &str,
) -> Result<Vec<PathBuf>, CeError> {
    fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
    }
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }
    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
