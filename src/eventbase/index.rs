use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{codec::skills::SkillRecord, error::CeError, paths::ModulePath};

/// Reverse lookup from a skill or trait identifier to the events referencing it.
///
/// Lists are append-only and keep duplicates: an event that references the same skill from two
/// places appears twice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkillSearchIndex {
    skills: BTreeMap<String, Vec<String>>,
}

impl SkillSearchIndex {
    pub fn new() -> Self {
        SkillSearchIndex::default()
    }

    /// Appends the record's event name once per identifier it carries.
    pub fn record(&mut self, record: &SkillRecord) {
        for skill_id in &record.skill_ids {
            self.append(skill_id, &record.event_name);
        }
    }

    pub fn append(&mut self, skill_id: &str, event_name: &str) {
        self.skills
            .entry(skill_id.to_string())
            .or_default()
            .push(event_name.to_string());
    }

    /// Event names referencing `skill_id`, in merge order. Empty for unknown identifiers.
    pub fn get(&self, skill_id: &str) -> &[String] {
        self.skills.get(skill_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Known identifiers in ascending order.
    pub fn skill_ids(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn clear(&mut self) {
        self.skills.clear();
    }
}

/// Background images keyed by file stem, collected from the `Images` directory of each module.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageIndex {
    images: BTreeMap<String, PathBuf>,
}

impl ImageIndex {
    pub fn new() -> Self {
        ImageIndex::default()
    }

    /// Adds every `Images/**/*.png` of `module`. Keys already present are replaced with a warning,
    /// so modules scanned later override earlier ones. Returns the number of images found.
    pub fn scan_module(&mut self, module: &ModulePath) -> Result<usize, CeError> {
        let images = module.image_files()?;
        for image in &images {
            let Some(key) = image.file_stem().map(|stem| stem.to_string_lossy().into_owned())
            else {
                continue;
            };
            if self.images.contains_key(&key) {
                tracing::warn!(
                    "Override of key '{}' with file of module {}.",
                    key,
                    module.name()
                );
            }
            self.images.insert(key, image.clone());
        }
        tracing::debug!(
            "[ImageIndex::scan_module] {}: {} images",
            module.name(),
            images.len()
        );
        Ok(images.len())
    }

    pub fn insert(&mut self, key: impl Into<String>, path: PathBuf) -> Option<PathBuf> {
        self.images.insert(key.into(), path)
    }

    /// Image for a `BackgroundName` value.
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.images.get(key).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}
