use std::collections::HashMap;

use crate::{
    codec::diagnostic::Override,
    error::EventNotFound,
    properties::Event,
};

/// Every ingested event keyed by name.
///
/// Inserting a name that is already present replaces the stored event ("last loaded wins"),
/// logs a warning and records an [`Override`]. Replacement is never an error: modules are expected
/// to override events of the modules they depend on.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
    events: HashMap<String, Event>,
    overrides: Vec<Override>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    /// Stores `event` under its name and returns the event it replaced, if any.
    pub fn insert(&mut self, event: Event) -> Option<Event> {
        if let Some(previous) = self.events.get(&event.name) {
            tracing::warn!(
                "Override of '{}' already present in registry. (trigger: {:?})",
                event.name,
                event.xml_file
            );
            self.overrides.push(Override {
                name: event.name.clone(),
                previous_file: previous.xml_file.clone(),
                new_file: event.xml_file.clone(),
            });
        }
        self.events.insert(event.name.clone(), event)
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    /// Like [`Self::get`], for callers that treat a missing event as a reportable outcome.
    pub fn lookup(&self, name: &str) -> Result<&Event, EventNotFound> {
        self.events.get(name).ok_or_else(|| EventNotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All event names in ascending order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Unordered iteration over every stored event.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// Events whose name contains `filter`, ignoring case, sorted by name. An empty filter
    /// matches everything.
    pub fn search(&self, filter: &str) -> Vec<&Event> {
        let needle = filter.to_lowercase();
        let mut found: Vec<&Event> = self
            .events
            .values()
            .filter(|event| event.name.to_lowercase().contains(&needle))
            .collect();
        found.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.overrides.clear();
    }
}
