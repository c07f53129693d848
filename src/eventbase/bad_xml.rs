use std::path::Path;

use crate::codec::diagnostic::BadXml;

/// Files rejected during ingestion, in the order their results were merged.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BadXmlCollection {
    entries: Vec<BadXml>,
}

impl BadXmlCollection {
    pub fn new() -> Self {
        BadXmlCollection::default()
    }

    pub fn push(&mut self, entry: BadXml) {
        tracing::error!("{}", entry);
        self.entries.push(entry);
    }

    pub fn amount(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BadXml> {
        self.entries.iter()
    }

    /// Entries ordered by file path. The sort is stable, so entries for the same file keep
    /// their insertion order.
    pub fn sorted_by_file(&self) -> Vec<&BadXml> {
        let mut sorted: Vec<&BadXml> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.file.cmp(&b.file));
        sorted
    }

    /// Consecutive runs of [`Self::sorted_by_file`] sharing a file.
    pub fn grouped_by_file(&self) -> Vec<(&Path, Vec<&BadXml>)> {
        let mut groups: Vec<(&Path, Vec<&BadXml>)> = Vec::new();
        for entry in self.sorted_by_file() {
            match groups.last_mut() {
                Some((file, group)) if *file == entry.file() => group.push(entry),
                _ => groups.push((entry.file(), vec![entry])),
            }
        }
        groups
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a BadXmlCollection {
    type Item = &'a BadXml;
    type IntoIter = std::slice::Iter<'a, BadXml>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
