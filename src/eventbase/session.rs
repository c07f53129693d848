use crate::{
    codec::diagnostic::EventAncestryError,
    eventbase::{Ancestry, BadXmlCollection, EventRegistry, ImageIndex, SkillSearchIndex},
};

/// Owns every container a load run writes to.
///
/// Nothing is reset implicitly: ingesting into a session that already holds events merges into
/// them. Call [`Self::reset`] (or one of the `init_*` methods) to start a new run.
#[derive(Debug, Default, Clone)]
pub struct IngestionSession {
    pub registry: EventRegistry,
    pub skills: SkillSearchIndex,
    pub bad_xml: BadXmlCollection,
    pub ancestry: Ancestry,
    pub ancestry_errors: Vec<EventAncestryError>,
    pub images: ImageIndex,
}

impl IngestionSession {
    pub fn new() -> Self {
        IngestionSession::default()
    }

    pub fn reset(&mut self) {
        self.init_registry();
        self.init_index();
        self.init_bad_xml();
        self.init_ancestry();
        self.init_images();
    }

    pub fn init_registry(&mut self) {
        self.registry.clear();
    }

    pub fn init_index(&mut self) {
        self.skills.clear();
    }

    pub fn init_bad_xml(&mut self) {
        self.bad_xml.clear();
    }

    /// Clears the graph and the recorded dangling references together.
    pub fn init_ancestry(&mut self) {
        self.ancestry.clear();
        self.ancestry_errors.clear();
    }

    pub fn init_images(&mut self) {
        self.images.clear();
    }
}
