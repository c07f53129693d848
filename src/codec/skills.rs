//! Collects skill and trait identifiers referenced by an event for the reverse search index.

use serde::{Deserialize, Serialize};

use crate::{
    error::CeError,
    properties::{Event, EventOption, ReferenceField, ReferenceKind},
};

/// Identifiers found in one reference field, attributed to the event that owns the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub skill_ids: Vec<String>,
    pub event_name: String,
}

/// Anything carrying the fixed set of [`ReferenceKind`] fields.
pub trait SkillSource {
    fn reference(&self, kind: ReferenceKind) -> Option<&ReferenceField>;

    /// Nested choices whose references are attributed to the same owning event.
    fn nested_options(&self) -> Box<dyn Iterator<Item = &EventOption> + '_> {
        Box::new(std::iter::empty())
    }
}

impl SkillSource for Event {
    fn reference(&self, kind: ReferenceKind) -> Option<&ReferenceField> {
        self.references.get(&kind)
    }

    fn nested_options(&self) -> Box<dyn Iterator<Item = &EventOption> + '_> {
        Box::new(self.all_options())
    }
}

impl SkillSource for EventOption {
    fn reference(&self, kind: ReferenceKind) -> Option<&ReferenceField> {
        self.references.get(&kind)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SkillIndexExtractor;

impl SkillIndexExtractor {
    /// Walks the source's own reference fields in [`ReferenceKind::ALL`] order, then every nested
    /// `Option` and `MenuOption` once, in order. One record is produced per present field.
    pub fn extract<S: SkillSource + ?Sized>(
        &self,
        source: &S,
        owning_event_name: &str,
    ) -> Result<Vec<SkillRecord>, CeError> {
        let mut records = Vec::new();
        self.extract_fields(source, owning_event_name, &mut records)?;
        for option in source.nested_options() {
            self.extract_fields(option, owning_event_name, &mut records)?;
        }
        Ok(records)
    }

    fn extract_fields<S: SkillSource + ?Sized>(
        &self,
        source: &S,
        owning_event_name: &str,
        records: &mut Vec<SkillRecord>,
    ) -> Result<(), CeError> {
        for kind in ReferenceKind::ALL {
            if let Some(field) = source.reference(kind) {
                records.push(SkillRecord {
                    skill_ids: skill_ids(field)?,
                    event_name: owning_event_name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Identifier values of one field. Unknown container layouts fail instead of being skipped so
/// the index can never silently lose references.
pub fn skill_ids(field: &ReferenceField) -> Result<Vec<String>, CeError> {
    match field {
        ReferenceField::Id(id) => Ok(vec![id.clone()]),
        ReferenceField::Required(requirements) => {
            Ok(requirements.iter().map(|r| r.id.clone()).collect())
        }
        ReferenceField::ToLevel(progressions) => {
            Ok(progressions.iter().map(|p| p.id.clone()).collect())
        }
        ReferenceField::Unrecognized { element } => {
            Err(CeError::UnhandledElementType(element.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{Progression, Requirement};

    fn riding_option() -> EventOption {
        let mut option = EventOption::default();
        option.references.insert(
            ReferenceKind::SkillsRequired,
            ReferenceField::Required(vec![Requirement {
                id: "Riding".to_string(),
                min: Some("20".to_string()),
                ..Default::default()
            }]),
        );
        option.references.insert(
            ReferenceKind::SkillsToLevel,
            ReferenceField::ToLevel(vec![Progression {
                id: "Riding".to_string(),
                by_xp: Some("10".to_string()),
                ..Default::default()
            }]),
        );
        option
    }

    #[test]
    fn option_references_are_attributed_to_the_owning_event() {
        let mut event = Event::new("Intro");
        event.references.insert(
            ReferenceKind::ReqCaptorTrait,
            ReferenceField::Id("Mercy".to_string()),
        );
        event.options = Some(vec![riding_option()]);
        event.menu_options = Some(vec![{
            let mut menu = EventOption::default();
            menu.references.insert(
                ReferenceKind::ReqHeroSkill,
                ReferenceField::Id("Charm".to_string()),
            );
            menu
        }]);

        let records = SkillIndexExtractor.extract(&event, &event.name).unwrap();
        let ids: Vec<Vec<String>> = records.iter().map(|r| r.skill_ids.clone()).collect();
        assert_eq!(
            ids,
            vec![
                vec!["Mercy".to_string()],
                vec!["Riding".to_string()],
                vec!["Riding".to_string()],
                vec!["Charm".to_string()],
            ]
        );
        assert!(records.iter().all(|r| r.event_name == "Intro"));
    }

    #[test]
    fn options_can_be_extracted_alone() {
        let records = SkillIndexExtractor
            .extract(&riding_option(), "Capture")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_name, "Capture");
    }

    #[test]
    fn unrecognized_fields_fail_fast() {
        let mut event = Event::new("Intro");
        event.references.insert(
            ReferenceKind::SkillsToLevel,
            ReferenceField::Unrecognized {
                element: "SkillRequired".to_string(),
            },
        );
        assert_eq!(
            SkillIndexExtractor.extract(&event, "Intro"),
            Err(CeError::UnhandledElementType("SkillRequired".to_string()))
        );
    }
}
