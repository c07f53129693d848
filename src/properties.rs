//! Typed event records produced by [`EventBinder`](crate::codec::EventBinder).
//!
//! Absent optional fields are `None`. A field that is present in the source but empty is
//! `Some(String::new())` or `Some(vec![])`, so consumers can tell "omitted" from "empty".

use std::{collections::BTreeMap, fmt, path::PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::element::RawElement;

/// Inline expressions such as `{=HERO_NAME}` embedded in option text.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{=[^}]+\}").unwrap());

/// Fields known to carry a skill or trait identifier. The search index walks exactly these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    ReqCaptorSkill,
    ReqHeroSkill,
    SkillToLevel,
    SkillsRequired,
    SkillsToLevel,
    ReqCaptorTrait,
    ReqHeroTrait,
    TraitToLevel,
    TraitsRequired,
    TraitsToLevel,
}

/// The container layout a reference field is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    /// Text content is the identifier, e.g. `<ReqHeroSkill>Riding</ReqHeroSkill>`.
    Scalar,
    /// `{id, min, max}` records, e.g. `<SkillsRequired><SkillRequired Id=".."/></SkillsRequired>`.
    Requirements,
    /// `{id, by_level, by_xp}` records, e.g. `<SkillsToLevel><Skill Id=".."/></SkillsToLevel>`.
    Progressions,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 10] = [
        ReferenceKind::ReqCaptorSkill,
        ReferenceKind::ReqHeroSkill,
        ReferenceKind::SkillToLevel,
        ReferenceKind::SkillsRequired,
        ReferenceKind::SkillsToLevel,
        ReferenceKind::ReqCaptorTrait,
        ReferenceKind::ReqHeroTrait,
        ReferenceKind::TraitToLevel,
        ReferenceKind::TraitsRequired,
        ReferenceKind::TraitsToLevel,
    ];

    pub fn element_name(&self) -> &'static str {
        match self {
            ReferenceKind::ReqCaptorSkill => "ReqCaptorSkill",
            ReferenceKind::ReqHeroSkill => "ReqHeroSkill",
            ReferenceKind::SkillToLevel => "SkillToLevel",
            ReferenceKind::SkillsRequired => "SkillsRequired",
            ReferenceKind::SkillsToLevel => "SkillsToLevel",
            ReferenceKind::ReqCaptorTrait => "ReqCaptorTrait",
            ReferenceKind::ReqHeroTrait => "ReqHeroTrait",
            ReferenceKind::TraitToLevel => "TraitToLevel",
            ReferenceKind::TraitsRequired => "TraitsRequired",
            ReferenceKind::TraitsToLevel => "TraitsToLevel",
        }
    }

    pub fn from_element_name(name: &str) -> Option<ReferenceKind> {
        ReferenceKind::ALL
            .into_iter()
            .find(|kind| kind.element_name() == name)
    }

    pub fn shape(&self) -> ReferenceShape {
        match self {
            ReferenceKind::SkillsRequired | ReferenceKind::TraitsRequired => {
                ReferenceShape::Requirements
            }
            ReferenceKind::SkillsToLevel | ReferenceKind::TraitsToLevel => {
                ReferenceShape::Progressions
            }
            _ => ReferenceShape::Scalar,
        }
    }

    /// Element name of one record inside a container field.
    pub fn record_element(&self) -> Option<&'static str> {
        match self {
            ReferenceKind::SkillsRequired => Some("SkillRequired"),
            ReferenceKind::TraitsRequired => Some("TraitRequired"),
            ReferenceKind::SkillsToLevel => Some("Skill"),
            ReferenceKind::TraitsToLevel => Some("Trait"),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub min: Option<String>,
    pub max: Option<String>,
    /// Which party the requirement applies to (`Hero` or `Captor`).
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub id: String,
    pub by_level: Option<String>,
    pub by_xp: Option<String>,
    pub reference: Option<String>,
}

/// Bound value of one [`ReferenceKind`] field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceField {
    Id(String),
    Required(Vec<Requirement>),
    ToLevel(Vec<Progression>),
    /// The element did not have the layout its field name implies. `element` names the
    /// offending element.
    Unrecognized { element: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_name: Option<String>,
    pub event_weight: Option<String>,
    pub event_use_conditions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    pub name: Option<String>,
    pub weight: Option<String>,
    pub use_conditions: Option<String>,
}

/// `ProgressEvent` and `DelayEvent` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub time_to_take: Option<String>,
    pub trigger_event_name: Option<String>,
    pub trigger_events: Option<Vec<TriggerEvent>>,
}

/// One `Option` or `MenuOption` of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOption {
    pub order: Option<String>,
    pub option_text: Option<String>,
    pub consequences: Option<Vec<String>>,
    pub trigger_event_name: Option<String>,
    pub trigger_events: Option<Vec<TriggerEvent>>,
    pub references: BTreeMap<ReferenceKind, ReferenceField>,
    /// Remaining simple-content fields keyed by element name (requirements and effects).
    pub fields: BTreeMap<String, String>,
    /// Remaining complex sections, kept as parsed.
    pub sections: Vec<RawElement>,
}

impl EventOption {
    /// Option text with `{=...}` placeholders removed.
    pub fn plain_text(&self) -> Option<String> {
        self.option_text
            .as_deref()
            .map(|text| PLACEHOLDER.replace_all(text, "").into_owned())
    }

    /// Names of the events this option may trigger, untrimmed and in declaration order.
    pub fn outbound_events(&self) -> impl Iterator<Item = &str> {
        self.trigger_event_name.as_deref().into_iter().chain(
            self.trigger_events
                .iter()
                .flatten()
                .filter_map(|trigger| trigger.event_name.as_deref()),
        )
    }
}

/// Display category derived from the restricted flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventRole {
    Captor,
    Captive,
    Random,
}

impl EventRole {
    fn from_flag(flag: &str) -> Option<EventRole> {
        match flag.trim() {
            "Captor" => Some(EventRole::Captor),
            "Captive" => Some(EventRole::Captive),
            "Random" => Some(EventRole::Random),
            _ => None,
        }
    }
}

/// One narrative event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub text: Option<String>,
    pub background_name: Option<String>,
    pub notification_name: Option<String>,
    pub sound_name: Option<String>,
    pub order_to_call: Option<String>,
    pub weighted_chance_of_occuring: Option<String>,
    pub can_only_happen_nr_of_times: Option<String>,
    pub background_animation_speed: Option<String>,
    pub req_custom_code: Option<bool>,
    pub sexual_content: Option<bool>,
    pub restricted_flags: Option<Vec<String>>,
    pub custom_flags: Option<Vec<String>>,
    pub backgrounds: Option<Vec<Background>>,
    pub background_animation: Option<Vec<String>>,
    pub options: Option<Vec<EventOption>>,
    pub menu_options: Option<Vec<EventOption>>,
    pub progress_event: Option<TimedEvent>,
    pub delay_event: Option<TimedEvent>,
    pub references: BTreeMap<ReferenceKind, ReferenceField>,
    pub fields: BTreeMap<String, String>,
    pub sections: Vec<RawElement>,
    /// Source text of the element this event was bound from. Set after binding.
    pub xml_source: Option<String>,
    /// File the event was loaded from. Set after binding.
    pub xml_file: Option<PathBuf>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_provenance(&mut self, xml_source: String, xml_file: PathBuf) {
        self.xml_source = Some(xml_source);
        self.xml_file = Some(xml_file);
    }

    /// `Options` followed by `MenuOptions`.
    pub fn all_options(&self) -> impl Iterator<Item = &EventOption> {
        self.options
            .iter()
            .flatten()
            .chain(self.menu_options.iter().flatten())
    }

    /// Every event name referenced by the trigger fields of this event's options, in order.
    pub fn outbound_events(&self) -> impl Iterator<Item = &str> {
        self.all_options().flat_map(|option| option.outbound_events())
    }

    /// The first of `Captor`, `Captive` or `Random` found among the restricted flags.
    pub fn role(&self) -> Option<EventRole> {
        self.restricted_flags
            .iter()
            .flatten()
            .find_map(|flag| EventRole::from_flag(flag))
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.restricted_flags
            .iter()
            .flatten()
            .any(|value| value.trim() == flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, direct: Option<&str>, triggers: &[&str]) -> EventOption {
        EventOption {
            option_text: Some(text.to_string()),
            trigger_event_name: direct.map(str::to_string),
            trigger_events: (!triggers.is_empty()).then(|| {
                triggers
                    .iter()
                    .map(|name| TriggerEvent {
                        event_name: Some(name.to_string()),
                        ..Default::default()
                    })
                    .collect()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn outbound_events_follow_option_order() {
        let mut event = Event::new("Intro");
        event.options = Some(vec![
            option("Run", Some("Escape"), &[]),
            option("Fight", None, &["Capture", " Defeat "]),
        ]);
        event.menu_options = Some(vec![option("Wait", Some("Wait_Event"), &[])]);

        let outbound: Vec<&str> = event.outbound_events().collect();
        assert_eq!(outbound, ["Escape", "Capture", " Defeat ", "Wait_Event"]);
    }

    #[test]
    fn plain_text_strips_placeholders() {
        let opt = option("Ask {=HERO_NAME} about {=ITEM}.", None, &[]);
        assert_eq!(opt.plain_text().as_deref(), Some("Ask  about ."));
        assert_eq!(EventOption::default().plain_text(), None);
    }

    #[test]
    fn role_is_first_matching_flag() {
        let mut event = Event::new("Intro");
        assert_eq!(event.role(), None);
        event.restricted_flags = Some(vec![
            "WaitingMenu".to_string(),
            "Captive".to_string(),
            "Captor".to_string(),
        ]);
        assert_eq!(event.role(), Some(EventRole::Captive));
        assert!(event.has_flag("WaitingMenu"));
    }

    #[test]
    fn reference_kind_round_trips_element_names() {
        for kind in ReferenceKind::ALL {
            assert_eq!(ReferenceKind::from_element_name(kind.element_name()), Some(kind));
        }
        assert_eq!(ReferenceKind::from_element_name("ReqGoldAbove"), None);
        assert_eq!(
            ReferenceKind::TraitsToLevel.shape(),
            ReferenceShape::Progressions
        );
    }
}
