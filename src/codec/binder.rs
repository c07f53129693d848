//! Maps validated `CEEvent` object trees onto [`Event`] records.

use std::collections::BTreeMap;

use crate::{
    codec::element::RawElement,
    error::CeError,
    properties::{
        Background, Event, EventOption, Progression, ReferenceField, ReferenceKind,
        ReferenceShape, Requirement, TimedEvent, TriggerEvent,
    },
};

/// Turns one top-level element into an [`Event`].
///
/// Implementations must be pure: provenance (`xml_source`, `xml_file`) is attached by the caller
/// after binding, so a binder never sees file paths.
pub trait Bind: Sync {
    fn bind(&self, element: &RawElement) -> Result<Event, CeError>;
}

impl<F> Bind for F
where
    F: Fn(&RawElement) -> Result<Event, CeError> + Sync,
{
    fn bind(&self, element: &RawElement) -> Result<Event, CeError> {
        self(element)
    }
}

/// The binder for the `CEEvent` element layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventBinder;

impl Bind for EventBinder {
    fn bind(&self, element: &RawElement) -> Result<Event, CeError> {
        let name = element
            .child("Name")
            .map(|name| name.text.trim())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CeError::MissingField {
                element: element.name.clone(),
                field: "Name".to_string(),
            })?;

        let mut event = Event::new(name);
        for child in &element.children {
            let text = || Some(child.text.clone());
            match child.name.as_str() {
                "Name" => {}
                "Text" => event.text = text(),
                "BackgroundName" => event.background_name = text(),
                "NotificationName" => event.notification_name = text(),
                "SoundName" => event.sound_name = text(),
                "OrderToCall" => event.order_to_call = text(),
                "WeightedChanceOfOccuring" => event.weighted_chance_of_occuring = text(),
                "CanOnlyHappenNrOfTimes" => event.can_only_happen_nr_of_times = text(),
                "BackgroundAnimationSpeed" => event.background_animation_speed = text(),
                "ReqCustomCode" => event.req_custom_code = Some(parse_bool(&child.text)),
                "SexualContent" => event.sexual_content = Some(parse_bool(&child.text)),
                "MultipleRestrictedListOfFlags" => {
                    event.restricted_flags = Some(texts(child, "RestrictedListOfFlags"))
                }
                "MultipleListOfCustomFlags" => {
                    event.custom_flags = Some(texts(child, "CustomFlag"))
                }
                "Backgrounds" => {
                    event.backgrounds = Some(
                        child
                            .children_named("Background")
                            .map(bind_background)
                            .collect(),
                    )
                }
                "BackgroundAnimation" => {
                    event.background_animation = Some(
                        child
                            .children
                            .iter()
                            .map(|frame| frame.text.trim().to_string())
                            .collect(),
                    )
                }
                "Options" => event.options = Some(bind_options(child, "Option")?),
                "MenuOptions" => event.menu_options = Some(bind_options(child, "MenuOption")?),
                "ProgressEvent" => event.progress_event = Some(bind_timed(child)),
                "DelayEvent" => event.delay_event = Some(bind_timed(child)),
                _ => bind_extra(
                    child,
                    &mut event.references,
                    &mut event.fields,
                    &mut event.sections,
                )?,
            }
        }
        Ok(event)
    }
}

fn bind_options(container: &RawElement, item: &str) -> Result<Vec<EventOption>, CeError> {
    container
        .children_named(item)
        .map(bind_option)
        .collect::<Result<Vec<_>, _>>()
}

fn bind_option(element: &RawElement) -> Result<EventOption, CeError> {
    let mut option = EventOption::default();
    for child in &element.children {
        match child.name.as_str() {
            "Order" => option.order = Some(child.text.trim().to_string()),
            "OptionText" => option.option_text = Some(child.text.clone()),
            "MultipleRestrictedListOfConsequences" => {
                option.consequences = Some(texts(child, "RestrictedListOfConsequences"))
            }
            "TriggerEventName" => option.trigger_event_name = Some(child.text.clone()),
            "TriggerEvents" => option.trigger_events = Some(bind_triggers(child)),
            _ => bind_extra(
                child,
                &mut option.references,
                &mut option.fields,
                &mut option.sections,
            )?,
        }
    }
    Ok(option)
}

/// Sorts a field that has no dedicated slot into references, simple fields or raw sections.
fn bind_extra(
    child: &RawElement,
    references: &mut BTreeMap<ReferenceKind, ReferenceField>,
    fields: &mut BTreeMap<String, String>,
    sections: &mut Vec<RawElement>,
) -> Result<(), CeError> {
    if let Some(kind) = ReferenceKind::from_element_name(&child.name) {
        references.insert(kind, bind_reference(kind, child)?);
    } else if child.has_children() || !child.attributes.is_empty() {
        sections.push(child.clone());
    } else {
        fields.insert(child.name.clone(), child.text.clone());
    }
    Ok(())
}

fn bind_reference(kind: ReferenceKind, element: &RawElement) -> Result<ReferenceField, CeError> {
    if kind.shape() == ReferenceShape::Scalar {
        return Ok(match element.children.first() {
            Some(nested) => ReferenceField::Unrecognized {
                element: nested.name.clone(),
            },
            None => ReferenceField::Id(element.text.trim().to_string()),
        });
    }

    let record = kind.record_element();
    if let Some(stray) = element
        .children
        .iter()
        .find(|child| Some(child.name.as_str()) != record)
    {
        return Ok(ReferenceField::Unrecognized {
            element: stray.name.clone(),
        });
    }
    let id = |child: &RawElement| {
        child
            .attribute("Id")
            .map(|id| id.trim().to_string())
            .ok_or_else(|| CeError::MissingField {
                element: child.name.clone(),
                field: "Id".to_string(),
            })
    };
    let attr = |child: &RawElement, name: &str| child.attribute(name).map(str::to_string);

    Ok(match kind.shape() {
        ReferenceShape::Requirements => ReferenceField::Required(
            element
                .children
                .iter()
                .map(|child| -> Result<Requirement, CeError> {
                    Ok(Requirement {
                        id: id(child)?,
                        min: attr(child, "Min"),
                        max: attr(child, "Max"),
                        reference: attr(child, "Ref"),
                    })
                })
                .collect::<Result<_, CeError>>()?,
        ),
        _ => ReferenceField::ToLevel(
            element
                .children
                .iter()
                .map(|child| -> Result<Progression, CeError> {
                    Ok(Progression {
                        id: id(child)?,
                        by_level: attr(child, "ByLevel"),
                        by_xp: attr(child, "ByXP"),
                        reference: attr(child, "Ref"),
                    })
                })
                .collect::<Result<_, CeError>>()?,
        ),
    })
}

fn bind_triggers(element: &RawElement) -> Vec<TriggerEvent> {
    element
        .children_named("TriggerEvent")
        .map(|trigger| TriggerEvent {
            event_name: child_text(trigger, "EventName"),
            event_weight: child_text(trigger, "EventWeight"),
            event_use_conditions: child_text(trigger, "EventUseConditions"),
        })
        .collect()
}

fn bind_timed(element: &RawElement) -> TimedEvent {
    TimedEvent {
        time_to_take: child_text(element, "TimeToTake"),
        trigger_event_name: child_text(element, "TriggerEventName"),
        trigger_events: element.child("TriggerEvents").map(bind_triggers),
    }
}

fn bind_background(element: &RawElement) -> Background {
    Background {
        name: element.attribute("Name").map(str::to_string),
        weight: element.attribute("Weight").map(str::to_string),
        use_conditions: element.attribute("UseConditions").map(str::to_string),
    }
}

fn child_text(element: &RawElement, name: &str) -> Option<String> {
    element.child(name).map(|child| child.text.clone())
}

fn texts(element: &RawElement, item: &str) -> Vec<String> {
    element
        .children_named(item)
        .map(|child| child.text.trim().to_string())
        .collect()
}

fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{event_element, option_element};

    #[test]
    fn binds_core_fields_and_keeps_absent_distinct_from_empty() {
        let element = event_element("  Intro ")
            .with_text_child("Text", "")
            .with_text_child("SexualContent", "false")
            .with_child(
                RawElement::new("MultipleRestrictedListOfFlags")
                    .with_text_child("RestrictedListOfFlags", "Captor")
                    .with_text_child("RestrictedListOfFlags", "WaitingMenu"),
            );
        let event = EventBinder.bind(&element).unwrap();

        assert_eq!(event.name, "Intro");
        assert_eq!(event.text.as_deref(), Some(""));
        assert_eq!(event.background_name, None);
        assert_eq!(event.sexual_content, Some(false));
        assert_eq!(
            event.restricted_flags,
            Some(vec!["Captor".to_string(), "WaitingMenu".to_string()])
        );
        assert!(event.options.is_none());
        assert!(event.xml_source.is_none() && event.xml_file.is_none());
    }

    #[test]
    fn missing_name_is_reported() {
        let element = RawElement::new("CEEvent").with_text_child("Text", "hello");
        assert_eq!(
            EventBinder.bind(&element),
            Err(CeError::MissingField {
                element: "CEEvent".to_string(),
                field: "Name".to_string()
            })
        );
    }

    #[test]
    fn binds_options_with_triggers_and_references() {
        let option = option_element("0", "Go on")
            .with_text_child("TriggerEventName", "Capture")
            .with_child(
                RawElement::new("TriggerEvents").with_child(
                    RawElement::new("TriggerEvent")
                        .with_text_child("EventName", "Escape")
                        .with_text_child("EventWeight", "5"),
                ),
            )
            .with_text_child("ReqHeroSkill", " Riding ")
            .with_child(
                RawElement::new("SkillsToLevel").with_child(
                    RawElement::new("Skill")
                        .with_attribute("Id", "Riding")
                        .with_attribute("ByXP", "20"),
                ),
            )
            .with_text_child("GoldTotal", "-100");
        let element = event_element("Intro")
            .with_child(RawElement::new("Options").with_child(option));
        let event = EventBinder.bind(&element).unwrap();

        let options = event.options.as_ref().unwrap();
        assert_eq!(options.len(), 1);
        let opt = &options[0];
        assert_eq!(opt.order.as_deref(), Some("0"));
        assert_eq!(
            opt.references.get(&ReferenceKind::ReqHeroSkill),
            Some(&ReferenceField::Id("Riding".to_string()))
        );
        assert_eq!(
            opt.references.get(&ReferenceKind::SkillsToLevel),
            Some(&ReferenceField::ToLevel(vec![Progression {
                id: "Riding".to_string(),
                by_xp: Some("20".to_string()),
                ..Default::default()
            }]))
        );
        assert_eq!(opt.fields.get("GoldTotal").map(String::as_str), Some("-100"));
        assert_eq!(
            event.outbound_events().collect::<Vec<_>>(),
            ["Capture", "Escape"]
        );
    }

    #[test]
    fn unexpected_container_shape_is_kept_as_unrecognized() {
        let element = event_element("Intro").with_child(
            RawElement::new("SkillsRequired")
                .with_child(RawElement::new("Skill").with_attribute("Id", "Riding")),
        );
        let event = EventBinder.bind(&element).unwrap();
        assert_eq!(
            event.references.get(&ReferenceKind::SkillsRequired),
            Some(&ReferenceField::Unrecognized {
                element: "Skill".to_string()
            })
        );
    }

    #[test]
    fn closures_can_bind() {
        let binder = |element: &RawElement| -> Result<Event, CeError> {
            Ok(Event::new(element.name.clone()))
        };
        assert_eq!(
            binder.bind(&RawElement::new("Custom")).unwrap().name,
            "Custom"
        );
    }
}
