//! Second pass over a fully ingested registry: turns trigger names into ancestry edges.

use crate::{codec::diagnostic::EventAncestryError, eventbase::IngestionSession};

/// Links every event to the events its options trigger.
///
/// Must run after all ingestion for the session is done. A name that is only defined later in a
/// batch, or by another module, is an ordinary forward reference and resolves here; only names
/// absent from the complete registry are reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct AncestryResolver;

impl AncestryResolver {
    /// Returns the number of unresolved references found in this pass. Each one is also
    /// appended to `session.ancestry_errors`.
    pub fn resolve(&self, session: &mut IngestionSession) -> usize {
        let IngestionSession {
            registry,
            ancestry,
            ancestry_errors,
            ..
        } = session;

        let mut missing = 0;
        for name in registry.names() {
            let Ok(event) = registry.lookup(name) else {
                continue;
            };
            ancestry.register(&event.name);
            for target in event.outbound_events().map(str::trim) {
                match registry.lookup(target) {
                    Ok(child) => {
                        ancestry.set_child(&event.name, &child.name);
                    }
                    Err(not_found) => {
                        let error = EventAncestryError {
                            source_event: event.name.clone(),
                            missing_child: not_found.name,
                            source_file: event.xml_file.clone(),
                        };
                        tracing::error!("{}", error);
                        ancestry_errors.push(error);
                        missing += 1;
                    }
                }
            }
        }
        tracing::debug!(
            "[AncestryResolver::resolve] {} nodes, {} unresolved references",
            ancestry.len(),
            missing
        );
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{Event, EventOption, TriggerEvent};

    fn event(name: &str, targets: &[&str]) -> Event {
        let mut event = Event::new(name);
        event.options = Some(
            targets
                .iter()
                .map(|target| EventOption {
                    trigger_event_name: Some(target.to_string()),
                    ..Default::default()
                })
                .collect(),
        );
        event
    }

    #[test]
    fn forward_references_resolve() {
        let mut session = IngestionSession::new();
        session.registry.insert(event("Intro", &["Capture"]));
        session.registry.insert(event("Capture", &[]));

        assert_eq!(AncestryResolver.resolve(&mut session), 0);
        assert_eq!(
            session.ancestry.get("Intro").unwrap().children_names(),
            ["Capture"]
        );
        assert_eq!(
            session.ancestry.get("Capture").unwrap().parents_names(),
            ["Intro"]
        );
    }

    #[test]
    fn dangling_reference_does_not_stop_siblings() {
        let mut session = IngestionSession::new();
        let mut intro = event("Intro", &["Nowhere", "  Capture  "]);
        intro.xml_file = Some("a.xml".into());
        session.registry.insert(intro);
        session.registry.insert(event("Capture", &[]));

        assert_eq!(AncestryResolver.resolve(&mut session), 1);
        assert_eq!(
            session.ancestry_errors,
            vec![EventAncestryError {
                source_event: "Intro".to_string(),
                missing_child: "Nowhere".to_string(),
                source_file: Some("a.xml".into()),
            }]
        );
        assert_eq!(
            session.ancestry.get("Intro").unwrap().children_names(),
            ["Capture"]
        );
    }

    #[test]
    fn trigger_lists_and_menu_options_count() {
        let mut session = IngestionSession::new();
        let mut hub = Event::new("Hub");
        hub.menu_options = Some(vec![EventOption {
            trigger_events: Some(vec![
                TriggerEvent {
                    event_name: Some("Left".to_string()),
                    ..Default::default()
                },
                TriggerEvent {
                    event_name: Some("Right".to_string()),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }]);
        session.registry.insert(hub);
        session.registry.insert(Event::new("Left"));
        session.registry.insert(Event::new("Right"));
        session.registry.insert(Event::new("Unrelated"));

        assert_eq!(AncestryResolver.resolve(&mut session), 0);
        assert_eq!(
            session.ancestry.get("Hub").unwrap().children_names(),
            ["Left", "Right"]
        );
        assert_eq!(session.ancestry.len(), 4);
        assert!(!session.ancestry.get("Unrelated").unwrap().is_graphable());
    }

    #[test]
    fn resolving_twice_adds_no_edges() {
        let mut session = IngestionSession::new();
        session.registry.insert(event("Intro", &["Capture", "Capture"]));
        session.registry.insert(event("Capture", &["Gone"]));

        assert_eq!(AncestryResolver.resolve(&mut session), 1);
        let first = session.ancestry.clone();
        assert_eq!(AncestryResolver.resolve(&mut session), 1);
        assert_eq!(session.ancestry, first);
        assert_eq!(session.ancestry_errors.len(), 2);
        assert_eq!(
            session.ancestry.get("Capture").unwrap().parents_names(),
            ["Intro"]
        );
    }
}
