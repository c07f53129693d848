//! Shared test utilities for event ingestion testing

use crate::{codec::element::RawElement, codec::schema::SchemaValidator};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Path of the schema shared with the integration tests
pub fn fixture_schema_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/CEEventsModal.xsd")
}

pub fn fixture_schema() -> SchemaValidator {
    SchemaValidator::from_file(fixture_schema_path()).unwrap()
}

/// A bare `<CEEvent>` object tree with only a name
pub fn event_element(name: &str) -> RawElement {
    RawElement::new("CEEvent").with_text_child("Name", name)
}

/// An `<Option>` object tree with its two required children
pub fn option_element(order: &str, text: &str) -> RawElement {
    RawElement::new("Option")
        .with_text_child("Order", order)
        .with_text_child("OptionText", text)
}

/// Serialized `<CEEvent>` with one option per trigger target.
pub fn event_xml(name: &str, triggers: &[&str]) -> String {
    let mut xml = format!(
        "  <CEEvent>\n    <Name>{name}</Name>\n    <Text>Text of {name}</Text>\n    \
         <MultipleRestrictedListOfFlags>\n      <RestrictedListOfFlags>Captive</RestrictedListOfFlags>\n    \
         </MultipleRestrictedListOfFlags>\n"
    );
    if !triggers.is_empty() {
        xml.push_str("    <Options>\n");
        for (order, target) in triggers.iter().enumerate() {
            xml.push_str(&format!(
                "      <Option>\n        <Order>{order}</Order>\n        \
                 <OptionText>Go to {target}</OptionText>\n        \
                 <TriggerEventName>{target}</TriggerEventName>\n      </Option>\n"
            ));
        }
        xml.push_str("    </Options>\n");
    }
    xml.push_str("  </CEEvent>\n");
    xml
}

/// Wraps serialized events into a `<CEEvents>` document.
pub fn events_document(events: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <CEEvents xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:noNamespaceSchemaLocation=\"CEEventsModal.xsd\">\n{}</CEEvents>\n",
        events.concat()
    )
}

/// Writes a `SubModule.xml` declaring the given dependencies into `dir`.
pub fn write_submodule(dir: &Path, name: &str, dependencies: &[&str]) {
    let depended: String = dependencies
        .iter()
        .map(|id| format!("    <DependedModule Id=\"{id}\" DependentVersion=\"v1.0.0\"/>\n"))
        .collect();
    let text = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Module>\n  <Name value=\"{name}\"/>\n  \
         <Id value=\"{name}\"/>\n  <DependedModules>\n{depended}  </DependedModules>\n</Module>\n"
    );
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("SubModule.xml"), text).unwrap();
}
