//! Owned object trees produced by schema validation.
//!
//! A validated document is converted once into [`RawElement`] trees so that binding never has to
//! look at the XML text again. Each top-level element keeps its exact source text in a
//! [`BoundElement`] for later re-display.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// One XML element: local name, unqualified attributes, character content, element children.
///
/// `text` is empty when the element carries no character data. Whitespace-only text between
/// child elements is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn new(name: impl Into<String>) -> Self {
        RawElement {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: RawElement) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for a child that only carries text, e.g. `<Name>Intro</Name>`.
    pub fn with_text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_child(RawElement::new(name).with_text(text))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&RawElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub(crate) fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut element = RawElement::new(node.tag_name().name());
        for attr in node.attributes() {
            if attr.namespace().is_none() {
                element
                    .attributes
                    .insert(attr.name().to_string(), attr.value().to_string());
            }
        }
        for child in node.children() {
            if child.is_element() {
                element.children.push(RawElement::from_node(child));
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    element.text.push_str(text);
                }
            }
        }
        if element.has_children() && element.text.trim().is_empty() {
            element.text.clear();
        }
        element
    }
}

/// A top-level element of a validated document together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundElement {
    element: RawElement,
    xml_source: String,
}

impl BoundElement {
    pub fn new(element: RawElement, xml_source: String) -> Self {
        BoundElement {
            element,
            xml_source,
        }
    }

    pub fn element(&self) -> &RawElement {
        &self.element
    }

    /// Serialized form of this element exactly as it appeared in the source file.
    pub fn xml_source(&self) -> &str {
        &self.xml_source
    }

    pub fn into_parts(self) -> (RawElement, String) {
        (self.element, self.xml_source)
    }
}

/// Every top-level element of one validated file. Validation is atomic per file: either the
/// whole document conforms and all of its elements are present here, or no document exists.
#[derive(Debug, Clone)]
pub struct BoundDocument {
    path: PathBuf,
    root: String,
    elements: Vec<BoundElement>,
}

impl BoundDocument {
    pub(crate) fn new(path: PathBuf, root: String, elements: Vec<BoundElement>) -> Self {
        BoundDocument {
            path,
            root,
            elements,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the document element, `CEEvents` for event files.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundElement> {
        self.elements.iter()
    }
}

impl IntoIterator for BoundDocument {
    type Item = BoundElement;
    type IntoIter = std::vec::IntoIter<BoundElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}
