//! XSD-driven validation of event documents.
//!
//! [`SchemaValidator`] compiles the subset of XML Schema that event schemas use into an in-memory
//! model, then validates documents against it with deterministic greedy matching. XSD's unique
//! particle attribution rule means a conforming schema never needs backtracking, so the first
//! particle that accepts a child element owns it.
//!
//! Supported constructs:
//!
//! - global and local `xs:element` (`type=`, anonymous types, `ref=`), `minOccurs`/`maxOccurs`
//! - `xs:complexType` with `xs:sequence`, `xs:all`, `xs:choice`, named `xs:group` refs, `xs:any`,
//!   `mixed`, `xs:simpleContent` and `xs:complexContent` derivation
//! - `xs:attribute`, `xs:attributeGroup` refs, `xs:anyAttribute`
//! - `xs:simpleType` restrictions with `xs:enumeration`, and `xs:list`
//!
//! Type and element names are matched by local name. Schema composition (`xs:include`,
//! `xs:import`, `xs:redefine`) is rejected.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use roxmltree::{Document, Node};

use crate::{
    codec::element::{BoundDocument, BoundElement, RawElement},
    error::CeError,
};

pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Guards recursion through named type derivations and group references.
const MAX_DEFINITION_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Occurs {
    min: u32,
    /// `None` is `unbounded`.
    max: Option<u32>,
}

impl Occurs {
    fn allows(&self, count: u32) -> bool {
        self.max.map_or(true, |max| count < max)
    }
}

#[derive(Debug, Clone)]
enum TypeRef {
    Builtin(String),
    Named(String),
    Complex(Box<ComplexType>),
    Simple(Box<SimpleType>),
    AnyType,
}

#[derive(Debug, Clone)]
enum ElementKind {
    Typed(TypeRef),
    /// Refers to the global element of the same name.
    Ref,
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    occurs: Occurs,
    kind: ElementKind,
}

#[derive(Debug, Clone)]
enum Content {
    Empty,
    Simple(TypeRef),
    Particles(Particle),
    Extension {
        base: TypeRef,
        particle: Option<Particle>,
    },
}

#[derive(Debug, Clone)]
struct ComplexType {
    content: Content,
    attributes: Vec<AttributeItem>,
    any_attribute: bool,
    mixed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compositor {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone)]
struct Group {
    compositor: Compositor,
    particles: Vec<Particle>,
    occurs: Occurs,
}

#[derive(Debug, Clone)]
enum Particle {
    Element(ElementDecl),
    Group(Group),
    GroupRef { name: String, occurs: Occurs },
    Any(Occurs),
}

#[derive(Debug, Clone)]
struct AttributeUse {
    name: String,
    required: bool,
    ty: TypeRef,
}

#[derive(Debug, Clone)]
enum AttributeItem {
    Attribute(AttributeUse),
    GroupRef(String),
}

#[derive(Debug, Clone)]
enum SimpleType {
    Restriction {
        base: TypeRef,
        enumeration: Vec<String>,
    },
    List {
        item: TypeRef,
    },
    Union,
}

/// A compiled schema. Immutable once loaded and shared by reference across ingestion workers.
#[derive(Debug)]
pub struct SchemaValidator {
    source: PathBuf,
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
    groups: HashMap<String, Group>,
    attribute_groups: HashMap<String, Vec<AttributeItem>>,
}

impl SchemaValidator {
    /// Loads and compiles the schema at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CeError> {
        let path = path.as_ref();
        tracing::debug!("[SchemaValidator::from_file] loading schema {:?}", path);
        let text = fs::read_to_string(path).map_err(|e| CeError::SchemaDefinition {
            path: path.to_path_buf(),
            reason: format!("unable to read schema file: {e}"),
        })?;
        SchemaValidator::parse(path, &text)
    }

    /// Compiles schema `text`. `source` is only used for error reporting.
    pub fn parse(source: impl Into<PathBuf>, text: &str) -> Result<Self, CeError> {
        let source = source.into();
        let definition_error = |reason: String| CeError::SchemaDefinition {
            path: source.clone(),
            reason,
        };
        let doc = Document::parse(text).map_err(|e| definition_error(e.to_string()))?;
        let root = doc.root_element();
        if xs_name(root) != Some("schema") {
            return Err(definition_error(format!(
                "root element '{}' is not xs:schema",
                root.tag_name().name()
            )));
        }

        let mut schema = SchemaValidator {
            source: source.clone(),
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
        };
        for child in root.children().filter(Node::is_element) {
            schema.compile_global(child).map_err(&definition_error)?;
        }
        if schema.elements.is_empty() {
            return Err(definition_error(
                "schema declares no global element".to_string(),
            ));
        }
        tracing::debug!(
            "[SchemaValidator::parse] {:?}: {} elements, {} complex types, {} simple types",
            source,
            schema.elements.len(),
            schema.complex_types.len(),
            schema.simple_types.len()
        );
        Ok(schema)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Names of the global elements a document may use as its root, sorted.
    pub fn root_elements(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.elements.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Reads, validates and binds the document at `path`. See [`Self::validate_str`].
    pub fn validate_and_bind<P: AsRef<Path>>(&self, path: P) -> Result<BoundDocument, CeError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CeError::XmlParse {
            path: path.to_path_buf(),
            message: format!("unable to read file: {e}"),
        })?;
        self.validate_str(path, &text)
    }

    /// Validates `text` as a whole and, only when it fully conforms, converts every top-level
    /// element of the document into a [`BoundElement`].
    pub fn validate_str<P: AsRef<Path>>(
        &self,
        path: P,
        text: &str,
    ) -> Result<BoundDocument, CeError> {
        let path = path.as_ref();
        let doc = Document::parse(text).map_err(|e| CeError::XmlParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let schema_error = |reason: String| CeError::Schema {
            path: path.to_path_buf(),
            reason,
        };

        let root = doc.root_element();
        let root_name = root.tag_name().name();
        let decl = self.elements.get(root_name).ok_or_else(|| {
            schema_error(format!(
                "No global element declaration for root element '{root_name}'"
            ))
        })?;
        let validation = Validation {
            schema: self,
            doc: &doc,
        };
        validation
            .validate_element(root, decl)
            .map_err(schema_error)?;

        let elements = root
            .children()
            .filter(Node::is_element)
            .map(|node| {
                let source = text.get(node.range()).unwrap_or_default().to_string();
                BoundElement::new(RawElement::from_node(node), source)
            })
            .collect();
        Ok(BoundDocument::new(
            path.to_path_buf(),
            root_name.to_string(),
            elements,
        ))
    }

    fn compile_global(&mut self, node: Node) -> Result<(), String> {
        match xs_name(node) {
            Some("element") => {
                let decl = parse_element(node)?;
                self.elements.insert(decl.name.clone(), decl);
            }
            Some("complexType") => {
                let name = required_attribute(node, "name")?;
                self.complex_types.insert(name, parse_complex(node)?);
            }
            Some("simpleType") => {
                let name = required_attribute(node, "name")?;
                self.simple_types.insert(name, parse_simple(node)?);
            }
            Some("group") => {
                let name = required_attribute(node, "name")?;
                let compositor = xs_children(node)
                    .find(|child| {
                        matches!(xs_name(*child), Some("sequence" | "choice" | "all"))
                    })
                    .ok_or_else(|| format!("group '{name}' has no compositor"))?;
                self.groups.insert(name, parse_group(compositor)?);
            }
            Some("attributeGroup") => {
                let name = required_attribute(node, "name")?;
                let mut items = Vec::new();
                for child in xs_children(node) {
                    match xs_name(child) {
                        Some("attribute") => {
                            if let Some(attribute) = parse_attribute(child)? {
                                items.push(AttributeItem::Attribute(attribute));
                            }
                        }
                        Some("attributeGroup") => items.push(AttributeItem::GroupRef(
                            local_name(&required_attribute(child, "ref")?).to_string(),
                        )),
                        _ => {}
                    }
                }
                self.attribute_groups.insert(name, items);
            }
            Some(composition @ ("include" | "import" | "redefine" | "override")) => {
                return Err(format!("xs:{composition} is not supported"));
            }
            Some(other) => {
                tracing::debug!("[SchemaValidator] ignoring top-level xs:{}", other);
            }
            None => {}
        }
        Ok(())
    }

    fn flatten<'s>(&'s self, ct: &'s ComplexType, depth: usize) -> Result<Flattened<'s>, String> {
        if depth > MAX_DEFINITION_DEPTH {
            return Err("type derivation is too deep or circular".to_string());
        }
        let mut flat = Flattened {
            content: FlatContent::Empty,
            attributes: Vec::new(),
            any_attribute: ct.any_attribute,
            mixed: ct.mixed,
        };
        match &ct.content {
            Content::Empty => {}
            Content::Simple(ty) => flat.content = FlatContent::Simple(ty),
            Content::Particles(particle) => flat.content = FlatContent::Particles(vec![particle]),
            Content::Extension { base, particle } => {
                let named_complex = match base {
                    TypeRef::Named(name) => self.complex_types.get(name),
                    TypeRef::Complex(inline) => Some(inline.as_ref()),
                    _ => None,
                };
                match (named_complex, base) {
                    (Some(base_ct), _) => {
                        let inherited = self.flatten(base_ct, depth + 1)?;
                        flat.attributes = inherited.attributes;
                        flat.any_attribute |= inherited.any_attribute;
                        flat.mixed |= inherited.mixed;
                        flat.content = match inherited.content {
                            FlatContent::Empty => {
                                FlatContent::Particles(particle.iter().collect())
                            }
                            FlatContent::Particles(mut particles) => {
                                particles.extend(particle.iter());
                                FlatContent::Particles(particles)
                            }
                            FlatContent::Simple(ty) if particle.is_none() => {
                                FlatContent::Simple(ty)
                            }
                            FlatContent::Simple(_) => {
                                return Err(
                                    "complex content cannot extend a simple content type"
                                        .to_string(),
                                )
                            }
                        };
                    }
                    (None, TypeRef::AnyType) => {
                        flat.content = FlatContent::Particles(particle.iter().collect());
                    }
                    (None, TypeRef::Named(name)) if !self.simple_types.contains_key(name) => {
                        return Err(format!("Unknown type '{name}'"));
                    }
                    (None, _) => flat.content = FlatContent::Simple(base),
                }
            }
        }
        self.collect_attributes(&ct.attributes, &mut flat.attributes, depth)?;
        Ok(flat)
    }

    fn collect_attributes<'s>(
        &'s self,
        items: &'s [AttributeItem],
        out: &mut Vec<&'s AttributeUse>,
        depth: usize,
    ) -> Result<(), String> {
        if depth > MAX_DEFINITION_DEPTH {
            return Err("attribute group references are too deep or circular".to_string());
        }
        for item in items {
            match item {
                AttributeItem::Attribute(attribute) => {
                    out.retain(|existing| existing.name != attribute.name);
                    out.push(attribute);
                }
                AttributeItem::GroupRef(name) => {
                    let group = self
                        .attribute_groups
                        .get(name)
                        .ok_or_else(|| format!("Unknown attribute group '{name}'"))?;
                    self.collect_attributes(group, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn check_simple(&self, ty: &TypeRef, value: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DEFINITION_DEPTH {
            return Err("simple type derivation is too deep or circular".to_string());
        }
        match ty {
            TypeRef::AnyType => Ok(()),
            TypeRef::Builtin(name) => check_builtin(name, value),
            TypeRef::Simple(simple) => self.check_simple_type(simple, value, depth),
            TypeRef::Named(name) => {
                if let Some(simple) = self.simple_types.get(name) {
                    self.check_simple_type(simple, value, depth)
                } else if let Some(ct) = self.complex_types.get(name) {
                    self.check_simple_content(ct, value, depth)
                } else {
                    Err(format!("Unknown type '{name}'"))
                }
            }
            TypeRef::Complex(ct) => self.check_simple_content(ct, value, depth),
        }
    }

    fn check_simple_content(
        &self,
        ct: &ComplexType,
        value: &str,
        depth: usize,
    ) -> Result<(), String> {
        match self.flatten(ct, depth + 1)?.content {
            FlatContent::Simple(ty) => self.check_simple(ty, value, depth + 1),
            _ => Err("complex type used where a simple value is expected".to_string()),
        }
    }

    fn check_simple_type(
        &self,
        simple: &SimpleType,
        value: &str,
        depth: usize,
    ) -> Result<(), String> {
        match simple {
            SimpleType::Restriction { base, enumeration } => {
                self.check_simple(base, value, depth + 1)?;
                if !enumeration.is_empty() && !enumeration.iter().any(|e| e == value.trim()) {
                    return Err(format!(
                        "'{}' is not one of the allowed values",
                        value.trim()
                    ));
                }
                Ok(())
            }
            SimpleType::List { item } => value
                .split_whitespace()
                .try_for_each(|token| self.check_simple(item, token, depth + 1)),
            SimpleType::Union => Ok(()),
        }
    }

    fn particle_occurs(&self, particle: &Particle) -> Occurs {
        match particle {
            Particle::Element(decl) => decl.occurs,
            Particle::Group(group) => group.occurs,
            Particle::GroupRef { occurs, .. } => *occurs,
            Particle::Any(occurs) => *occurs,
        }
    }

    fn named_group(&self, name: &str) -> Result<&Group, String> {
        self.groups
            .get(name)
            .ok_or_else(|| format!("Unknown group '{name}'"))
    }

    fn first_names(&self, particle: &Particle, out: &mut Vec<String>, depth: usize) {
        if depth > MAX_DEFINITION_DEPTH {
            return;
        }
        let group = match particle {
            Particle::Element(decl) => {
                out.push(format!("'{}'", decl.name));
                return;
            }
            Particle::Any(_) => {
                out.push("any element".to_string());
                return;
            }
            Particle::Group(group) => group,
            Particle::GroupRef { name, .. } => match self.groups.get(name) {
                Some(group) => group,
                None => return,
            },
        };
        for sub in &group.particles {
            self.first_names(sub, out, depth + 1);
            if group.compositor == Compositor::Sequence && self.particle_occurs(sub).min > 0 {
                break;
            }
        }
    }
}

enum FlatContent<'s> {
    Empty,
    Simple(&'s TypeRef),
    Particles(Vec<&'s Particle>),
}

/// A complex type with its derivation chain and attribute groups resolved.
struct Flattened<'s> {
    content: FlatContent<'s>,
    attributes: Vec<&'s AttributeUse>,
    any_attribute: bool,
    mixed: bool,
}

struct Validation<'s, 'd, 'i> {
    schema: &'s SchemaValidator,
    doc: &'d Document<'i>,
}

impl<'s, 'd, 'i> Validation<'s, 'd, 'i> {
    fn line(&self, node: Node) -> u32 {
        self.doc.text_pos_at(node.range().start).row
    }

    fn validate_element(&self, node: Node<'d, 'i>, decl: &'s ElementDecl) -> Result<(), String> {
        let ty = match &decl.kind {
            ElementKind::Typed(ty) => ty,
            ElementKind::Ref => match self.schema.elements.get(&decl.name) {
                Some(ElementDecl {
                    kind: ElementKind::Typed(ty),
                    ..
                }) => ty,
                _ => return Err(format!("Unknown element reference '{}'", decl.name)),
            },
        };
        self.validate_typed(node, ty)
    }

    fn validate_typed(&self, node: Node<'d, 'i>, ty: &'s TypeRef) -> Result<(), String> {
        let complex = match ty {
            TypeRef::AnyType => return Ok(()),
            TypeRef::Complex(ct) => Some(ct.as_ref()),
            TypeRef::Named(name) => self.schema.complex_types.get(name),
            TypeRef::Builtin(_) | TypeRef::Simple(_) => None,
        };
        if let Some(ct) = complex {
            return self.validate_complex(node, ct);
        }

        let name = node.tag_name().name();
        if let Some(child) = node.children().find(Node::is_element) {
            return Err(format!(
                "Element '{}' at line {} has simple content but contains child element '{}'",
                name,
                self.line(node),
                child.tag_name().name()
            ));
        }
        self.check_attributes(node, &[], false)?;
        self.schema
            .check_simple(ty, &text_of(node), 0)
            .map_err(|reason| {
                format!(
                    "Invalid value for '{}' at line {}: {}",
                    name,
                    self.line(node),
                    reason
                )
            })
    }

    fn validate_complex(&self, node: Node<'d, 'i>, ct: &'s ComplexType) -> Result<(), String> {
        let flat = self.schema.flatten(ct, 0)?;
        self.check_attributes(node, &flat.attributes, flat.any_attribute)?;
        let name = node.tag_name().name();
        let children: Vec<Node<'d, 'i>> = node.children().filter(Node::is_element).collect();
        match flat.content {
            FlatContent::Simple(ty) => {
                if let Some(child) = children.first() {
                    return Err(format!(
                        "Element '{}' at line {} has simple content but contains child element '{}'",
                        name,
                        self.line(node),
                        child.tag_name().name()
                    ));
                }
                self.schema
                    .check_simple(ty, &text_of(node), 0)
                    .map_err(|reason| {
                        format!(
                            "Invalid value for '{}' at line {}: {}",
                            name,
                            self.line(node),
                            reason
                        )
                    })
            }
            FlatContent::Empty => {
                if let Some(child) = children.first() {
                    return Err(format!(
                        "Unexpected child element '{}' in '{}' at line {}",
                        child.tag_name().name(),
                        name,
                        self.line(*child)
                    ));
                }
                self.check_no_text(node, flat.mixed)
            }
            FlatContent::Particles(particles) => {
                self.check_no_text(node, flat.mixed)?;
                let mut matcher = Matcher {
                    validation: self,
                    parent: node,
                    children,
                    expected: None,
                };
                matcher.run(&particles)
            }
        }
    }

    fn check_no_text(&self, node: Node, mixed: bool) -> Result<(), String> {
        if mixed {
            return Ok(());
        }
        let stray = node
            .children()
            .filter(Node::is_text)
            .filter_map(|text| text.text())
            .any(|text| !text.trim().is_empty());
        if stray {
            return Err(format!(
                "Element '{}' at line {} does not allow character content",
                node.tag_name().name(),
                self.line(node)
            ));
        }
        Ok(())
    }

    fn check_attributes(
        &self,
        node: Node,
        declared: &[&AttributeUse],
        any_attribute: bool,
    ) -> Result<(), String> {
        let name = node.tag_name().name();
        for attribute in declared {
            if attribute.required && node.attribute(attribute.name.as_str()).is_none() {
                return Err(format!(
                    "Attribute '{}' is required on '{}' at line {}",
                    attribute.name,
                    name,
                    self.line(node)
                ));
            }
        }
        for attr in node.attributes() {
            if attr.namespace().is_some() {
                continue;
            }
            match declared.iter().find(|a| a.name == attr.name()) {
                Some(attribute) => self
                    .schema
                    .check_simple(&attribute.ty, attr.value(), 0)
                    .map_err(|reason| {
                        format!(
                            "Invalid value for attribute '{}' on '{}' at line {}: {}",
                            attr.name(),
                            name,
                            self.line(node),
                            reason
                        )
                    })?,
                None if any_attribute => {}
                None => {
                    return Err(format!(
                        "Attribute '{}' is not allowed on '{}' at line {}",
                        attr.name(),
                        name,
                        self.line(node)
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Greedy content-model matcher over the element children of one parent.
///
/// `Ok(None)` means a particle did not match at the given position; hard errors (an invalid
/// descendant) are `Err`. The deepest position at which something was expected is remembered so
/// the final message points at the element that broke the model.
struct Matcher<'v, 's, 'd, 'i> {
    validation: &'v Validation<'s, 'd, 'i>,
    parent: Node<'d, 'i>,
    children: Vec<Node<'d, 'i>>,
    expected: Option<(usize, Vec<String>)>,
}

impl<'v, 's, 'd, 'i> Matcher<'v, 's, 'd, 'i> {
    fn run(&mut self, particles: &[&'s Particle]) -> Result<(), String> {
        let mut pos = 0;
        for particle in particles {
            match self.repeat(particle, pos)? {
                Some(next) => pos = next,
                None => return Err(self.failure(pos)),
            }
        }
        if pos < self.children.len() {
            return Err(self.failure(pos));
        }
        Ok(())
    }

    fn repeat(&mut self, particle: &'s Particle, pos: usize) -> Result<Option<usize>, String> {
        let occurs = self.validation.schema.particle_occurs(particle);
        let mut count = 0;
        let mut cur = pos;
        while occurs.allows(count) {
            match self.once(particle, cur)? {
                Some(next) if next > cur => {
                    cur = next;
                    count += 1;
                }
                // An empty match satisfies any number of further repetitions.
                Some(_) => {
                    count = count.max(occurs.min);
                    break;
                }
                None => break,
            }
        }
        if count < occurs.min {
            self.expect(cur, particle);
            return Ok(None);
        }
        Ok(Some(cur))
    }

    fn once(&mut self, particle: &'s Particle, pos: usize) -> Result<Option<usize>, String> {
        match particle {
            Particle::Element(decl) => {
                let Some(child) = self.children.get(pos).copied() else {
                    return Ok(None);
                };
                if child.tag_name().name() != decl.name {
                    return Ok(None);
                }
                self.validation.validate_element(child, decl)?;
                Ok(Some(pos + 1))
            }
            Particle::Any(_) => Ok((pos < self.children.len()).then_some(pos + 1)),
            Particle::Group(group) => self.group(group, pos),
            Particle::GroupRef { name, .. } => {
                let group = self.validation.schema.named_group(name)?;
                self.group(group, pos)
            }
        }
    }

    fn group(&mut self, group: &'s Group, pos: usize) -> Result<Option<usize>, String> {
        match group.compositor {
            Compositor::Sequence => {
                let mut cur = pos;
                for particle in &group.particles {
                    match self.repeat(particle, cur)? {
                        Some(next) => cur = next,
                        None => return Ok(None),
                    }
                }
                Ok(Some(cur))
            }
            Compositor::Choice => {
                let mut empty_match = false;
                for particle in &group.particles {
                    match self.repeat(particle, pos)? {
                        Some(next) if next > pos => return Ok(Some(next)),
                        Some(_) => empty_match = true,
                        None => {}
                    }
                }
                Ok(empty_match.then_some(pos))
            }
            Compositor::All => self.all(group, pos),
        }
    }

    fn all(&mut self, group: &'s Group, pos: usize) -> Result<Option<usize>, String> {
        let mut counts = vec![0u32; group.particles.len()];
        let mut cur = pos;
        'children: while let Some(child) = self.children.get(cur).copied() {
            for (idx, particle) in group.particles.iter().enumerate() {
                let Particle::Element(decl) = particle else {
                    continue;
                };
                if decl.name == child.tag_name().name() && decl.occurs.allows(counts[idx]) {
                    self.validation.validate_element(child, decl)?;
                    counts[idx] += 1;
                    cur += 1;
                    continue 'children;
                }
            }
            break;
        }

        let mut missing = Vec::new();
        for (idx, particle) in group.particles.iter().enumerate() {
            if counts[idx] < self.validation.schema.particle_occurs(particle).min {
                self.validation.schema.first_names(particle, &mut missing, 0);
            }
        }
        if missing.is_empty() {
            return Ok(Some(cur));
        }
        self.record(cur, missing);
        Ok(None)
    }

    fn expect(&mut self, pos: usize, particle: &'s Particle) {
        let mut names = Vec::new();
        self.validation.schema.first_names(particle, &mut names, 0);
        self.record(pos, names);
    }

    fn record(&mut self, pos: usize, names: Vec<String>) {
        match &mut self.expected {
            Some((at, existing)) if *at == pos => {
                for name in names {
                    if !existing.contains(&name) {
                        existing.push(name);
                    }
                }
            }
            Some((at, _)) if *at > pos => {}
            _ => self.expected = Some((pos, names)),
        }
    }

    fn failure(&self, pos: usize) -> String {
        let parent = self.parent.tag_name().name();
        let (at, expected) = match &self.expected {
            Some((at, names)) if *at >= pos && !names.is_empty() => {
                (*at, Some(names.join(", ")))
            }
            _ => (pos, None),
        };
        match (self.children.get(at), expected) {
            (Some(child), Some(expected)) => format!(
                "Unexpected child element '{}' in '{}' at line {} (expected {})",
                child.tag_name().name(),
                parent,
                self.validation.line(*child),
                expected
            ),
            (Some(child), None) => format!(
                "Unexpected child element '{}' in '{}' at line {}",
                child.tag_name().name(),
                parent,
                self.validation.line(*child)
            ),
            (None, Some(expected)) => format!(
                "Missing child element {} in '{}' at line {}",
                expected,
                parent,
                self.validation.line(self.parent)
            ),
            (None, None) => format!(
                "Incomplete content for '{}' at line {}",
                parent,
                self.validation.line(self.parent)
            ),
        }
    }
}

fn text_of(node: Node) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect()
}

fn check_builtin(name: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    let integer = |value: &str| {
        value
            .parse::<i128>()
            .map_err(|_| format!("'{value}' is not a valid xs:{name}"))
    };
    let in_range = |ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(format!("'{value}' is out of range for xs:{name}"))
        }
    };
    match name {
        "boolean" => match value {
            "true" | "false" | "1" | "0" => Ok(()),
            _ => Err(format!("'{value}' is not a valid xs:boolean")),
        },
        "integer" | "int" | "long" | "short" | "byte" => integer(value).map(|_| ()),
        "nonNegativeInteger" | "unsignedInt" | "unsignedLong" | "unsignedShort"
        | "unsignedByte" => in_range(integer(value)? >= 0),
        "positiveInteger" => in_range(integer(value)? > 0),
        "negativeInteger" => in_range(integer(value)? < 0),
        "nonPositiveInteger" => in_range(integer(value)? <= 0),
        "decimal" | "float" | "double" => value
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("'{value}' is not a valid xs:{name}")),
        _ => Ok(()),
    }
}

fn xs_name<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let tag = node.tag_name();
    (node.is_element() && tag.namespace() == Some(XS_NAMESPACE)).then(|| tag.name())
}

fn xs_children<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|child| xs_name(*child).is_some())
}

fn xs_child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    xs_children(node).find(|child| xs_name(*child) == Some(name))
}

fn required_attribute(node: Node, name: &str) -> Result<String, String> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        format!(
            "xs:{} is missing attribute '{}'",
            node.tag_name().name(),
            name
        )
    })
}

fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

fn type_ref(node: Node, qname: &str) -> TypeRef {
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    };
    if node.lookup_namespace_uri(prefix) == Some(XS_NAMESPACE) {
        match local {
            "anyType" => TypeRef::AnyType,
            builtin => TypeRef::Builtin(builtin.to_string()),
        }
    } else {
        TypeRef::Named(local.to_string())
    }
}

fn parse_occurs(node: Node) -> Result<Occurs, String> {
    let parse = |attr: &str| -> Result<Option<u32>, String> {
        node.attribute(attr)
            .map(|value| {
                value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid {attr} value '{value}'"))
            })
            .transpose()
    };
    let min = parse("minOccurs")?.unwrap_or(1);
    let max = match node.attribute("maxOccurs").map(str::trim) {
        Some("unbounded") => None,
        _ => Some(parse("maxOccurs")?.unwrap_or(1)),
    };
    if max.is_some_and(|max| max < min) {
        return Err(format!(
            "maxOccurs is lower than minOccurs on xs:{}",
            node.tag_name().name()
        ));
    }
    Ok(Occurs { min, max })
}

fn parse_element(node: Node) -> Result<ElementDecl, String> {
    let occurs = parse_occurs(node)?;
    if let Some(reference) = node.attribute("ref") {
        return Ok(ElementDecl {
            name: local_name(reference).to_string(),
            occurs,
            kind: ElementKind::Ref,
        });
    }
    let name = required_attribute(node, "name")?;
    let ty = if let Some(type_name) = node.attribute("type") {
        type_ref(node, type_name)
    } else if let Some(complex) = xs_child(node, "complexType") {
        TypeRef::Complex(Box::new(parse_complex(complex)?))
    } else if let Some(simple) = xs_child(node, "simpleType") {
        TypeRef::Simple(Box::new(parse_simple(simple)?))
    } else {
        TypeRef::AnyType
    };
    Ok(ElementDecl {
        name,
        occurs,
        kind: ElementKind::Typed(ty),
    })
}

fn parse_complex(node: Node) -> Result<ComplexType, String> {
    let mut ct = ComplexType {
        content: Content::Empty,
        attributes: Vec::new(),
        any_attribute: false,
        mixed: node.attribute("mixed") == Some("true"),
    };
    for child in xs_children(node) {
        match xs_name(child) {
            Some("sequence" | "choice" | "all") => {
                ct.content = Content::Particles(Particle::Group(parse_group(child)?));
            }
            Some("group") => ct.content = Content::Particles(parse_group_ref(child)?),
            Some("simpleContent") => parse_simple_content(child, &mut ct)?,
            Some("complexContent") => parse_complex_content(child, &mut ct)?,
            Some("annotation") => {}
            Some(_) => parse_attribute_item(child, &mut ct)?,
            None => {}
        }
    }
    Ok(ct)
}

fn parse_attribute_item(node: Node, ct: &mut ComplexType) -> Result<(), String> {
    match xs_name(node) {
        Some("attribute") => {
            if let Some(attribute) = parse_attribute(node)? {
                ct.attributes.push(AttributeItem::Attribute(attribute));
            }
        }
        Some("attributeGroup") => ct.attributes.push(AttributeItem::GroupRef(
            local_name(&required_attribute(node, "ref")?).to_string(),
        )),
        Some("anyAttribute") => ct.any_attribute = true,
        Some("annotation") => {}
        Some(other) => return Err(format!("unsupported xs:{other} in xs:complexType")),
        None => {}
    }
    Ok(())
}

fn parse_simple_content(node: Node, ct: &mut ComplexType) -> Result<(), String> {
    let derivation = xs_children(node)
        .find(|child| matches!(xs_name(*child), Some("extension" | "restriction")))
        .ok_or("xs:simpleContent without derivation")?;
    let base = type_ref(derivation, &required_attribute(derivation, "base")?);
    let enumeration = enumeration_values(derivation);
    ct.content = if enumeration.is_empty() {
        Content::Extension {
            base,
            particle: None,
        }
    } else {
        Content::Simple(TypeRef::Simple(Box::new(SimpleType::Restriction {
            base,
            enumeration,
        })))
    };
    for child in xs_children(derivation) {
        match xs_name(child) {
            Some("enumeration" | "simpleType") => {}
            Some(facet) if is_facet(facet) => {}
            _ => parse_attribute_item(child, ct)?,
        }
    }
    Ok(())
}

fn parse_complex_content(node: Node, ct: &mut ComplexType) -> Result<(), String> {
    if node.attribute("mixed") == Some("true") {
        ct.mixed = true;
    }
    let derivation = xs_children(node)
        .find(|child| matches!(xs_name(*child), Some("extension" | "restriction")))
        .ok_or("xs:complexContent without derivation")?;
    let mut particle = None;
    for child in xs_children(derivation) {
        match xs_name(child) {
            Some("sequence" | "choice" | "all") => {
                particle = Some(Particle::Group(parse_group(child)?))
            }
            Some("group") => particle = Some(parse_group_ref(child)?),
            _ => parse_attribute_item(child, ct)?,
        }
    }
    ct.content = if xs_name(derivation) == Some("extension") {
        Content::Extension {
            base: type_ref(derivation, &required_attribute(derivation, "base")?),
            particle,
        }
    } else {
        particle.map_or(Content::Empty, Content::Particles)
    };
    Ok(())
}

fn parse_group(node: Node) -> Result<Group, String> {
    let compositor = match xs_name(node) {
        Some("sequence") => Compositor::Sequence,
        Some("choice") => Compositor::Choice,
        Some("all") => Compositor::All,
        _ => return Err(format!("'{}' is not a compositor", node.tag_name().name())),
    };
    let mut particles = Vec::new();
    for child in xs_children(node) {
        match xs_name(child) {
            Some("element") => particles.push(Particle::Element(parse_element(child)?)),
            Some("sequence" | "choice" | "all") => {
                particles.push(Particle::Group(parse_group(child)?))
            }
            Some("group") => particles.push(parse_group_ref(child)?),
            Some("any") => particles.push(Particle::Any(parse_occurs(child)?)),
            Some("annotation") => {}
            Some(other) => return Err(format!("unsupported xs:{other} in compositor")),
            None => {}
        }
    }
    Ok(Group {
        compositor,
        particles,
        occurs: parse_occurs(node)?,
    })
}

fn parse_group_ref(node: Node) -> Result<Particle, String> {
    Ok(Particle::GroupRef {
        name: local_name(&required_attribute(node, "ref")?).to_string(),
        occurs: parse_occurs(node)?,
    })
}

fn parse_attribute(node: Node) -> Result<Option<AttributeUse>, String> {
    if node.attribute("use") == Some("prohibited") {
        return Ok(None);
    }
    let name = match (node.attribute("name"), node.attribute("ref")) {
        (Some(name), _) => name.to_string(),
        (None, Some(reference)) => local_name(reference).to_string(),
        (None, None) => return Err("xs:attribute without name or ref".to_string()),
    };
    let ty = if let Some(type_name) = node.attribute("type") {
        type_ref(node, type_name)
    } else if let Some(simple) = xs_child(node, "simpleType") {
        TypeRef::Simple(Box::new(parse_simple(simple)?))
    } else {
        TypeRef::AnyType
    };
    Ok(Some(AttributeUse {
        name,
        required: node.attribute("use") == Some("required"),
        ty,
    }))
}

fn parse_simple(node: Node) -> Result<SimpleType, String> {
    for child in xs_children(node) {
        match xs_name(child) {
            Some("restriction") => {
                let base = match child.attribute("base") {
                    Some(base) => type_ref(child, base),
                    None => match xs_child(child, "simpleType") {
                        Some(inline) => TypeRef::Simple(Box::new(parse_simple(inline)?)),
                        None => return Err("xs:restriction without base".to_string()),
                    },
                };
                return Ok(SimpleType::Restriction {
                    base,
                    enumeration: enumeration_values(child),
                });
            }
            Some("list") => {
                let item = match child.attribute("itemType") {
                    Some(item) => type_ref(child, item),
                    None => match xs_child(child, "simpleType") {
                        Some(inline) => TypeRef::Simple(Box::new(parse_simple(inline)?)),
                        None => return Err("xs:list without item type".to_string()),
                    },
                };
                return Ok(SimpleType::List { item });
            }
            Some("union") => return Ok(SimpleType::Union),
            _ => {}
        }
    }
    Err("xs:simpleType without restriction, list or union".to_string())
}

fn enumeration_values(node: Node) -> Vec<String> {
    xs_children(node)
        .filter(|child| xs_name(*child) == Some("enumeration"))
        .filter_map(|child| child.attribute("value"))
        .map(str::to_string)
        .collect()
}

fn is_facet(name: &str) -> bool {
    matches!(
        name,
        "length"
            | "minLength"
            | "maxLength"
            | "pattern"
            | "whiteSpace"
            | "minInclusive"
            | "maxInclusive"
            | "minExclusive"
            | "maxExclusive"
            | "totalDigits"
            | "fractionDigits"
            | "assertion"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Flag">
    <xs:restriction base="xs:string">
      <xs:enumeration value="Captor"/>
      <xs:enumeration value="Captive"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:attributeGroup name="Ident">
    <xs:attribute name="Id" type="xs:string" use="required"/>
  </xs:attributeGroup>
  <xs:complexType name="Base">
    <xs:sequence>
      <xs:element name="Order" type="xs:int"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence>
          <xs:element name="Label" type="xs:string" minOccurs="0"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Item" maxOccurs="unbounded">
          <xs:complexType>
            <xs:all>
              <xs:element name="Name" type="xs:string"/>
              <xs:element name="Flag" type="Flag" minOccurs="0"/>
              <xs:element name="Derived" type="Derived" minOccurs="0"/>
              <xs:element name="Skill" minOccurs="0">
                <xs:complexType>
                  <xs:attributeGroup ref="Ident"/>
                  <xs:attribute name="Min" type="xs:int"/>
                </xs:complexType>
              </xs:element>
              <xs:element name="Pick" minOccurs="0">
                <xs:complexType>
                  <xs:choice>
                    <xs:element name="A" type="xs:string"/>
                    <xs:element name="B" type="xs:boolean"/>
                  </xs:choice>
                </xs:complexType>
              </xs:element>
            </xs:all>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    const CONSTRUCTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Numbers">
    <xs:list itemType="xs:int"/>
  </xs:simpleType>
  <xs:element name="Shared" type="xs:string"/>
  <xs:group name="Pair">
    <xs:sequence>
      <xs:element name="A" type="xs:string"/>
      <xs:element name="B" type="xs:int"/>
    </xs:sequence>
  </xs:group>
  <xs:element name="Doc">
    <xs:complexType>
      <xs:sequence>
        <xs:group ref="Pair" maxOccurs="unbounded"/>
        <xs:element ref="Shared" minOccurs="0"/>
        <xs:element name="L" type="Numbers" minOccurs="0"/>
        <xs:element name="Amt" minOccurs="0">
          <xs:complexType>
            <xs:simpleContent>
              <xs:extension base="xs:decimal">
                <xs:attribute name="Unit" type="xs:string" use="required"/>
              </xs:extension>
            </xs:simpleContent>
          </xs:complexType>
        </xs:element>
        <xs:element name="Note" minOccurs="0">
          <xs:complexType mixed="true">
            <xs:sequence>
              <xs:any minOccurs="0" maxOccurs="2"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn schema() -> SchemaValidator {
        SchemaValidator::parse("test.xsd", SCHEMA).unwrap()
    }

    fn constructs() -> SchemaValidator {
        SchemaValidator::parse("constructs.xsd", CONSTRUCTS).unwrap()
    }

    fn reason(result: Result<BoundDocument, CeError>) -> String {
        match result {
            Err(CeError::Schema { reason, .. }) => reason,
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn valid_document_binds_every_top_level_element() {
        let text = r#"<Root>
  <Item><Name>First</Name><Flag>Captor</Flag></Item>
  <Item>
    <Skill Id="Riding" Min="2"/>
    <Name>Second</Name>
    <Derived><Order>1</Order><Label>x</Label></Derived>
    <Pick><B>true</B></Pick>
  </Item>
</Root>"#;
        let doc = schema().validate_str("a.xml", text).unwrap();
        assert_eq!(doc.root(), "Root");
        assert_eq!(doc.len(), 2);
        let first = doc.iter().next().unwrap();
        assert_eq!(
            first.xml_source(),
            "<Item><Name>First</Name><Flag>Captor</Flag></Item>"
        );
        assert_eq!(first.element().child("Name").unwrap().text, "First");
    }

    #[test]
    fn missing_required_child_names_it() {
        let text = "<Root><Item><Flag>Captor</Flag></Item></Root>";
        let reason = reason(schema().validate_str("a.xml", text));
        assert!(reason.contains("'Name'"), "{reason}");
    }

    #[test]
    fn wrong_order_in_sequence_is_rejected() {
        let text = "<Root><Item><Name>x</Name><Derived><Label>a</Label><Order>1</Order></Derived></Item></Root>";
        let reason = reason(schema().validate_str("a.xml", text));
        assert!(
            reason.starts_with("Unexpected child element 'Label' in 'Derived'"),
            "{reason}"
        );
        assert!(reason.contains("(expected 'Order')"), "{reason}");
    }

    #[test]
    fn enumeration_and_builtin_values_are_checked() {
        let bad_flag = "<Root><Item><Name>x</Name><Flag>Nobody</Flag></Item></Root>";
        assert!(reason(schema().validate_str("a.xml", bad_flag)).contains("'Nobody'"));

        let bad_bool = "<Root><Item><Name>x</Name><Pick><B>maybe</B></Pick></Item></Root>";
        assert!(reason(schema().validate_str("a.xml", bad_bool)).contains("xs:boolean"));
    }

    #[test]
    fn attributes_are_checked() {
        let missing = "<Root><Item><Name>x</Name><Skill Min=\"1\"/></Item></Root>";
        assert!(reason(schema().validate_str("a.xml", missing))
            .starts_with("Attribute 'Id' is required on 'Skill'"));

        let unknown = "<Root><Item><Name>x</Name><Skill Id=\"a\" Color=\"red\"/></Item></Root>";
        assert!(reason(schema().validate_str("a.xml", unknown))
            .starts_with("Attribute 'Color' is not allowed on 'Skill'"));
    }

    #[test]
    fn choice_accepts_exactly_one_alternative() {
        let both = "<Root><Item><Name>x</Name><Pick><A>a</A><B>true</B></Pick></Item></Root>";
        assert!(reason(schema().validate_str("a.xml", both)).contains("'B'"));
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let result = schema().validate_str("c.xml", "<Root><Item><Name>x</Name></Item>");
        assert!(matches!(result, Err(CeError::XmlParse { .. })));
    }

    #[test]
    fn unknown_root_is_rejected() {
        let reason = reason(schema().validate_str("a.xml", "<Other/>"));
        assert!(reason.contains("'Other'"));
    }

    #[test]
    fn schema_composition_is_rejected() {
        let text = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:include schemaLocation="x.xsd"/></xs:schema>"#;
        assert!(matches!(
            SchemaValidator::parse("x.xsd", text),
            Err(CeError::SchemaDefinition { .. })
        ));
    }

    #[test]
    fn group_refs_lists_wildcards_and_mixed_content_bind() {
        let text = r#"<Doc>
  <A>x</A><B>1</B>
  <A>y</A><B>2</B>
  <Shared>common</Shared>
  <L>1 2 3</L>
  <Amt Unit="g">5.5</Amt>
  <Note>Some <b>bold</b> text</Note>
</Doc>"#;
        let doc = constructs().validate_str("a.xml", text).unwrap();
        assert_eq!(doc.root(), "Doc");
        assert_eq!(doc.len(), 8);
        assert_eq!(constructs().root_elements(), ["Doc", "Shared"]);
    }

    #[test]
    fn group_ref_must_start_with_its_first_element() {
        let reason = reason(constructs().validate_str("a.xml", "<Doc><B>1</B><A>x</A></Doc>"));
        assert!(
            reason.starts_with("Unexpected child element 'B' in 'Doc'"),
            "{reason}"
        );
        assert!(reason.contains("(expected 'A')"), "{reason}");
    }

    #[test]
    fn group_ref_repeats_whole_groups() {
        let text = "<Doc><A>x</A><B>1</B><A>y</A></Doc>";
        let reason = reason(constructs().validate_str("a.xml", text));
        assert!(
            reason.starts_with("Missing child element 'B' in 'Doc'"),
            "{reason}"
        );
    }

    #[test]
    fn element_ref_uses_the_global_declaration() {
        let text = "<Doc><A>x</A><B>1</B><Shared><x/></Shared></Doc>";
        let reason = reason(constructs().validate_str("a.xml", text));
        assert!(
            reason.starts_with("Element 'Shared' at line 1 has simple content"),
            "{reason}"
        );
    }

    #[test]
    fn list_items_are_checked_one_by_one() {
        let text = "<Doc><A>x</A><B>1</B><L>1 x</L></Doc>";
        let reason = reason(constructs().validate_str("a.xml", text));
        assert!(reason.starts_with("Invalid value for 'L'"), "{reason}");
        assert!(reason.contains("'x' is not a valid xs:int"), "{reason}");
    }

    #[test]
    fn simple_content_extension_checks_value_and_attributes() {
        let no_unit = "<Doc><A>x</A><B>1</B><Amt>5</Amt></Doc>";
        assert!(reason(constructs().validate_str("a.xml", no_unit))
            .starts_with("Attribute 'Unit' is required on 'Amt'"));

        let not_a_number = r#"<Doc><A>x</A><B>1</B><Amt Unit="g">five</Amt></Doc>"#;
        let reason = reason(constructs().validate_str("a.xml", not_a_number));
        assert!(reason.contains("'five' is not a valid xs:decimal"), "{reason}");
    }

    #[test]
    fn wildcard_honours_max_occurs() {
        let text = "<Doc><A>x</A><B>1</B><Note><a/><b/><c/></Note></Doc>";
        let reason = reason(constructs().validate_str("a.xml", text));
        assert!(
            reason.starts_with("Unexpected child element 'c' in 'Note'"),
            "{reason}"
        );
    }

    #[test]
    fn character_content_needs_mixed() {
        let text = "<Doc>stray<A>x</A><B>1</B></Doc>";
        let reason = reason(constructs().validate_str("a.xml", text));
        assert_eq!(
            reason,
            "Element 'Doc' at line 1 does not allow character content"
        );
    }
}
