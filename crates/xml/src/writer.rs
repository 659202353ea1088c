//! Element graph to XML.
//!
//! Serialization runs in two passes. The first walks the graph, builds a
//! [`Node`] tree and decides every prefix, tracking which namespace
//! declarations the output actually needs. The second emits the tree
//! through `quick_xml`, writing only declarations that were used.

use std::io::Write;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Deserialize;
use tracing::{debug, trace};
use xbind_model::{Model, PropertyDescriptor, Serialization, TypeDescriptor};

use crate::element::{Document, ElementData, ElementId, ElementKind, Value};
use crate::error::WriteError;
use crate::namespace::{QName, XML_URI, XSI_URI, declared_prefix};

/// Writer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` before the root.
    pub preamble: bool,
}

/// Serializes element graphs built against a [`Model`].
#[derive(Debug, Clone)]
pub struct Writer {
    model: Arc<Model>,
    options: WriterOptions,
}

impl Writer {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            options: WriterOptions::default(),
        }
    }

    pub fn with_options(model: Arc<Model>, options: WriterOptions) -> Self {
        Self { model, options }
    }

    /// Serializes the subtree rooted at `root` to a string.
    pub fn to_xml(&self, document: &Document, root: ElementId) -> Result<String, WriteError> {
        let mut buffer = Vec::new();
        self.to_writer(document, root, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serializes the subtree rooted at `root` into `out`.
    pub fn to_writer<W: Write>(
        &self,
        document: &Document,
        root: ElementId,
        out: W,
    ) -> Result<(), WriteError> {
        let mut serializer = Serializer {
            model: &self.model,
            document,
            namespaces: Namespaces::default(),
        };
        let node = serializer.element(root, None, None, None)?;

        let mut writer = quick_xml::Writer::new(out);
        if self.options.preamble {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            writer.get_mut().write_all(b"\n")?;
        }
        emit(&mut writer, &node, &serializer.namespaces)?;

        debug!(root = root.index(), "Serialized document");
        Ok(())
    }
}

/// Output element, with every name already prefixed.
#[derive(Debug)]
struct Node {
    name: String,
    scope: usize,
    attrs: Vec<(String, String)>,
    content: Vec<Content>,
}

impl Node {
    fn new(name: String, scope: usize) -> Self {
        Self {
            name,
            scope,
            attrs: Vec::new(),
            content: Vec::new(),
        }
    }

    fn push_attr(&mut self, name: String, value: String) {
        if !self.attrs.iter().any(|(existing, _)| *existing == name) {
            self.attrs.push((name, value));
        }
    }
}

#[derive(Debug)]
enum Content {
    Element(Node),
    Text(String),
}

/// Namespace-qualified element name and the prefix it prefers.
struct ElementName {
    uri: String,
    local: String,
    prefix: String,
}

#[derive(Debug)]
struct Declaration {
    prefix: String,
    uri: String,
    used: bool,
}

#[derive(Debug)]
struct Scope {
    declarations: Vec<Declaration>,
    parent: Option<usize>,
}

/// Arena of per-element declaration scopes. Scope 0 is the root element.
#[derive(Debug, Default)]
struct Namespaces {
    scopes: Vec<Scope>,
}

impl Namespaces {
    /// Opens a scope seeded with declarations the element carried in the
    /// source, minus those already in force.
    fn open(&mut self, parent: Option<usize>, seeded: Vec<(String, String)>) -> usize {
        let declarations = seeded
            .into_iter()
            .filter(|(prefix, uri)| {
                parent.and_then(|idx| self.resolve(idx, prefix)) != Some(uri.as_str())
            })
            .map(|(prefix, uri)| Declaration {
                prefix,
                uri,
                used: false,
            })
            .collect();
        self.scopes.push(Scope {
            declarations,
            parent,
        });
        self.scopes.len() - 1
    }

    /// Nearest declaration of `prefix`, including unbindings.
    fn nearest(&self, scope: usize, prefix: &str) -> Option<(usize, usize)> {
        let mut current = Some(scope);
        while let Some(idx) = current {
            let found = self.scopes[idx]
                .declarations
                .iter()
                .rposition(|d| d.prefix == prefix);
            if let Some(pos) = found {
                return Some((idx, pos));
            }
            current = self.scopes[idx].parent;
        }
        None
    }

    fn resolve(&self, scope: usize, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_URI);
        }
        self.nearest(scope, prefix)
            .map(|(idx, pos)| self.scopes[idx].declarations[pos].uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    fn declare(&mut self, scope: usize, prefix: &str, uri: &str) {
        debug!(prefix, uri, "Declared namespace");
        self.scopes[scope].declarations.push(Declaration {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            used: true,
        });
    }

    /// Prefix under which `uri` is reachable from `scope`, declaring one if
    /// needed. Attributes never use the default namespace.
    fn prefix_for(&mut self, scope: usize, uri: &str, candidate: &str, attribute: bool) -> String {
        if uri == XML_URI {
            return "xml".to_string();
        }

        let mut reusable = None;
        let mut current = Some(scope);
        'scopes: while let Some(idx) = current {
            for (pos, declaration) in self.scopes[idx].declarations.iter().enumerate() {
                if declaration.uri == uri
                    && !(attribute && declaration.prefix.is_empty())
                    && self.resolve(scope, &declaration.prefix) == Some(uri)
                {
                    reusable = Some((idx, pos));
                    break 'scopes;
                }
            }
            current = self.scopes[idx].parent;
        }
        if let Some((idx, pos)) = reusable {
            let declaration = &mut self.scopes[idx].declarations[pos];
            declaration.used = true;
            return declaration.prefix.clone();
        }

        if !candidate.is_empty() && self.resolve(scope, candidate).is_none() {
            self.declare(0, candidate, uri);
            return candidate.to_string();
        }

        let mut counter = 0usize;
        loop {
            let prefix = format!("ns{counter}");
            if self.resolve(scope, &prefix).is_none() {
                self.declare(scope, &prefix, uri);
                return prefix;
            }
            counter += 1;
        }
    }

    fn element_name(&mut self, scope: usize, name: &ElementName) -> String {
        if name.uri.is_empty() {
            match self.nearest(scope, "") {
                Some((idx, pos)) if self.scopes[idx].declarations[pos].uri.is_empty() => {
                    self.scopes[idx].declarations[pos].used = true;
                }
                Some(_) => self.declare(scope, "", ""),
                None => {}
            }
            return name.local.clone();
        }
        let prefix = self.prefix_for(scope, &name.uri, &name.prefix, false);
        qualify(&prefix, &name.local)
    }
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

struct Serializer<'a> {
    model: &'a Model,
    document: &'a Document,
    namespaces: Namespaces,
}

impl<'a> Serializer<'a> {
    fn data(&self, id: ElementId) -> Result<&'a ElementData, WriteError> {
        let document = self.document;
        document
            .get(id)
            .ok_or(WriteError::UnknownElement(id.index()))
    }

    fn descriptor(&self, type_name: &str) -> Result<&'a TypeDescriptor, WriteError> {
        let model = self.model;
        model
            .get_type(type_name)
            .ok_or_else(|| WriteError::UnknownType(type_name.to_string()))
    }

    /// Serializes any element; typed elements default to their type tag.
    fn element(
        &mut self,
        id: ElementId,
        parent: Option<usize>,
        name: Option<ElementName>,
        xsi_type: Option<&'a TypeDescriptor>,
    ) -> Result<Node, WriteError> {
        let data = self.data(id)?;
        match data.kind() {
            ElementKind::Generic { descriptor, .. } => {
                let name = ElementName {
                    uri: descriptor.ns.uri.clone(),
                    local: descriptor.ns.local_name.clone(),
                    prefix: descriptor.ns.prefix.clone(),
                };
                self.generic(id, data, name, parent)
            }
            ElementKind::Typed { type_name } => {
                let descriptor = self.descriptor(type_name)?;
                let name = name.unwrap_or_else(|| ElementName {
                    uri: descriptor.ns().uri.clone(),
                    local: self.model.tag_for_type(descriptor),
                    prefix: descriptor.ns().prefix.clone(),
                });
                self.typed(id, data, descriptor, name, xsi_type, parent)
            }
        }
    }

    fn typed(
        &mut self,
        id: ElementId,
        data: &'a ElementData,
        descriptor: &'a TypeDescriptor,
        name: ElementName,
        xsi_type: Option<&'a TypeDescriptor>,
        parent: Option<usize>,
    ) -> Result<Node, WriteError> {
        let scope = self.namespaces.open(parent, source_declarations(data));
        let tag = self.namespaces.element_name(scope, &name);
        trace!(tag = %tag, type_name = descriptor.name(), "Serializing typed element");
        let mut node = Node::new(tag, scope);

        if let Some(actual) = xsi_type {
            let xsi = self.namespaces.prefix_for(scope, XSI_URI, "xsi", true);
            let type_prefix =
                self.namespaces
                    .prefix_for(scope, &actual.ns().uri, &actual.ns().prefix, true);
            node.push_attr(
                format!("{xsi}:type"),
                format!("{type_prefix}:{}", self.model.xsi_name_for_type(actual)),
            );
        }

        for property in descriptor.properties().iter().filter(|p| p.is_attr) {
            let Some(value) = data.get(&property.name) else {
                continue;
            };
            let text = value
                .items()
                .iter()
                .map(|item| self.scalar_text(item))
                .collect::<Result<Vec<_>, _>>()?
                .join(" ");
            let attr = if property.is_extension {
                let prefix = self
                    .namespaces
                    .prefix_for(scope, &property.uri, &property.prefix, true);
                qualify(&prefix, &property.name)
            } else {
                property.name.clone()
            };
            node.push_attr(attr, text);
        }

        self.raw_attributes(id, data, &mut node);

        for property in descriptor.properties().iter().filter(|p| !p.is_attr) {
            let Some(value) = data.get(&property.name) else {
                continue;
            };
            if property.is_body {
                if let Some(text) = value.to_text() {
                    node.content.push(Content::Text(text));
                }
                continue;
            }

            for item in value.items() {
                let child = match item {
                    Value::Element(child) if !property.is_reference => {
                        self.contained(*child, property, scope)?
                    }
                    _ => {
                        let text = self.scalar_text(item)?;
                        self.value_child(property, text, scope)
                    }
                };
                node.content.push(Content::Element(child));
            }
        }

        Ok(node)
    }

    /// A contained element, named according to the property's
    /// serialization mode.
    fn contained(
        &mut self,
        child: ElementId,
        property: &'a PropertyDescriptor,
        scope: usize,
    ) -> Result<Node, WriteError> {
        let data = self.data(child)?;
        let ElementKind::Typed { type_name } = data.kind() else {
            return self.element(child, Some(scope), None, None);
        };
        let actual = self.descriptor(type_name)?;

        match property.serialize {
            None => self.element(child, Some(scope), None, None),
            Some(Serialization::Property) => {
                self.element(child, Some(scope), Some(property_name(property)), None)
            }
            Some(Serialization::XsiType) => {
                let xsi_type = (actual.name() != property.property_type.name()).then_some(actual);
                self.element(child, Some(scope), Some(property_name(property)), xsi_type)
            }
        }
    }

    /// `<prefix:name>text</prefix:name>` for primitive and reference values.
    fn value_child(&mut self, property: &PropertyDescriptor, text: String, parent: usize) -> Node {
        let scope = self.namespaces.open(Some(parent), Vec::new());
        let tag = self.namespaces.element_name(scope, &property_name(property));
        let mut node = Node::new(tag, scope);
        node.content.push(Content::Text(text));
        node
    }

    fn generic(
        &mut self,
        id: ElementId,
        data: &'a ElementData,
        name: ElementName,
        parent: Option<usize>,
    ) -> Result<Node, WriteError> {
        let scope = self.namespaces.open(parent, source_declarations(data));
        let tag = self.namespaces.element_name(scope, &name);
        let mut node = Node::new(tag, scope);

        self.raw_attributes(id, data, &mut node);

        if let Some(body) = data.body() {
            node.content.push(Content::Text(body.to_string()));
        }
        for child in data.children() {
            let child = self.element(*child, Some(scope), None, None)?;
            node.content.push(Content::Element(child));
        }
        Ok(node)
    }

    /// Re-emits retained source attributes, remapping their prefixes.
    fn raw_attributes(&mut self, id: ElementId, data: &ElementData, node: &mut Node) {
        for (name, value) in data.attrs() {
            if declared_prefix(name).is_some() {
                continue;
            }
            let qname = QName::parse(name);
            let rendered = match qname.prefix {
                None | Some("xml") => name.clone(),
                Some(prefix) => match self.source_uri(id, prefix) {
                    Some(uri) => {
                        let prefix = self.namespaces.prefix_for(node.scope, &uri, prefix, true);
                        qualify(&prefix, qname.local)
                    }
                    None => name.clone(),
                },
            };
            node.push_attr(rendered, value.clone());
        }
    }

    /// URI a prefix was bound to in the source document.
    fn source_uri(&self, id: ElementId, prefix: &str) -> Option<String> {
        let declaration = format!("xmlns:{prefix}");
        let mut current = Some(id);
        while let Some(idx) = current {
            let data = self.document.get(idx)?;
            if let Some(uri) = data.attr(&declaration) {
                return Some(uri.to_string());
            }
            current = data.parent();
        }
        None
    }

    fn scalar_text(&self, item: &Value) -> Result<String, WriteError> {
        match item {
            Value::Reference(target) | Value::Element(target) => self.reference_id(*target),
            other => Ok(other.to_text().unwrap_or_default()),
        }
    }

    /// Identifier of a referenced element: its id property, else the id it
    /// was registered under.
    fn reference_id(&self, target: ElementId) -> Result<String, WriteError> {
        let data = self.data(target)?;
        self.model
            .get_type(data.type_name())
            .and_then(|descriptor| descriptor.id_property())
            .and_then(|property| data.get(&property.name))
            .and_then(Value::to_text)
            .or_else(|| data.identity().map(str::to_string))
            .ok_or_else(|| WriteError::MissingReferenceId(data.type_name().to_string()))
    }
}

fn property_name(property: &PropertyDescriptor) -> ElementName {
    ElementName {
        uri: property.uri.clone(),
        local: property.name.clone(),
        prefix: property.prefix.clone(),
    }
}

fn source_declarations(data: &ElementData) -> Vec<(String, String)> {
    data.attrs()
        .iter()
        .filter_map(|(name, uri)| declared_prefix(name).map(|p| (p.to_string(), uri.clone())))
        .collect()
}

fn emit<W: Write>(
    writer: &mut quick_xml::Writer<W>,
    node: &Node,
    namespaces: &Namespaces,
) -> Result<(), WriteError> {
    let mut start = BytesStart::new(node.name.as_str());
    for declaration in namespaces.scopes[node.scope]
        .declarations
        .iter()
        .filter(|d| d.used)
    {
        let key = qualify("xmlns", &declaration.prefix);
        start.push_attribute((key.as_str(), declaration.uri.as_str()));
    }
    for (name, value) in &node.attrs {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if node.content.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for content in &node.content {
        match content {
            Content::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Content::Element(child) => emit(writer, child, namespaces)?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(prefix: &str, uri: &str) -> Vec<(String, String)> {
        vec![(prefix.to_string(), uri.to_string())]
    }

    #[test]
    fn test_reuses_declaration_in_force() {
        let mut ns = Namespaces::default();
        let root = ns.open(None, seeded("a", "http://a"));
        let child = ns.open(Some(root), seeded("a", "http://a"));

        // already in force at the parent
        assert!(ns.scopes[child].declarations.is_empty());
        assert_eq!(ns.prefix_for(child, "http://a", "x", false), "a");
        assert!(ns.scopes[root].declarations[0].used);
    }

    #[test]
    fn test_shadowed_prefix_not_reused() {
        let mut ns = Namespaces::default();
        let root = ns.open(None, seeded("a", "http://a"));
        let child = ns.open(Some(root), seeded("a", "http://other"));

        assert_eq!(ns.prefix_for(child, "http://a", "a", false), "ns0");
        assert_eq!(ns.resolve(child, "ns0"), Some("http://a"));
    }

    #[test]
    fn test_candidate_declared_at_root() {
        let mut ns = Namespaces::default();
        let root = ns.open(None, Vec::new());
        let child = ns.open(Some(root), Vec::new());

        assert_eq!(ns.prefix_for(child, "http://b", "b", false), "b");
        assert_eq!(ns.resolve(root, "b"), Some("http://b"));
    }

    #[test]
    fn test_attributes_skip_default_namespace() {
        let mut ns = Namespaces::default();
        let root = ns.open(None, seeded("", "http://a"));

        assert_eq!(ns.prefix_for(root, "http://a", "a", true), "a");
        assert_eq!(ns.prefix_for(root, "http://a", "a", false), "");
    }

    #[test]
    fn test_no_namespace_under_default() {
        let mut ns = Namespaces::default();
        let root = ns.open(None, seeded("", "http://a"));
        let child = ns.open(Some(root), Vec::new());
        let name = ElementName {
            uri: String::new(),
            local: "plain".to_string(),
            prefix: String::new(),
        };

        assert_eq!(ns.element_name(child, &name), "plain");
        assert_eq!(ns.scopes[child].declarations[0].uri, "");
        assert_eq!(ns.resolve(child, ""), None);
    }
}
