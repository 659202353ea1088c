//! The element arena.
//!
//! A [`Document`] owns every element of one graph in a flat `Vec`.
//! Elements refer to each other through [`ElementId`] indices: containment
//! ([`Value::Element`], generic children) is ownership, while
//! [`Value::Reference`] and the parent link are plain back-pointers. The
//! graph can therefore hold cycles without shared ownership.

use std::ops::Index;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};
use xbind_model::NsName;

/// Index of an element inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// A contained element.
    Element(ElementId),
    /// A resolved reference to an element held elsewhere.
    Reference(ElementId),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The element behind a containment or reference value.
    pub fn as_element(&self) -> Option<ElementId> {
        match self {
            Value::Element(id) | Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    /// Items of a list, or the value itself.
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(values) => values,
            single => std::slice::from_ref(single),
        }
    }

    /// Textual form of a primitive value.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Descriptor of an element outside the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericDescriptor {
    /// Display name (`other:note`, `ns0:foo`, `Any`).
    pub name: String,
    pub ns: NsName,
}

impl GenericDescriptor {
    pub fn new(prefix: &str, local_name: &str, uri: &str) -> Self {
        let name = if prefix.is_empty() {
            local_name.to_string()
        } else {
            format!("{prefix}:{local_name}")
        };
        Self {
            name,
            ns: NsName {
                prefix: prefix.to_string(),
                local_name: local_name.to_string(),
                uri: uri.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Instance of a model type.
    Typed { type_name: String },
    /// Extension content, kept structurally.
    Generic {
        descriptor: GenericDescriptor,
        body: Option<String>,
        children: Vec<ElementId>,
    },
}

/// One element of a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    kind: ElementKind,
    properties: Vec<(String, Value)>,
    attrs: Vec<(String, String)>,
    parent: Option<ElementId>,
    identity: Option<String>,
}

impl ElementData {
    fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            attrs: Vec::new(),
            parent: None,
            identity: None,
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Qualified type name, or the display name of a generic element.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ElementKind::Typed { type_name } => type_name,
            ElementKind::Generic { descriptor, .. } => &descriptor.name,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.kind, ElementKind::Generic { .. })
    }

    pub fn descriptor(&self) -> Option<&GenericDescriptor> {
        match &self.kind {
            ElementKind::Generic { descriptor, .. } => Some(descriptor),
            ElementKind::Typed { .. } => None,
        }
    }

    /// Trimmed text content of a generic element.
    pub fn body(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Generic { body, .. } => body.as_deref(),
            ElementKind::Typed { .. } => None,
        }
    }

    /// Nested elements of a generic element.
    pub fn children(&self) -> &[ElementId] {
        match &self.kind {
            ElementKind::Generic { children, .. } => children,
            ElementKind::Typed { .. } => &[],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Assigned properties in assignment order.
    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    /// Raw attributes retained from the source, including `xmlns*`
    /// declarations.
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Identifier registered for this element.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

/// An element graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    elements: Vec<ElementData>,
    root: Option<ElementId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    pub fn set_root(&mut self, id: ElementId) {
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&ElementData> {
        self.elements.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &ElementData)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(idx, element)| (ElementId(idx), element))
    }

    pub fn create_typed(&mut self, type_name: impl Into<String>) -> ElementId {
        self.insert(ElementKind::Typed {
            type_name: type_name.into(),
        })
    }

    pub fn create_generic(&mut self, descriptor: GenericDescriptor) -> ElementId {
        self.insert(ElementKind::Generic {
            descriptor,
            body: None,
            children: Vec::new(),
        })
    }

    fn insert(&mut self, kind: ElementKind) -> ElementId {
        self.elements.push(ElementData::new(kind));
        ElementId(self.elements.len() - 1)
    }

    fn element_mut(&mut self, id: ElementId) -> &mut ElementData {
        &mut self.elements[id.0]
    }

    /// Sets a single-valued property, replacing any previous value.
    pub fn set(&mut self, id: ElementId, name: &str, value: Value) {
        self.adopt(id, &value);
        let element = self.element_mut(id);
        match element.properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => element.properties.push((name.to_string(), value)),
        }
    }

    /// Appends to a many-valued property.
    pub fn push(&mut self, id: ElementId, name: &str, value: Value) {
        self.adopt(id, &value);
        let element = self.element_mut(id);
        match element.properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, Value::List(values))) => values.push(value),
            Some((_, slot)) => {
                let previous = std::mem::replace(slot, Value::List(Vec::new()));
                *slot = Value::List(vec![previous, value]);
            }
            None => element
                .properties
                .push((name.to_string(), Value::List(vec![value]))),
        }
    }

    pub fn set_attr(&mut self, id: ElementId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let element = self.element_mut(id);
        match element.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => element.attrs.push((name, value)),
        }
    }

    /// Sets the text content of a generic element.
    pub fn set_body(&mut self, id: ElementId, text: Option<String>) {
        if let ElementKind::Generic { body, .. } = &mut self.element_mut(id).kind {
            *body = text;
        }
    }

    /// Appends a nested element to a generic element.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.element_mut(child).parent = Some(parent);
        if let ElementKind::Generic { children, .. } = &mut self.element_mut(parent).kind {
            children.push(child);
        }
    }

    pub fn set_identity(&mut self, id: ElementId, identity: impl Into<String>) {
        self.element_mut(id).identity = Some(identity.into());
    }

    fn adopt(&mut self, parent: ElementId, value: &Value) {
        if let Value::Element(child) = value {
            self.element_mut(*child).parent = Some(parent);
        }
    }

    /// Renders an element and everything it contains as JSON.
    ///
    /// Typed elements become `{"$type": ..., <property>: ...}`; generic
    /// elements additionally inline their attributes and carry `$body` and
    /// `$children`. References render as `{"$ref": <id>}`.
    pub fn to_json(&self, id: ElementId) -> JsonValue {
        let Some(element) = self.get(id) else {
            return JsonValue::Null;
        };

        let mut map = Map::new();
        map.insert("$type".to_string(), json!(element.type_name()));

        if element.is_generic() {
            for (name, value) in &element.attrs {
                map.insert(name.clone(), json!(value));
            }
        }
        for (name, value) in &element.properties {
            map.insert(name.clone(), self.value_to_json(value));
        }
        if let Some(body) = element.body() {
            map.insert("$body".to_string(), json!(body));
        }
        if !element.children().is_empty() {
            let children = element
                .children()
                .iter()
                .map(|child| self.to_json(*child))
                .collect();
            map.insert("$children".to_string(), JsonValue::Array(children));
        }

        JsonValue::Object(map)
    }

    fn value_to_json(&self, value: &Value) -> JsonValue {
        match value {
            Value::String(s) => json!(s),
            Value::Integer(i) => json!(i),
            Value::Real(r) => json!(r),
            Value::Boolean(b) => json!(b),
            Value::Element(id) => self.to_json(*id),
            Value::Reference(id) => {
                json!({ "$ref": self.get(*id).and_then(|e| e.identity()) })
            }
            Value::List(values) => {
                JsonValue::Array(values.iter().map(|v| self.value_to_json(v)).collect())
            }
        }
    }
}

impl Index<ElementId> for Document {
    type Output = ElementData;

    fn index(&self, id: ElementId) -> &ElementData {
        &self.elements[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_push() {
        let mut doc = Document::new();
        let root = doc.create_typed("t:Root");
        let child = doc.create_typed("t:Child");

        doc.set(root, "name", Value::String("a".to_string()));
        doc.set(root, "name", Value::String("b".to_string()));
        doc.push(root, "children", Value::Element(child));
        doc.push(root, "tags", Value::String("x".to_string()));
        doc.push(root, "tags", Value::String("y".to_string()));

        assert_eq!(doc[root].get("name"), Some(&Value::String("b".to_string())));
        assert_eq!(doc[child].parent(), Some(root));
        assert_eq!(
            doc[root].get("tags").map(|v| v.items().len()),
            Some(2)
        );
    }

    #[test]
    fn test_generic_json() {
        let mut doc = Document::new();
        let note = doc.create_generic(GenericDescriptor::new("other", "note", "http://other"));
        let meta = doc.create_generic(GenericDescriptor::new("other", "meta", "http://other"));
        doc.set_attr(meta, "key", "k1");
        doc.set_body(note, Some("text".to_string()));
        doc.append_child(note, meta);

        assert_eq!(
            doc.to_json(note),
            json!({
                "$type": "other:note",
                "$body": "text",
                "$children": [ { "$type": "other:meta", "key": "k1" } ]
            })
        );
        assert_eq!(doc[meta].parent(), Some(note));
    }

    #[test]
    fn test_reference_json() {
        let mut doc = Document::new();
        let target = doc.create_typed("t:Target");
        let holder = doc.create_typed("t:Holder");
        doc.set_identity(target, "T1");
        doc.set(holder, "ref", Value::Reference(target));

        assert_eq!(
            doc.to_json(holder),
            json!({ "$type": "t:Holder", "ref": { "$ref": "T1" } })
        );
        // references never reparent their target
        assert_eq!(doc[target].parent(), None);
    }

    #[test]
    fn test_unprefixed_generic_name() {
        let descriptor = GenericDescriptor::new("", "Any", "");
        assert_eq!(descriptor.name, "Any");
        assert_eq!(descriptor.ns.local_name, "Any");
    }
}
