//! Resolved type and property descriptors.
//!
//! A [`TypeDescriptor`] is the flattened view of a type: inherited,
//! redefined and extension properties are already merged in declaration
//! order, and the full ancestor chain is known. Descriptors are immutable
//! and owned by the [`crate::Model`].

use crate::definition::Serialization;

/// Name of the universal "any element" type.
pub const ANY_ELEMENT: &str = "Element";

/// Built-in value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Integer,
    Real,
    Boolean,
}

impl Primitive {
    /// Parse a primitive from its model name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(Primitive::String),
            "Integer" => Some(Primitive::Integer),
            "Real" => Some(Primitive::Real),
            "Boolean" => Some(Primitive::Boolean),
            _ => None,
        }
    }

    /// The model name of this primitive.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Integer => "Integer",
            Primitive::Real => "Real",
            Primitive::Boolean => "Boolean",
        }
    }
}

/// The declared value type of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Primitive(Primitive),
    /// Any element, including content outside the model.
    Any,
    /// A model type, by qualified name.
    Type(String),
}

impl PropertyType {
    pub(crate) fn parse(qualified_or_primitive: &str) -> Self {
        if let Some(primitive) = Primitive::from_name(qualified_or_primitive) {
            PropertyType::Primitive(primitive)
        } else if qualified_or_primitive == ANY_ELEMENT {
            PropertyType::Any
        } else {
            PropertyType::Type(qualified_or_primitive.to_string())
        }
    }

    /// The name as written in the model (`String`, `Element`, `props:Base`).
    pub fn name(&self) -> &str {
        match self {
            PropertyType::Primitive(p) => p.name(),
            PropertyType::Any => ANY_ELEMENT,
            PropertyType::Type(name) => name,
        }
    }
}

/// The role a property plays in the XML representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    /// Attribute carrying the element's identity.
    Id,
    Attribute,
    /// Character data of the owning element.
    Body,
    /// Identifier pointing at another element.
    Reference,
    /// Nested element (primitive value or contained element).
    Child,
}

/// Namespace information of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsName {
    pub prefix: String,
    pub local_name: String,
    pub uri: String,
}

impl NsName {
    /// `prefix:localName`.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.prefix, self.local_name)
    }
}

/// A fully resolved property.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Local property name (`attrs`).
    pub name: String,
    /// Name qualified by the defining package (`props:attrs`).
    pub ns_name: String,
    /// Prefix of the defining package.
    pub prefix: String,
    /// Namespace URI of the defining package.
    pub uri: String,
    pub property_type: PropertyType,
    pub is_many: bool,
    pub is_attr: bool,
    pub is_body: bool,
    pub is_reference: bool,
    pub is_id: bool,
    pub is_virtual: bool,
    pub serialize: Option<Serialization>,
    /// Qualified name of the type that declares the property.
    pub defined_by: String,
    /// Grafted onto a foreign type through `extends`.
    pub is_extension: bool,
    pub(crate) redefines: Option<String>,
}

impl PropertyDescriptor {
    pub fn role(&self) -> PropertyRole {
        if self.is_id {
            PropertyRole::Id
        } else if self.is_reference {
            PropertyRole::Reference
        } else if self.is_attr {
            PropertyRole::Attribute
        } else if self.is_body {
            PropertyRole::Body
        } else {
            PropertyRole::Child
        }
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self.property_type {
            PropertyType::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Holds nested elements by ownership.
    pub fn is_containment(&self) -> bool {
        !self.is_attr
            && !self.is_reference
            && !self.is_virtual
            && !self.is_body
            && !matches!(self.property_type, PropertyType::Primitive(_))
    }

    /// A containment slot for arbitrary extension content.
    pub fn accepts_any(&self) -> bool {
        self.is_containment() && self.property_type == PropertyType::Any
    }
}

/// A fully resolved type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) ns: NsName,
    pub(crate) is_abstract: bool,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) ancestors: Vec<String>,
}

impl TypeDescriptor {
    /// Qualified type name, e.g. `props:ComplexAttrs`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ns(&self) -> &NsName {
        &self.ns
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Properties in declaration order, inherited ones first.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// All transitive supertypes, nearest first.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Look a property up by qualified (`props:id`) or local (`id`) name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        if name.contains(':') {
            self.property_by_ns_name(name)
        } else {
            self.properties.iter().find(|p| p.name == name)
        }
    }

    pub fn property_by_ns_name(&self, ns_name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.ns_name == ns_name)
    }

    pub fn id_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_id)
    }

    pub fn body_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_body)
    }

    /// Whether this type is `type_name` or one of its descendants.
    ///
    /// Every type is an [`ANY_ELEMENT`].
    pub fn is_a(&self, type_name: &str) -> bool {
        type_name == ANY_ELEMENT
            || self.name == type_name
            || self.ancestors.iter().any(|a| a == type_name)
    }

    /// Whether an element of this type may be stored in `property`.
    pub fn fits(&self, property: &PropertyDescriptor) -> bool {
        match &property.property_type {
            PropertyType::Primitive(_) => false,
            PropertyType::Any => true,
            PropertyType::Type(name) => self.is_a(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(name: &str, property_type: PropertyType) -> PropertyDescriptor {
        PropertyDescriptor {
            name: name.to_string(),
            ns_name: format!("t:{name}"),
            prefix: "t".to_string(),
            uri: "http://t".to_string(),
            property_type,
            is_many: false,
            is_attr: false,
            is_body: false,
            is_reference: false,
            is_id: false,
            is_virtual: false,
            serialize: None,
            defined_by: "t:Owner".to_string(),
            is_extension: false,
            redefines: None,
        }
    }

    #[test]
    fn test_primitive_names() {
        assert_eq!(Primitive::from_name("Integer"), Some(Primitive::Integer));
        assert_eq!(Primitive::from_name("integer"), None);
        assert_eq!(Primitive::Boolean.name(), "Boolean");
    }

    #[test]
    fn test_property_type_parse() {
        assert_eq!(
            PropertyType::parse("Real"),
            PropertyType::Primitive(Primitive::Real)
        );
        assert_eq!(PropertyType::parse("Element"), PropertyType::Any);
        assert_eq!(
            PropertyType::parse("t:Foo"),
            PropertyType::Type("t:Foo".to_string())
        );
    }

    #[test]
    fn test_roles() {
        let mut p = property("id", PropertyType::Primitive(Primitive::String));
        p.is_attr = true;
        assert_eq!(p.role(), PropertyRole::Attribute);
        p.is_id = true;
        assert_eq!(p.role(), PropertyRole::Id);

        let child = property("child", PropertyType::Type("t:Child".to_string()));
        assert_eq!(child.role(), PropertyRole::Child);
        assert!(child.is_containment());
        assert!(!child.accepts_any());

        let any = property("any", PropertyType::Any);
        assert!(any.accepts_any());
    }

    #[test]
    fn test_is_a_and_fits() {
        let descriptor = TypeDescriptor {
            name: "t:Sub".to_string(),
            ns: NsName {
                prefix: "t".to_string(),
                local_name: "Sub".to_string(),
                uri: "http://t".to_string(),
            },
            is_abstract: false,
            properties: Vec::new(),
            ancestors: vec!["t:Base".to_string()],
        };

        assert!(descriptor.is_a("t:Sub"));
        assert!(descriptor.is_a("t:Base"));
        assert!(descriptor.is_a(ANY_ELEMENT));
        assert!(!descriptor.is_a("t:Other"));

        assert!(descriptor.fits(&property("a", PropertyType::Type("t:Base".to_string()))));
        assert!(descriptor.fits(&property("b", PropertyType::Any)));
        assert!(!descriptor.fits(&property(
            "c",
            PropertyType::Primitive(Primitive::String)
        )));
    }
}
