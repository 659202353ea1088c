//! Serialized package definitions.
//!
//! These structs mirror the JSON package format one to one. They carry no
//! resolution logic: type references are still raw strings, inheritance is
//! not flattened. [`crate::Model::new`] turns them into descriptors.

use serde::Deserialize;

/// A package groups the types of one XML namespace under a short prefix.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDefinition {
    /// Human-readable package name.
    pub name: String,

    /// Canonical namespace prefix (`props` in `props:Root`).
    pub prefix: String,

    /// Namespace URI owned by this package.
    pub uri: String,

    /// XML naming conventions of the package.
    #[serde(default)]
    pub xml: PackageXml,

    /// Types declared by the package.
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

/// XML naming conventions of a package.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageXml {
    /// How type names map onto element tags.
    #[serde(default)]
    pub tag_alias: Option<TagAlias>,

    /// Prefix prepended to type names inside `xsi:type` values.
    #[serde(default)]
    pub type_prefix: Option<String>,
}

/// Element tag aliasing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TagAlias {
    /// Tags are type names with a lower-cased first letter.
    #[serde(rename = "lowerCase")]
    LowerCase,
}

/// A type as written in a package file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub name: String,

    #[serde(default)]
    pub is_abstract: bool,

    /// Direct supertypes, local or `prefix:Name`.
    #[serde(default)]
    pub super_class: Vec<String>,

    /// Foreign types that receive this type's properties as extensions.
    #[serde(default)]
    pub extends: Vec<String>,

    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

/// A property as written in a package file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,

    /// `String`, `Integer`, `Real`, `Boolean`, `Element` or a type name.
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub is_many: bool,

    #[serde(default)]
    pub is_attr: bool,

    #[serde(default)]
    pub is_body: bool,

    #[serde(default)]
    pub is_reference: bool,

    #[serde(default)]
    pub is_id: bool,

    #[serde(default)]
    pub is_virtual: bool,

    /// `prefix:Type#property` of the inherited property this one replaces.
    #[serde(default)]
    pub redefines: Option<String>,

    #[serde(default)]
    pub xml: PropertyXml,
}

/// Per-property XML options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyXml {
    #[serde(default)]
    pub serialize: Option<Serialization>,
}

/// How a containment property is written as a child element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Serialization {
    /// Tag is the property name; `xsi:type` names the concrete type.
    #[serde(rename = "xsi:type")]
    XsiType,
    /// Tag is the property name.
    #[serde(rename = "property")]
    Property,
}
