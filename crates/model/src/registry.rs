//! The model registry.
//!
//! [`Model`] indexes packages by prefix and URI and holds one flattened
//! [`TypeDescriptor`] per declared type. Construction resolves every type
//! reference up front, so lookups during reading and writing never fail
//! on a dangling name.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::definition::{PackageDefinition, TagAlias, TypeDefinition};
use crate::descriptor::{ANY_ELEMENT, NsName, Primitive, PropertyDescriptor, PropertyType, TypeDescriptor};
use crate::error::{ModelError, Result};

/// A registered package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub prefix: String,
    pub uri: String,
    pub tag_alias: Option<TagAlias>,
    pub type_prefix: Option<String>,
}

/// Immutable registry of packages and their types.
///
/// A `Model` is `Send + Sync` and is meant to be shared (usually behind an
/// `Arc`) by any number of concurrent readers and writers.
#[derive(Debug, Clone, Default)]
pub struct Model {
    packages: Vec<Package>,
    by_prefix: HashMap<String, usize>,
    by_uri: HashMap<String, usize>,
    types: HashMap<String, TypeDescriptor>,
}

impl Model {
    /// Builds a model from package definitions.
    pub fn new(definitions: Vec<PackageDefinition>) -> Result<Self> {
        let mut packages = Vec::with_capacity(definitions.len());
        let mut by_prefix = HashMap::new();
        let mut by_uri = HashMap::new();

        for (idx, definition) in definitions.iter().enumerate() {
            if by_prefix.insert(definition.prefix.clone(), idx).is_some() {
                return Err(ModelError::DuplicatePrefix(definition.prefix.clone()));
            }
            if by_uri.insert(definition.uri.clone(), idx).is_some() {
                return Err(ModelError::DuplicateUri(definition.uri.clone()));
            }
            packages.push(Package {
                name: definition.name.clone(),
                prefix: definition.prefix.clone(),
                uri: definition.uri.clone(),
                tag_alias: definition.xml.tag_alias,
                type_prefix: definition.xml.type_prefix.clone(),
            });
        }

        let types = Flattener::new(&definitions)?.run()?;

        debug!(
            packages = packages.len(),
            types = types.len(),
            "Built model"
        );

        Ok(Self {
            packages,
            by_prefix,
            by_uri,
            types,
        })
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package_by_uri(&self, uri: &str) -> Option<&Package> {
        self.by_uri.get(uri).map(|idx| &self.packages[*idx])
    }

    pub fn package_by_prefix(&self, prefix: &str) -> Option<&Package> {
        self.by_prefix.get(prefix).map(|idx| &self.packages[*idx])
    }

    /// Looks up a type by qualified name (`props:Root`).
    pub fn get_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Qualified type name denoted by an element tag in `package`.
    pub fn type_name_for_tag(&self, package: &Package, tag: &str) -> String {
        let local = match package.tag_alias {
            Some(TagAlias::LowerCase) => upper_first(tag),
            None => tag.to_string(),
        };
        format!("{}:{}", package.prefix, local)
    }

    /// Qualified type name denoted by the local part of an `xsi:type` value.
    pub fn type_name_for_xsi(&self, package: &Package, local: &str) -> String {
        let local = match package.type_prefix.as_deref() {
            Some(type_prefix) => match local.strip_prefix(type_prefix) {
                Some(stripped) if !stripped.is_empty() => stripped,
                _ => local,
            },
            None => local,
        };
        format!("{}:{}", package.prefix, local)
    }

    /// Local element tag of a type.
    pub fn tag_for_type(&self, descriptor: &TypeDescriptor) -> String {
        let local = &descriptor.ns().local_name;
        match self
            .package_by_prefix(&descriptor.ns().prefix)
            .and_then(|p| p.tag_alias)
        {
            Some(TagAlias::LowerCase) => lower_first(local),
            None => local.clone(),
        }
    }

    /// Local part of the `xsi:type` value naming a type.
    pub fn xsi_name_for_type(&self, descriptor: &TypeDescriptor) -> String {
        let type_prefix = self
            .package_by_prefix(&descriptor.ns().prefix)
            .and_then(|p| p.type_prefix.as_deref())
            .unwrap_or("");
        format!("{}{}", type_prefix, descriptor.ns().local_name)
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{prefix}:{name}")
    }
}

#[derive(Clone, Copy)]
struct RawType<'a> {
    package: &'a PackageDefinition,
    definition: &'a TypeDefinition,
}

/// Flattens inheritance, redefinition and extension into descriptors.
struct Flattener<'a> {
    prefixes: HashSet<&'a str>,
    raw: HashMap<String, RawType<'a>>,
    order: Vec<String>,
    own: HashMap<String, Vec<PropertyDescriptor>>,
    extensions: HashMap<String, Vec<PropertyDescriptor>>,
    resolved: HashMap<String, TypeDescriptor>,
    visiting: HashSet<String>,
}

impl<'a> Flattener<'a> {
    fn new(definitions: &'a [PackageDefinition]) -> Result<Self> {
        let mut raw = HashMap::new();
        let mut order = Vec::new();

        for package in definitions {
            for definition in &package.types {
                let name = format!("{}:{}", package.prefix, definition.name);
                if raw.contains_key(&name) {
                    return Err(ModelError::DuplicateType(name));
                }
                order.push(name.clone());
                raw.insert(
                    name,
                    RawType {
                        package,
                        definition,
                    },
                );
            }
        }

        let mut flattener = Self {
            prefixes: definitions.iter().map(|p| p.prefix.as_str()).collect(),
            raw,
            order,
            own: HashMap::new(),
            extensions: HashMap::new(),
            resolved: HashMap::new(),
            visiting: HashSet::new(),
        };
        flattener.collect_properties()?;
        Ok(flattener)
    }

    fn type_ref(&self, package: &PackageDefinition, name: &str, referenced_by: &str) -> Result<String> {
        let qualified = qualify(&package.prefix, name);
        if let Some((prefix, _)) = qualified.split_once(':')
            && !self.prefixes.contains(prefix)
        {
            return Err(ModelError::UnknownPrefix {
                prefix: prefix.to_string(),
                referenced_by: referenced_by.to_string(),
            });
        }
        if !self.raw.contains_key(&qualified) {
            return Err(ModelError::UnknownType {
                name: qualified,
                referenced_by: referenced_by.to_string(),
            });
        }
        Ok(qualified)
    }

    fn collect_properties(&mut self) -> Result<()> {
        for name in &self.order {
            let RawType {
                package,
                definition,
            } = self.raw[name];

            let mut properties = Vec::with_capacity(definition.properties.len());
            for p in &definition.properties {
                let property_type = if Primitive::from_name(&p.type_name).is_some()
                    || p.type_name == ANY_ELEMENT
                {
                    PropertyType::parse(&p.type_name)
                } else {
                    let owner = format!("{}#{}", name, p.name);
                    PropertyType::Type(self.type_ref(package, &p.type_name, &owner)?)
                };

                properties.push(PropertyDescriptor {
                    name: p.name.clone(),
                    ns_name: format!("{}:{}", package.prefix, p.name),
                    prefix: package.prefix.clone(),
                    uri: package.uri.clone(),
                    property_type,
                    is_many: p.is_many,
                    is_attr: p.is_attr,
                    is_body: p.is_body,
                    is_reference: p.is_reference,
                    is_id: p.is_id,
                    is_virtual: p.is_virtual,
                    serialize: p.xml.serialize,
                    defined_by: name.clone(),
                    is_extension: false,
                    redefines: p.redefines.clone(),
                });
            }

            for target in &definition.extends {
                let target = self.type_ref(package, target, name)?;
                let grafted = properties.iter().cloned().map(|mut p| {
                    p.is_extension = true;
                    p
                });
                self.extensions.entry(target).or_default().extend(grafted);
            }

            self.own.insert(name.clone(), properties);
        }
        Ok(())
    }

    fn run(mut self) -> Result<HashMap<String, TypeDescriptor>> {
        for name in self.order.clone() {
            self.flatten(&name)?;
        }
        Ok(self.resolved)
    }

    fn flatten(&mut self, name: &str) -> Result<()> {
        if self.resolved.contains_key(name) {
            return Ok(());
        }
        if !self.visiting.insert(name.to_string()) {
            return Err(ModelError::CyclicInheritance(name.to_string()));
        }

        let RawType {
            package,
            definition,
        } = self.raw[name];

        let mut properties: Vec<PropertyDescriptor> = Vec::new();
        let mut ancestors: Vec<String> = Vec::new();

        for super_name in &definition.super_class {
            let super_name = self.type_ref(package, super_name, name)?;
            self.flatten(&super_name)?;
            let parent = &self.resolved[&super_name];

            for ancestor in std::iter::once(&super_name).chain(parent.ancestors.iter()) {
                if !ancestors.contains(ancestor) {
                    ancestors.push(ancestor.clone());
                }
            }
            for p in &parent.properties {
                if !properties.iter().any(|q| q.ns_name == p.ns_name) {
                    properties.push(p.clone());
                }
            }
        }

        for property in self.own.get(name).cloned().unwrap_or_default() {
            add_own_property(&mut properties, property)?;
        }

        if let Some(grafted) = self.extensions.get(name) {
            for p in grafted {
                if !properties.iter().any(|q| q.ns_name == p.ns_name) {
                    properties.push(p.clone());
                }
            }
        }

        self.visiting.remove(name);
        self.resolved.insert(
            name.to_string(),
            TypeDescriptor {
                name: name.to_string(),
                ns: NsName {
                    prefix: package.prefix.clone(),
                    local_name: definition.name.clone(),
                    uri: package.uri.clone(),
                },
                is_abstract: definition.is_abstract,
                properties,
                ancestors,
            },
        );
        Ok(())
    }
}

fn add_own_property(
    properties: &mut Vec<PropertyDescriptor>,
    property: PropertyDescriptor,
) -> Result<()> {
    if let Some(target) = property.redefines.as_deref() {
        let invalid = || ModelError::InvalidRedefine {
            property: property.ns_name.clone(),
            target: target.to_string(),
        };
        let (type_name, property_name) = target.split_once('#').ok_or_else(invalid)?;
        let type_name = qualify(&property.prefix, type_name);
        let position = properties
            .iter()
            .position(|p| p.defined_by == type_name && p.name == property_name)
            .ok_or_else(invalid)?;
        properties[position] = property;
    } else if let Some(position) = properties.iter().position(|p| p.ns_name == property.ns_name) {
        properties[position] = property;
    } else {
        properties.push(property);
    }
    Ok(())
}
