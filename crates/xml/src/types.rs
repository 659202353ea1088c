//! Type resolution and primitive coercion.
//!
//! [`TypeResolver`] decides what a start tag becomes: a typed child bound
//! to a property, a primitive or reference value, generic extension
//! content, or a failure.

use xbind_model::{Model, Primitive, PropertyDescriptor, PropertyType, TypeDescriptor};

use crate::element::Value;
use crate::error::ContentError;
use crate::namespace::{NamespaceScope, QName, ResolvedName};

/// Where a nested start tag goes.
#[derive(Debug, Clone, Copy)]
pub enum ChildTarget<'m> {
    /// Primitive or reference value read from the element text.
    Value { property: &'m PropertyDescriptor },
    Typed {
        property: &'m PropertyDescriptor,
        descriptor: &'m TypeDescriptor,
    },
    Generic { property: &'m PropertyDescriptor },
}

/// Resolves element names to model types.
#[derive(Debug, Clone, Copy)]
pub struct TypeResolver<'m> {
    model: &'m Model,
}

impl<'m> TypeResolver<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    fn get(&self, type_name: &str) -> Result<&'m TypeDescriptor, ContentError> {
        self.model
            .get_type(type_name)
            .ok_or_else(|| ContentError::UnknownType(type_name.to_string()))
    }

    /// Resolves an `xsi:type` value.
    ///
    /// Unprefixed values take the default namespace; the package's type
    /// prefix is stripped from the local part.
    pub fn resolve_xsi_type(
        &self,
        scope: &NamespaceScope,
        raw: &str,
    ) -> Result<&'m TypeDescriptor, ContentError> {
        let name = scope.resolve_element(raw.trim())?;
        let package = name
            .uri
            .as_deref()
            .and_then(|uri| self.model.package_by_uri(uri))
            .ok_or_else(|| ContentError::UnknownType(raw.trim().to_string()))?;
        self.get(&self.model.type_name_for_xsi(package, &name.local))
    }

    fn xsi_override(
        &self,
        scope: &NamespaceScope,
        xsi_type: Option<&str>,
    ) -> Result<Option<&'m TypeDescriptor>, ContentError> {
        xsi_type
            .map(|raw| self.resolve_xsi_type(scope, raw))
            .transpose()
    }

    fn with_override(
        &self,
        declared: &'m TypeDescriptor,
        xsi_type: Option<&'m TypeDescriptor>,
        tag: &str,
    ) -> Result<&'m TypeDescriptor, ContentError> {
        match xsi_type {
            Some(actual) if actual.is_a(declared.name()) => Ok(actual),
            Some(_) => Err(ContentError::UnexpectedElement(tag.to_string())),
            None => Ok(declared),
        }
    }

    /// Resolves the document root against the expected type.
    ///
    /// `xsi_type` is the raw attribute value, looked up only once the tag
    /// itself is known to the model.
    pub fn resolve_root(
        &self,
        expected: &'m TypeDescriptor,
        name: &ResolvedName,
        tag: &str,
        scope: &NamespaceScope,
        xsi_type: Option<&str>,
    ) -> Result<&'m TypeDescriptor, ContentError> {
        let package = name
            .uri
            .as_deref()
            .and_then(|uri| self.model.package_by_uri(uri))
            .ok_or_else(|| ContentError::UnexpectedElement(tag.to_string()))?;

        let actual = match self.xsi_override(scope, xsi_type)? {
            Some(descriptor) => descriptor,
            None => self.get(&self.model.type_name_for_tag(package, &name.local))?,
        };
        if actual.is_a(expected.name()) {
            Ok(actual)
        } else {
            Err(ContentError::UnexpectedElement(tag.to_string()))
        }
    }

    /// Resolves a nested start tag inside a typed element.
    ///
    /// `xsi_type` only matters where a typed element is built; value and
    /// generic children ignore it.
    pub fn resolve_child(
        &self,
        parent: &'m TypeDescriptor,
        name: &ResolvedName,
        tag: &str,
        scope: &NamespaceScope,
        xsi_type: Option<&str>,
    ) -> Result<ChildTarget<'m>, ContentError> {
        let package = name
            .uri
            .as_deref()
            .and_then(|uri| self.model.package_by_uri(uri));

        let Some(package) = package else {
            return parent
                .properties()
                .iter()
                .find(|p| p.accepts_any())
                .map(|property| ChildTarget::Generic { property })
                .ok_or_else(|| ContentError::UnrecognizedElement(tag.to_string()));
        };

        let ns_name = format!("{}:{}", package.prefix, name.local);
        if let Some(property) = parent
            .property_by_ns_name(&ns_name)
            .filter(|p| !p.is_attr && !p.is_virtual)
        {
            if property.is_reference || property.primitive().is_some() {
                return Ok(ChildTarget::Value { property });
            }
            return match &property.property_type {
                PropertyType::Type(type_name) => {
                    let declared = self.get(type_name)?;
                    let actual = self.xsi_override(scope, xsi_type)?;
                    let descriptor = self.with_override(declared, actual, tag)?;
                    Ok(ChildTarget::Typed {
                        property,
                        descriptor,
                    })
                }
                PropertyType::Any => match self.xsi_override(scope, xsi_type) {
                    Ok(Some(descriptor)) => Ok(ChildTarget::Typed {
                        property,
                        descriptor,
                    }),
                    // unknown types stay extension content
                    Ok(None) | Err(_) => Ok(ChildTarget::Generic { property }),
                },
                PropertyType::Primitive(_) => Ok(ChildTarget::Value { property }),
            };
        }

        let descriptor = match self.xsi_override(scope, xsi_type)? {
            Some(descriptor) => descriptor,
            None => self.get(&self.model.type_name_for_tag(package, &name.local))?,
        };
        parent
            .properties()
            .iter()
            .filter(|p| p.is_containment())
            .find(|p| descriptor.fits(p))
            .map(|property| ChildTarget::Typed {
                property,
                descriptor,
            })
            .ok_or_else(|| ContentError::UnexpectedElement(tag.to_string()))
    }
}

/// Parses `raw` as the given primitive.
pub fn coerce(primitive: Primitive, raw: &str) -> Result<Value, ContentError> {
    let illegal = || ContentError::IllegalValue {
        type_name: primitive.name().to_string(),
        value: raw.to_string(),
    };
    match primitive {
        Primitive::String => Ok(Value::String(raw.to_string())),
        Primitive::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| illegal()),
        Primitive::Real => raw.trim().parse().map(Value::Real).map_err(|_| illegal()),
        Primitive::Boolean => match raw.trim() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(illegal()),
        },
    }
}

/// Whether `value` is a legal identifier token.
pub fn is_valid_id(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

/// Shortened text for diagnostics.
pub(crate) fn preview(text: &str) -> String {
    const LIMIT: usize = 20;
    let text = text.trim();
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

/// Whether `raw` is the `xsi:type` attribute under `scope`.
pub(crate) fn is_xsi_type(scope: &NamespaceScope, raw: &str) -> bool {
    let qname = QName::parse(raw);
    qname.local == "type"
        && qname
            .prefix
            .and_then(|p| scope.lookup(p))
            .is_some_and(|uri| uri == crate::namespace::XSI_URI)
}
