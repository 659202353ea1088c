//! Diagnostics and bookkeeping of one parse.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::element::ElementId;
use crate::error::ContentError;

/// A non-fatal problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            element: None,
            property: None,
            value: None,
        }
    }

    pub fn with_element(mut self, element: ElementId) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// An identifier waiting to be resolved into an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    /// Element holding the reference property.
    pub element: ElementId,
    /// Qualified property name (`props:referencedComplex`).
    pub property: String,
    pub id: String,
}

/// Warnings, pending references and the identity index of one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
    warnings: Vec<Warning>,
    references: Vec<ReferenceRecord>,
    elements_by_id: HashMap<String, ElementId>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Every reference recorded during the build, in document order.
    pub fn references(&self) -> &[ReferenceRecord] {
        &self.references
    }

    pub fn elements_by_id(&self) -> &HashMap<String, ElementId> {
        &self.elements_by_id
    }

    pub fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.elements_by_id.get(id).copied()
    }

    pub(crate) fn add_warning(&mut self, warning: Warning) {
        debug!(message = %warning.message, "Parse warning");
        self.warnings.push(warning);
    }

    pub(crate) fn add_reference(&mut self, record: ReferenceRecord) {
        self.references.push(record);
    }

    /// Registers an identifier; a second element with the same id fails.
    pub(crate) fn register_id(&mut self, id: &str, element: ElementId) -> Result<(), ContentError> {
        if self.elements_by_id.contains_key(id) {
            return Err(ContentError::DuplicateId(id.to_string()));
        }
        self.elements_by_id.insert(id.to_string(), element);
        Ok(())
    }
}
