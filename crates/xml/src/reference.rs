//! Deferred reference resolution.

use tracing::debug;
use xbind_model::Model;

use crate::context::{ParseContext, Warning};
use crate::element::{Document, Value};
use crate::error::ContentError;

/// Resolves every recorded reference against the identity index.
///
/// Runs once, after the tree is complete, in recording order. Missing ids
/// become warnings and leave the property untouched.
pub(crate) fn resolve_references(model: &Model, document: &mut Document, context: &mut ParseContext) {
    let records = context.references().to_vec();
    let mut resolved = 0usize;

    for record in records {
        let Some(target) = context.element_by_id(&record.id) else {
            let cause = ContentError::UnresolvedReference(record.id.clone());
            context.add_warning(
                Warning::new(cause.to_string())
                    .with_element(record.element)
                    .with_property(record.property.clone())
                    .with_value(record.id.clone()),
            );
            continue;
        };

        let property = document
            .get(record.element)
            .and_then(|holder| model.get_type(holder.type_name()))
            .and_then(|descriptor| descriptor.property_by_ns_name(&record.property));

        let Some(property) = property else {
            continue;
        };

        if property.is_many {
            document.push(record.element, &property.name, Value::Reference(target));
        } else {
            document.set(record.element, &property.name, Value::Reference(target));
        }
        resolved += 1;
    }

    debug!(
        resolved,
        unresolved = context.references().len() - resolved,
        "Resolved references"
    );
}
