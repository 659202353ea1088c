//! The element builder.
//!
//! One [`Frame`] per open element. Start tags are resolved against the
//! frame below them, attributes are assigned immediately, text is buffered
//! per frame, and finished elements are attached to their parent when
//! their end tag arrives.

use quick_xml::events::BytesStart;
use quick_xml::events::attributes::AttrError;
use tracing::{debug, trace};
use xbind_model::{Model, Primitive, PropertyDescriptor, TypeDescriptor};

use crate::context::{ParseContext, ReferenceRecord, Warning};
use crate::element::{Document, ElementId, GenericDescriptor, Value};
use crate::error::{ContentError, ParseError, ReadErrorKind};
use crate::namespace::{DisplayNames, NamespaceScope, ResolvedName, declared_prefix};
use crate::reference::resolve_references;
use crate::types::{ChildTarget, TypeResolver, coerce, is_valid_id, is_xsi_type, preview};

/// Outcome of unparsable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Fatal,
    Warning,
}

/// The single strict/lax decision point.
///
/// Identity errors are fatal in every mode.
pub(crate) fn on_unparsable(lax: bool, cause: &ContentError) -> Disposition {
    if lax && !cause.is_identity() {
        Disposition::Warning
    } else {
        Disposition::Fatal
    }
}

/// What the document root must be.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RootTarget<'m> {
    Typed(&'m TypeDescriptor),
    Generic,
}

enum Frame<'m> {
    Typed {
        id: ElementId,
        descriptor: &'m TypeDescriptor,
        property: Option<&'m PropertyDescriptor>,
        text: String,
        tag: String,
        offset: usize,
    },
    /// Primitive or reference value of the typed element below.
    Value {
        property: &'m PropertyDescriptor,
        text: String,
        tag: String,
        offset: usize,
    },
    Generic {
        id: ElementId,
        property: Option<&'m PropertyDescriptor>,
        text: String,
    },
    /// Content dropped by the lax policy.
    Skip,
}

type Attributes = Vec<(String, String)>;

pub(crate) struct Builder<'m, 'a> {
    model: &'m Model,
    resolver: TypeResolver<'m>,
    source: &'a str,
    lax: bool,
    root: RootTarget<'m>,
    scope: NamespaceScope,
    names: DisplayNames,
    stack: Vec<Frame<'m>>,
    document: Document,
    context: ParseContext,
    root_closed: bool,
}

impl<'m, 'a> Builder<'m, 'a> {
    pub(crate) fn new(model: &'m Model, source: &'a str, lax: bool, root: RootTarget<'m>) -> Self {
        Self {
            model,
            resolver: TypeResolver::new(model),
            source,
            lax,
            root,
            scope: NamespaceScope::new(),
            names: DisplayNames::new(),
            stack: Vec::new(),
            document: Document::new(),
            context: ParseContext::new(),
            root_closed: false,
        }
    }

    /// 0-based line and column (in characters) of a byte offset.
    fn position(&self, offset: usize) -> (usize, usize) {
        let before = self.source.get(..offset).unwrap_or(self.source);
        let line = before.matches('\n').count();
        let column = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0);
        (line, column)
    }

    fn unparsable(&self, tag: &str, offset: usize, cause: ContentError) -> ReadErrorKind {
        let (line, column) = self.position(offset);
        ReadErrorKind::Unparsable {
            tag: tag.to_string(),
            line,
            column,
            cause,
        }
    }

    pub(crate) fn syntax(&self, message: impl Into<String>, offset: usize) -> ReadErrorKind {
        let (line, column) = self.position(offset);
        ReadErrorKind::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn add_warning(&mut self, warning: Warning) {
        self.context.add_warning(warning);
    }

    /// Records `cause` as a warning in unparsable-content form.
    fn warn_content(&mut self, tag: &str, offset: usize, cause: ContentError, element: Option<ElementId>) {
        let message = self.unparsable(tag, offset, cause).to_string();
        let warning = Warning::new(message);
        self.context.add_warning(match element {
            Some(id) => warning.with_element(id),
            None => warning,
        });
    }

    /// Applies the failure policy to a start tag that cannot be matched.
    fn reject(&mut self, tag: &str, offset: usize, cause: ContentError) -> Result<Frame<'m>, ReadErrorKind> {
        if self.stack.is_empty() {
            return Err(match self.root {
                RootTarget::Typed(expected) if self.lax => {
                    debug!(tag, cause = %cause, "Root element does not match");
                    ReadErrorKind::RootMismatch(expected.name().to_string())
                }
                _ => self.unparsable(tag, offset, cause),
            });
        }
        match on_unparsable(self.lax, &cause) {
            Disposition::Fatal => Err(self.unparsable(tag, offset, cause)),
            Disposition::Warning => {
                debug!(tag, cause = %cause, "Skipping unparsable content");
                self.warn_content(tag, offset, cause, None);
                Ok(Frame::Skip)
            }
        }
    }

    pub(crate) fn open(&mut self, start: &BytesStart<'_>, offset: usize) -> Result<(), ReadErrorKind> {
        if self.stack.is_empty() && self.root_closed {
            return Err(self.syntax("multiple root elements", offset));
        }
        if matches!(self.stack.last(), Some(Frame::Skip)) {
            self.scope.push(Vec::new());
            self.stack.push(Frame::Skip);
            return Ok(());
        }

        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let (attrs, issues) = self.collect_attributes(start);
        let declarations = attrs
            .iter()
            .filter_map(|(name, value)| declared_prefix(name).map(|p| (p.to_string(), value.clone())))
            .collect();
        self.scope.push(declarations);

        let frame = self.enter(&tag, &attrs, offset)?;
        let element = match &frame {
            Frame::Typed { id, .. } | Frame::Generic { id, .. } => Some(*id),
            Frame::Value { .. } | Frame::Skip => None,
        };
        for cause in issues {
            self.warn_content(&tag, offset, cause, element);
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Splits the attribute list into well-formed pairs and syntax issues.
    fn collect_attributes(&self, start: &BytesStart<'_>) -> (Attributes, Vec<ContentError>) {
        let mut attrs: Attributes = Vec::new();
        let mut issues = Vec::new();
        for attr in start.attributes().with_checks(false) {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    issues.push(attribute_error(&err));
                    continue;
                }
            };
            let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if attrs.iter().any(|(existing, _)| *existing == name) {
                issues.push(ContentError::DuplicateAttribute(name));
                continue;
            }
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attrs.push((name, value));
        }
        (attrs, issues)
    }

    fn enter(&mut self, tag: &str, attrs: &Attributes, offset: usize) -> Result<Frame<'m>, ReadErrorKind> {
        let name = match self.scope.resolve_element(tag) {
            Ok(name) => name,
            Err(cause) => return self.reject(tag, offset, cause),
        };

        let parent = match self.stack.last() {
            None => None,
            Some(Frame::Typed { descriptor, .. }) => Some(*descriptor),
            Some(Frame::Generic { .. }) => return Ok(self.open_generic(&name, attrs, None)),
            Some(Frame::Value { .. }) => {
                return self.reject(tag, offset, ContentError::UnexpectedElement(tag.to_string()));
            }
            Some(Frame::Skip) => return Ok(Frame::Skip),
        };

        if parent.is_none() && matches!(self.root, RootTarget::Generic) {
            return Ok(self.open_generic(&name, attrs, None));
        }

        let xsi_type = attrs
            .iter()
            .find(|(n, _)| is_xsi_type(&self.scope, n))
            .map(|(_, raw)| raw.as_str());

        match (parent, self.root) {
            (None, RootTarget::Typed(expected)) => {
                match self.resolver.resolve_root(expected, &name, tag, &self.scope, xsi_type) {
                    Ok(descriptor) => {
                        debug!(tag, type_name = descriptor.name(), "Resolved root element");
                        self.open_typed(descriptor, None, tag, attrs, offset)
                    }
                    Err(cause) => self.reject(tag, offset, cause),
                }
            }
            (None, RootTarget::Generic) => Ok(self.open_generic(&name, attrs, None)),
            (Some(parent), _) => match self.resolver.resolve_child(parent, &name, tag, &self.scope, xsi_type) {
                Ok(ChildTarget::Value { property }) => Ok(Frame::Value {
                    property,
                    text: String::new(),
                    tag: tag.to_string(),
                    offset,
                }),
                Ok(ChildTarget::Typed {
                    property,
                    descriptor,
                }) => self.open_typed(descriptor, Some(property), tag, attrs, offset),
                Ok(ChildTarget::Generic { property }) => {
                    Ok(self.open_generic(&name, attrs, Some(property)))
                }
                Err(cause) => self.reject(tag, offset, cause),
            },
        }
    }

    fn open_typed(
        &mut self,
        descriptor: &'m TypeDescriptor,
        property: Option<&'m PropertyDescriptor>,
        tag: &str,
        attrs: &Attributes,
        offset: usize,
    ) -> Result<Frame<'m>, ReadErrorKind> {
        let id = self.document.create_typed(descriptor.name());
        trace!(tag, type_name = descriptor.name(), "Opened typed element");

        for (name, value) in attrs {
            self.assign_attribute(id, descriptor, tag, offset, name, value)?;
        }

        Ok(Frame::Typed {
            id,
            descriptor,
            property,
            text: String::new(),
            tag: tag.to_string(),
            offset,
        })
    }

    fn assign_attribute(
        &mut self,
        id: ElementId,
        descriptor: &'m TypeDescriptor,
        tag: &str,
        offset: usize,
        name: &str,
        value: &str,
    ) -> Result<(), ReadErrorKind> {
        if declared_prefix(name).is_some() {
            self.document.set_attr(id, name, value);
            return Ok(());
        }
        if is_xsi_type(&self.scope, name) {
            return Ok(());
        }

        let resolved = match self.scope.resolve_attribute(name) {
            Ok(resolved) => resolved,
            Err(cause) => {
                self.warn_content(tag, offset, cause, Some(id));
                self.document.set_attr(id, name, value);
                return Ok(());
            }
        };

        let property = match resolved.uri.as_deref() {
            None => descriptor.property(&resolved.local),
            Some(uri) => match self.model.package_by_uri(uri) {
                Some(package) => {
                    descriptor.property_by_ns_name(&format!("{}:{}", package.prefix, resolved.local))
                }
                None => {
                    // foreign namespace, kept for round-tripping
                    self.document.set_attr(id, name, value);
                    return Ok(());
                }
            },
        };

        match property.filter(|p| !p.is_containment()) {
            Some(property) => self.assign_text(id, property, value, tag, offset, true),
            None => {
                let cause = ContentError::UnknownAttribute(name.to_string());
                self.context
                    .add_warning(Warning::new(cause.to_string()).with_element(id));
                self.document.set_attr(id, name, value);
                Ok(())
            }
        }
    }

    /// Assigns textual content (attribute value or value-child body).
    ///
    /// Attribute values of many-valued primitives are kept whole.
    fn assign_text(
        &mut self,
        id: ElementId,
        property: &'m PropertyDescriptor,
        raw: &str,
        tag: &str,
        offset: usize,
        attribute: bool,
    ) -> Result<(), ReadErrorKind> {
        if property.is_reference {
            let tokens: Vec<&str> = if property.is_many {
                raw.split_whitespace().collect()
            } else {
                vec![raw.trim()]
            };
            for token in tokens.into_iter().filter(|t| !t.is_empty()) {
                self.context.add_reference(ReferenceRecord {
                    element: id,
                    property: property.ns_name.clone(),
                    id: token.to_string(),
                });
            }
            return Ok(());
        }

        if property.is_id {
            if !is_valid_id(raw) {
                return Err(self.unparsable(tag, offset, ContentError::IllegalId(raw.to_string())));
            }
            if let Err(cause) = self.context.register_id(raw, id) {
                return Err(self.unparsable(tag, offset, cause));
            }
            self.document.set_identity(id, raw);
        }

        match coerce(property.primitive().unwrap_or(Primitive::String), raw) {
            Ok(value) if property.is_many && !attribute => {
                self.document.push(id, &property.name, value)
            }
            Ok(value) => self.document.set(id, &property.name, value),
            Err(cause) => self.context.add_warning(
                Warning::new(cause.to_string())
                    .with_element(id)
                    .with_property(property.ns_name.clone())
                    .with_value(raw),
            ),
        }
        Ok(())
    }

    fn open_generic(
        &mut self,
        name: &ResolvedName,
        attrs: &Attributes,
        property: Option<&'m PropertyDescriptor>,
    ) -> Frame<'m> {
        let prefix = self.names.prefix(self.model, name);
        let descriptor =
            GenericDescriptor::new(&prefix, &name.local, name.uri.as_deref().unwrap_or(""));
        trace!(name = %descriptor.name, "Opened generic element");

        let id = self.document.create_generic(descriptor);
        for (attr, value) in attrs {
            self.document.set_attr(id, attr.clone(), value.clone());
        }

        Frame::Generic {
            id,
            property,
            text: String::new(),
        }
    }

    /// Buffers character data for the innermost element.
    pub(crate) fn text(&mut self, text: &str, offset: usize) -> Result<(), ReadErrorKind> {
        match self.stack.last_mut() {
            Some(
                Frame::Typed { text: buffer, .. }
                | Frame::Value { text: buffer, .. }
                | Frame::Generic { text: buffer, .. },
            ) => {
                buffer.push_str(text);
                Ok(())
            }
            Some(Frame::Skip) => Ok(()),
            None if text.trim().is_empty() => Ok(()),
            None => Err(self.syntax("text outside of root element", offset)),
        }
    }

    pub(crate) fn close(&mut self, offset: usize) -> Result<(), ReadErrorKind> {
        let Some(frame) = self.stack.pop() else {
            return Err(self.syntax("unexpected end tag", offset));
        };
        self.scope.pop();

        match frame {
            Frame::Skip => {}
            Frame::Value {
                property,
                text,
                tag,
                offset,
            } => {
                if let Some(Frame::Typed { id, .. }) = self.stack.last() {
                    let id = *id;
                    self.assign_text(id, property, &text, &tag, offset, false)?;
                }
            }
            Frame::Typed {
                id,
                descriptor,
                property,
                text,
                tag,
                offset,
            } => {
                let body = text.trim();
                if !body.is_empty() {
                    match descriptor.body_property() {
                        Some(body_property) => {
                            self.assign_text(id, body_property, body, &tag, offset, false)?
                        }
                        None => {
                            let cause = ContentError::UnexpectedBodyText(preview(body));
                            self.context
                                .add_warning(Warning::new(cause.to_string()).with_element(id));
                        }
                    }
                }
                self.attach(id, property);
            }
            Frame::Generic { id, property, text } => {
                let body = text.trim();
                if !body.is_empty() {
                    self.document.set_body(id, Some(body.to_string()));
                }
                self.attach(id, property);
            }
        }

        if self.stack.is_empty() {
            self.root_closed = true;
        }
        Ok(())
    }

    fn attach(&mut self, id: ElementId, property: Option<&'m PropertyDescriptor>) {
        match self.stack.last() {
            None => self.document.set_root(id),
            Some(Frame::Generic { id: parent, .. }) => self.document.append_child(*parent, id),
            Some(Frame::Typed { id: parent, .. }) => {
                if let Some(property) = property {
                    if property.is_many {
                        self.document.push(*parent, &property.name, Value::Element(id));
                    } else {
                        self.document.set(*parent, &property.name, Value::Element(id));
                    }
                }
            }
            Some(Frame::Value { .. } | Frame::Skip) => {}
        }
    }

    /// Completes the parse: checks the document is closed and resolves
    /// references.
    pub(crate) fn finish(mut self) -> Result<(Document, ParseContext), ParseError> {
        if !self.stack.is_empty() {
            let kind = self.syntax("unexpected end of document", self.source.len());
            return Err(ParseError::new(kind, self.context));
        }
        if self.document.root().is_none() {
            return Err(ParseError::new(ReadErrorKind::MissingRoot, self.context));
        }

        resolve_references(self.model, &mut self.document, &mut self.context);
        Ok((self.document, self.context))
    }

    pub(crate) fn into_context(self) -> ParseContext {
        self.context
    }
}

fn attribute_error(err: &AttrError) -> ContentError {
    match err {
        AttrError::ExpectedEq(_) | AttrError::ExpectedValue(_) => ContentError::MissingAttributeValue,
        AttrError::UnquotedValue(_) => ContentError::UnquotedValue,
        _ => ContentError::QuoteMismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy() {
        let unknown = ContentError::UnknownType("a:B".to_string());
        let duplicate = ContentError::DuplicateId("x".to_string());

        assert_eq!(on_unparsable(false, &unknown), Disposition::Fatal);
        assert_eq!(on_unparsable(true, &unknown), Disposition::Warning);
        assert_eq!(on_unparsable(true, &duplicate), Disposition::Fatal);
    }

    #[test]
    fn test_position() {
        let model = Model::default();
        let source = "<a>\n  <b/>\n</a>";
        let builder = Builder::new(&model, source, false, RootTarget::Generic);

        assert_eq!(builder.position(0), (0, 0));
        assert_eq!(builder.position(6), (1, 2));
        assert_eq!(builder.position(source.len()), (2, 4));
    }

    #[test]
    fn test_attribute_error() {
        let message = |err: AttrError| attribute_error(&err).to_string();

        assert_eq!(message(AttrError::ExpectedEq(3)), "missing attribute value");
        assert_eq!(message(AttrError::ExpectedValue(4)), "missing attribute value");
        assert_eq!(message(AttrError::UnquotedValue(4)), "attribute value must be quoted");
        assert_eq!(message(AttrError::ExpectedQuote(9, b'"')), "attribute value quote mismatch");
    }
}
