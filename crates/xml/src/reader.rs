//! XML to element graph.
//!
//! The [`Reader`] drives a `quick_xml` event stream into the element
//! builder and resolves references once the tree is complete.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xbind_model::Model;
//! use xbind_xml::Reader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Arc::new(Model::from_files(["props.json"])?);
//! let reader = Reader::new(model);
//! let root = reader.handler("props:Root");
//!
//! let result = reader.from_xml(r#"<props:root xmlns:props="http://properties"/>"#, &root)?;
//! println!("{}", result.document.to_json(result.root()));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;
use serde::Deserialize;
use tracing::debug;
use xbind_model::Model;

use crate::builder::{Builder, RootTarget};
use crate::context::{ParseContext, Warning};
use crate::element::{Document, ElementId};
use crate::error::{ContentError, ParseError, ReadErrorKind, Result};

/// Reader configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Skip unparsable content with a warning instead of failing.
    pub lax: bool,
}

/// Binds the expected root type of a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootHandler {
    type_name: Option<String>,
}

impl RootHandler {
    /// Accepts any root element as generic content.
    pub fn generic() -> Self {
        Self { type_name: None }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

/// A successful parse.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub document: Document,
    pub context: ParseContext,
}

impl ParseResult {
    /// The root element. Always present after a successful parse.
    pub fn root(&self) -> ElementId {
        self.document.root().unwrap_or(ElementId(0))
    }
}

/// Parses documents against a [`Model`].
///
/// Stateless between calls; one reader can serve many parses.
#[derive(Debug, Clone)]
pub struct Reader {
    model: Arc<Model>,
    options: ReaderOptions,
}

impl Reader {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            options: ReaderOptions::default(),
        }
    }

    pub fn with_options(model: Arc<Model>, options: ReaderOptions) -> Self {
        Self { model, options }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Binds a qualified root type name (`props:Root`).
    pub fn handler(&self, type_name: &str) -> RootHandler {
        RootHandler {
            type_name: Some(type_name.to_string()),
        }
    }

    /// Parses UTF-8 bytes.
    pub fn from_slice(&self, bytes: &[u8], handler: &RootHandler) -> Result<ParseResult> {
        match std::str::from_utf8(bytes) {
            Ok(xml) => self.from_xml(xml, handler),
            Err(err) => {
                let valid = &bytes[..err.valid_up_to()];
                let prefix = String::from_utf8_lossy(valid);
                let line = prefix.matches('\n').count();
                let column = prefix
                    .rsplit('\n')
                    .next()
                    .map(|l| l.chars().count())
                    .unwrap_or(0);
                Err(ParseError::new(
                    ReadErrorKind::Syntax {
                        message: format!("invalid UTF-8: {err}"),
                        line,
                        column,
                    },
                    ParseContext::new(),
                ))
            }
        }
    }

    /// Parses `xml` into an element graph rooted at the handler's type.
    pub fn from_xml(&self, xml: &str, handler: &RootHandler) -> Result<ParseResult> {
        let root = match handler.type_name() {
            Some(name) => match self.model.get_type(name) {
                Some(descriptor) => RootTarget::Typed(descriptor),
                None => {
                    return Err(ParseError::new(
                        ReadErrorKind::UnknownRootType(name.to_string()),
                        ParseContext::new(),
                    ));
                }
            },
            None => RootTarget::Generic,
        };

        debug!(
            root = handler.type_name().unwrap_or("<generic>"),
            lax = self.options.lax,
            "Parsing document"
        );

        let mut builder = Builder::new(&self.model, xml, self.options.lax, root);
        if let Err(kind) = drive(&mut builder, xml) {
            return Err(ParseError::new(kind, builder.into_context()));
        }

        let (document, context) = builder.finish()?;
        debug!(
            elements = document.len(),
            warnings = context.warnings().len(),
            "Parsed document"
        );
        Ok(ParseResult { document, context })
    }
}

fn drive(builder: &mut Builder<'_, '_>, xml: &str) -> std::result::Result<(), ReadErrorKind> {
    let mut reader = quick_xml::Reader::from_str(xml);

    loop {
        let offset = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let position = reader.error_position() as usize;
                return Err(builder.syntax(err.to_string(), position));
            }
        };

        match event {
            Event::Start(e) => builder.open(&e, offset)?,
            Event::Empty(e) => {
                builder.open(&e, offset)?;
                builder.close(offset)?;
            }
            Event::End(_) => builder.close(offset)?,
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|err| builder.syntax(err.to_string(), offset))?;
                builder.text(&text, offset)?;
            }
            Event::GeneralRef(e) => {
                let raw = e
                    .decode()
                    .map_err(|err| builder.syntax(err.to_string(), offset))?;
                builder.text(&resolve_entity(&raw), offset)?;
            }
            Event::CData(e) => builder.text(&String::from_utf8_lossy(&e), offset)?,
            Event::Decl(e) => {
                if let Some(Ok(encoding)) = e.encoding() {
                    check_encoding(builder, &String::from_utf8_lossy(&encoding));
                }
            }
            Event::PI(e) => {
                // `<?XML ...?>` is not recognised as a declaration
                if e.target().eq_ignore_ascii_case(b"xml") {
                    if let Some(encoding) = declared_encoding(&String::from_utf8_lossy(e.content())) {
                        check_encoding(builder, &encoding);
                    }
                }
            }
            Event::Comment(_) | Event::DocType(_) => {}
            Event::Eof => return Ok(()),
        }
    }
}

fn check_encoding(builder: &mut Builder<'_, '_>, encoding: &str) {
    if !encoding.eq_ignore_ascii_case("utf-8") {
        let cause = ContentError::UnsupportedEncoding(encoding.to_string());
        builder.add_warning(Warning::new(cause.to_string()));
    }
}

/// The `encoding` pseudo-attribute of a declaration body.
fn declared_encoding(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    let start = lower.find("encoding")? + "encoding".len();
    let rest = content[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

/// Resolves a general entity reference; unknown entities stay literal.
fn resolve_entity(raw: &str) -> String {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return resolved.to_string();
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => rest.parse::<u32>().ok(),
        };
        if let Some(ch) = code.and_then(char::from_u32) {
            return ch.to_string();
        }
    }

    format!("&{raw};")
}
