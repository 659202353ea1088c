//! # xbind xml
//!
//! Bidirectional, model-driven XML data binding.
//!
//! The [`Reader`] turns a namespaced XML document into a typed element
//! graph described by an [`xbind_model::Model`]: start tags are matched to
//! types and properties, attributes and text are coerced to primitives,
//! content outside the model is kept as generic elements, and identifier
//! references are resolved once the tree is complete. The [`Writer`] does
//! the reverse, choosing a minimal set of namespace declarations.
//!
//! Parsing is strict by default. With [`ReaderOptions::lax`] unparsable
//! content is skipped and reported through [`ParseContext::warnings`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use xbind_model::Model;
//! use xbind_xml::{Reader, Writer};
//!
//! let model = Arc::new(Model::from_files(["props.json"])?);
//! let reader = Reader::new(model.clone());
//! let result = reader.from_xml(xml, &reader.handler("props:Root"))?;
//!
//! for warning in result.context.warnings() {
//!     eprintln!("{}", warning.message);
//! }
//!
//! let xml = Writer::new(model).to_xml(&result.document, result.root())?;
//! ```

mod builder;
pub mod context;
pub mod element;
pub mod error;
pub mod namespace;
pub mod reader;
mod reference;
pub mod types;
pub mod writer;

pub use context::{ParseContext, ReferenceRecord, Warning};
pub use element::{Document, ElementData, ElementId, ElementKind, GenericDescriptor, Value};
pub use error::{ContentError, ParseError, ReadErrorKind, WriteError};
pub use reader::{ParseResult, Reader, ReaderOptions, RootHandler};
pub use writer::{Writer, WriterOptions};
