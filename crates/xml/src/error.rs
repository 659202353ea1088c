//! Error types for reading and writing documents.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::context::ParseContext;

/// A problem with one piece of document content.
///
/// These are the nested causes of unparsable-content failures and of most
/// warnings. Whether a cause aborts the parse is decided by the reader's
/// failure policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),

    #[error("unknown type <{0}>")]
    UnknownType(String),

    /// Element from a namespace the model does not own, where no property
    /// accepts extension content.
    #[error("unrecognized element <{0}>")]
    UnrecognizedElement(String),

    #[error("unknown namespace prefix <{0}>")]
    UnknownPrefix(String),

    #[error("illegal ID <{0}>")]
    IllegalId(String),

    #[error("duplicate ID <{0}>")]
    DuplicateId(String),

    #[error("unknown attribute <{0}>")]
    UnknownAttribute(String),

    #[error("unexpected body text <{0}>")]
    UnexpectedBodyText(String),

    #[error("illegal {type_name} value <{value}>")]
    IllegalValue { type_name: String, value: String },

    #[error("missing attribute value")]
    MissingAttributeValue,

    #[error("attribute value quote mismatch")]
    QuoteMismatch,

    #[error("attribute value must be quoted")]
    UnquotedValue,

    #[error("attribute <{0}> already defined")]
    DuplicateAttribute(String),

    #[error("unresolved reference <{0}>")]
    UnresolvedReference(String),

    #[error("unsupported document encoding <{0}>")]
    UnsupportedEncoding(String),
}

impl ContentError {
    /// Identity errors abort the parse in every mode.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            ContentError::IllegalId(_) | ContentError::DuplicateId(_)
        )
    }
}

/// Why a parse failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// Content at `line`/`column` (0-based) could not be matched.
    #[error(
        "unparsable content <{tag}> detected\n\tline: {line}\n\tcolumn: {column}\n\tnested error: {cause}"
    )]
    Unparsable {
        tag: String,
        line: usize,
        column: usize,
        cause: ContentError,
    },

    /// Lax parse whose root element does not match the expected type.
    #[error("failed to parse document as <{0}>")]
    RootMismatch(String),

    #[error("{message}\n\tline: {line}\n\tcolumn: {column}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("missing root element")]
    MissingRoot,

    #[error("unknown root type <{0}>")]
    UnknownRootType(String),
}

/// A failed parse.
///
/// Carries the diagnostics gathered before the failure.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ReadErrorKind,
    pub context: ParseContext,
}

impl ParseError {
    pub fn new(kind: ReadErrorKind, context: ParseContext) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> &ReadErrorKind {
        &self.kind
    }

    pub fn context(&self) -> &ParseContext {
        &self.context
    }
}

/// Errors raised while serializing a document.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to write XML: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("serialized XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unknown type <{0}>")]
    UnknownType(String),

    /// A referenced element has no identifier to serialize.
    #[error("referenced element of type <{0}> has no ID")]
    MissingReferenceId(String),

    #[error("element {0} does not belong to the document")]
    UnknownElement(usize),
}

pub type Result<T> = std::result::Result<T, ParseError>;
