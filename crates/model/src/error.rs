//! Error types for model construction and loading.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Errors raised while loading package definitions or building a [`crate::Model`].
#[derive(Error, Debug)]
pub enum ModelError {
    /// A package file could not be read.
    #[error("failed to read package {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A package definition is not valid JSON for the package format.
    #[error("invalid package definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate package prefix <{0}>")]
    DuplicatePrefix(String),

    #[error("duplicate package uri <{0}>")]
    DuplicateUri(String),

    #[error("duplicate type <{0}>")]
    DuplicateType(String),

    /// A supertype, extension target or property type does not exist.
    #[error("unknown type <{name}> referenced by <{referenced_by}>")]
    UnknownType { name: String, referenced_by: String },

    /// A type reference uses a prefix no package declares.
    #[error("unknown package prefix <{prefix}> referenced by <{referenced_by}>")]
    UnknownPrefix {
        prefix: String,
        referenced_by: String,
    },

    #[error("cyclic inheritance involving <{0}>")]
    CyclicInheritance(String),

    /// `redefines` names a property the type does not inherit.
    #[error("property <{property}> redefines unknown property <{target}>")]
    InvalidRedefine { property: String, target: String },
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
