//! Package loading.
//!
//! Packages are JSON documents (see [`crate::PackageDefinition`]). They can
//! come from strings (embedded or test fixtures) or from files on disk.

use std::path::Path;

use tracing::debug;

use crate::definition::PackageDefinition;
use crate::error::{ModelError, Result};
use crate::registry::Model;

/// Parses a single package definition.
pub fn parse_package(json: &str) -> Result<PackageDefinition> {
    Ok(serde_json::from_str(json)?)
}

/// Reads and parses a package file.
pub fn load_package_file(path: &Path) -> Result<PackageDefinition> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let package = parse_package(&content)?;
    debug!(path = %path.display(), prefix = %package.prefix, "Loaded package");
    Ok(package)
}

impl Model {
    /// Builds a model from JSON package sources.
    pub fn from_json_strs<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let definitions = sources
            .into_iter()
            .map(|s| parse_package(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Model::new(definitions)
    }

    /// Builds a model from package files.
    pub fn from_files<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let definitions = paths
            .into_iter()
            .map(|p| load_package_file(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Model::new(definitions)
    }
}
