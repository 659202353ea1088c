//! Shared setup for the reader and writer suites.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use xbind_model::Model;
use xbind_xml::{ParseError, ParseResult, Reader, ReaderOptions, Writer};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/model")
        .join(format!("{name}.json"))
}

/// Loads the named fixture packages into one model.
pub fn model(packages: &[&str]) -> anyhow::Result<Arc<Model>> {
    let model = Model::from_files(packages.iter().map(|p| fixture(p)))?;
    Ok(Arc::new(model))
}

pub fn reader(packages: &[&str]) -> anyhow::Result<Reader> {
    Ok(Reader::new(model(packages)?))
}

pub fn lax_reader(packages: &[&str]) -> anyhow::Result<Reader> {
    Ok(Reader::with_options(
        model(packages)?,
        ReaderOptions { lax: true },
    ))
}

/// Parses `xml` with `root_type` as the expected root.
pub fn parse(reader: &Reader, xml: &str, root_type: &str) -> Result<ParseResult, ParseError> {
    reader.from_xml(xml, &reader.handler(root_type))
}

/// Parses and re-serializes a document.
pub fn roundtrip(packages: &[&str], root_type: &str, xml: &str) -> anyhow::Result<String> {
    let model = model(packages)?;
    let reader = Reader::new(model.clone());
    let result = parse(&reader, xml, root_type)?;
    Ok(Writer::new(model).to_xml(&result.document, result.root())?)
}

/// Messages of all recorded warnings.
pub fn warnings(result: &ParseResult) -> Vec<&str> {
    result
        .context
        .warnings()
        .iter()
        .map(|w| w.message.as_str())
        .collect()
}

/// Unwraps the error of a parse that must fail.
pub fn expect_error(result: Result<ParseResult, ParseError>) -> anyhow::Result<ParseError> {
    match result {
        Ok(_) => anyhow::bail!("expected the parse to fail"),
        Err(err) => Ok(err),
    }
}
