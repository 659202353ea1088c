//! Library side of the `xbind` binary.
//!
//! Loads model packages, reads a document and renders either a JSON view
//! of the parse result or the re-serialized XML.

pub mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing::info;
use xbind_model::Model;
use xbind_xml::{ParseResult, Reader, RootHandler, Writer};

pub use config::{CliConfig, Command};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "xbind_cli={level},xbind_xml={level},xbind_model={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loads all configured packages into one model.
pub fn load_model(config: &CliConfig) -> anyhow::Result<Arc<Model>> {
    let model = Model::from_files(&config.models).context("failed to load model")?;
    info!(packages = model.packages().len(), "Model loaded");
    Ok(Arc::new(model))
}

fn read_document(reader: &Reader, config: &CliConfig, input: &Path) -> anyhow::Result<ParseResult> {
    let bytes = std::fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let handler = match &config.root_type {
        Some(root_type) => reader.handler(root_type),
        None => RootHandler::generic(),
    };
    Ok(reader.from_slice(&bytes, &handler)?)
}

/// Parses the input and renders element graph, warnings and references.
pub fn parse(config: &CliConfig, model: Arc<Model>) -> anyhow::Result<serde_json::Value> {
    let reader = Reader::with_options(model, config.reader_options());
    let result = read_document(&reader, config, config.input())?;

    Ok(json!({
        "element": result.document.to_json(result.root()),
        "warnings": serde_json::to_value(result.context.warnings())?,
        "references": serde_json::to_value(result.context.references())?,
    }))
}

/// Parses the input and serializes it again.
pub fn roundtrip(config: &CliConfig, model: Arc<Model>) -> anyhow::Result<String> {
    let reader = Reader::with_options(model.clone(), config.reader_options());
    let result = read_document(&reader, config, config.input())?;

    for warning in result.context.warnings() {
        tracing::warn!(message = %warning.message, "Parse warning");
    }

    let writer = Writer::with_options(model, config.writer_options());
    Ok(writer.to_xml(&result.document, result.root())?)
}

/// Runs the configured command and returns what it prints.
pub fn run(config: &CliConfig) -> anyhow::Result<String> {
    let model = load_model(config)?;
    match config.command {
        Command::Parse { .. } => Ok(serde_json::to_string_pretty(&parse(config, model)?)?),
        Command::Roundtrip { .. } => roundtrip(config, model),
    }
}
