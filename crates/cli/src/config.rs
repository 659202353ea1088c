//! Command-line configuration.
//!
//! Every option can also be set through the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `XBIND_MODEL` | | Model package files (comma-separated) |
//! | `XBIND_ROOT_TYPE` | | Qualified root type, e.g. `props:Root` |
//! | `XBIND_LAX` | false | Skip unparsable content with a warning |
//! | `XBIND_PREAMBLE` | false | Emit an XML declaration when writing |
//! | `XBIND_LOG_LEVEL` | warn | Log level |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use xbind_xml::{ReaderOptions, WriterOptions};

/// Configuration of the `xbind` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "xbind")]
#[command(about = "Model-driven XML data binding")]
pub struct CliConfig {
    /// Model package files (JSON).
    #[arg(
        short,
        long = "model",
        env = "XBIND_MODEL",
        value_delimiter = ',',
        global = true
    )]
    pub models: Vec<PathBuf>,

    /// Qualified type name of the document root.
    #[arg(short, long, env = "XBIND_ROOT_TYPE", global = true)]
    pub root_type: Option<String>,

    /// Skip unparsable content with a warning instead of failing.
    #[arg(long, env = "XBIND_LAX", global = true)]
    pub lax: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "XBIND_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse a document and print the element graph, warnings and
    /// references as JSON.
    Parse {
        /// Input document.
        input: PathBuf,
    },
    /// Parse a document and serialize it again.
    Roundtrip {
        /// Input document.
        input: PathBuf,

        /// Emit an XML declaration before the root element.
        #[arg(long, env = "XBIND_PREAMBLE")]
        preamble: bool,
    },
}

impl CliConfig {
    /// Checks option combinations clap cannot express.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.models.is_empty() {
            errors.push("At least one model package is required".to_string());
        }

        if let Some(root_type) = &self.root_type
            && !root_type.contains(':')
        {
            errors.push(format!(
                "Root type <{root_type}> must be qualified with a package prefix"
            ));
        }

        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            errors.push(format!("Unknown log level <{}>", self.log_level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn input(&self) -> &PathBuf {
        match &self.command {
            Command::Parse { input } | Command::Roundtrip { input, .. } => input,
        }
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions { lax: self.lax }
    }

    pub fn writer_options(&self) -> WriterOptions {
        let preamble = matches!(self.command, Command::Roundtrip { preamble: true, .. });
        WriterOptions { preamble }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let config = CliConfig::parse_from([
            "xbind",
            "parse",
            "--model",
            "a.json,b.json",
            "--root-type",
            "props:Root",
            "--lax",
            "doc.xml",
        ]);

        assert_eq!(
            config.models,
            [PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
        assert_eq!(config.root_type.as_deref(), Some("props:Root"));
        assert!(config.reader_options().lax);
        assert!(!config.writer_options().preamble);
        assert_eq!(config.input(), &PathBuf::from("doc.xml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_preamble() {
        let config = CliConfig::parse_from([
            "xbind",
            "roundtrip",
            "-m",
            "a.json",
            "--preamble",
            "doc.xml",
        ]);

        assert!(config.writer_options().preamble);
        assert!(config.root_type.is_none());
    }

    #[test]
    fn test_validate() {
        let config = CliConfig::parse_from([
            "xbind",
            "parse",
            "--root-type",
            "Root",
            "--log-level",
            "loud",
            "doc.xml",
        ]);

        let errors = config.validate().err().unwrap_or_default();
        assert_eq!(errors.len(), 3);
        assert!(errors[1].contains("<Root>"));
    }
}
