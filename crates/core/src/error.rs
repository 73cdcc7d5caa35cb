//! Setup-time error definitions.
//!
//! This module defines the error values produced while building a simulation
//! from its configuration. It provides:
//! 1. **Configuration errors:** Missing files, malformed trace lines, absent required parameters.
//! 2. **Reporting:** Location-carrying `Display` output so the CLI can print one line and abort.
//!
//! Runtime invariant violations (invalid request type at enqueue, scope-zero
//! command at a leaf) are bugs in the spec tables or the front-end and are
//! raised with `panic!`/`assert!`, not with these values. Back-pressure is a
//! plain `false` from `send` and never an error.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Fatal setup-time error.
///
/// Every variant terminates simulation construction; none of them are
/// recoverable by retry.
#[derive(Debug)]
pub enum ConfigError {
    /// A trace file named in the configuration does not exist.
    TraceNotFound(PathBuf),

    /// A trace file could not be opened or read.
    TraceIo(PathBuf, io::Error),

    /// A trace line does not match the trace grammar.
    ///
    /// Carries the file, the 1-based line number, and the offending text.
    TraceParse {
        /// Path of the trace file.
        path: PathBuf,
        /// 1-based line number of the malformed line.
        line: usize,
        /// The line as read, for the error report.
        text: String,
    },

    /// The configuration file could not be read.
    ConfigIo(PathBuf, io::Error),

    /// The configuration file is not valid JSON for the config schema.
    ConfigParse(String),

    /// A required parameter has no value and no default.
    MissingParameter {
        /// Component that owns the parameter.
        component: &'static str,
        /// Parameter name as advertised by the component.
        name: &'static str,
    },

    /// A scheme name (ECC/EDC) is not one of the supported values.
    UnknownScheme {
        /// Which selector was being resolved ("ecc" or "edc").
        kind: &'static str,
        /// The unrecognized name from the configuration.
        name: String,
    },

    /// A structural configuration value is out of range (e.g. zero levels).
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TraceNotFound(path) => {
                write!(f, "trace {} does not exist", path.display())
            }
            ConfigError::TraceIo(path, e) => {
                write!(f, "trace {} cannot be read: {}", path.display(), e)
            }
            ConfigError::TraceParse { path, line, text } => {
                write!(
                    f,
                    "trace {} line {}: invalid record {:?}",
                    path.display(),
                    line,
                    text
                )
            }
            ConfigError::ConfigIo(path, e) => {
                write!(f, "config {} cannot be read: {}", path.display(), e)
            }
            ConfigError::ConfigParse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::MissingParameter { component, name } => {
                write!(f, "{}: required parameter `{}` not set", component, name)
            }
            ConfigError::UnknownScheme { kind, name } => {
                write!(f, "unknown {} scheme {:?}", kind, name)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::TraceIo(_, e) | ConfigError::ConfigIo(_, e) => Some(e),
            _ => None,
        }
    }
}
