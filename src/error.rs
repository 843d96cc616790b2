//! Error types for bundle fixup operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundle fixup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all bundle fixup operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invocation token that is not of the form `key=value`
    #[error("invalid argument token {token:?} (expected key=value)")]
    InvalidArgument {
        /// The offending token
        token: String,
    },

    /// Required `key=value` setting was not passed by the build system
    #[error("missing required argument: {key}")]
    MissingArgument {
        /// Argument key
        key: String,
    },

    /// Unrecognized `platform=` value
    #[error("unknown platform {name:?} (expected linux, macos or windows)")]
    UnknownPlatform {
        /// Value as given
        name: String,
    },

    /// Required environment variable missing from the install context
    #[error("required environment variable {var} is not set")]
    MissingEnv {
        /// Variable name
        var: &'static str,
    },

    /// External introspection/rewrite tool could not be spawned
    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        /// Tool name
        tool: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// External introspection/rewrite tool exited nonzero
    #[error("{tool} failed: {stderr}")]
    ToolFailed {
        /// Tool name
        tool: String,
        /// Captured stderr, empty when the tool inherited our streams
        stderr: String,
    },

    /// A bundle path was scheduled for fixing a second time
    #[error("{} was fixed twice", path.display())]
    AlreadyFixed {
        /// Bundle-relative destination path
        path: PathBuf,
    },

    /// In-place byte patch with needle/replacement of different lengths
    #[error("in-place patch would change file size: {from:?} -> {to:?}")]
    PatchLength {
        /// Needle
        from: String,
        /// Replacement
        to: String,
    },

    /// A staged binary required by the catalogue could not be located
    #[error("cannot locate {name} in the toolchain search path")]
    BinaryNotFound {
        /// File name as catalogued
        name: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
