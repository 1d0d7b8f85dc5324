//! Error types for noderig

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for noderig operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid or incomplete toolchain configuration.
    ///
    /// Raised for missing collaborators, missing install scripts, POSIX-only
    /// operations on Windows, duplicate packager registration and
    /// unrecognized host platforms.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(noderig::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(noderig::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<std::path::Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// A spawned toolchain process failed
    #[error("Process execution failed: {message}")]
    #[diagnostic(code(noderig::process))]
    Process {
        /// The error message describing the process failure
        message: String,
        /// Exit code reported by the child, if it exited normally
        exit_code: Option<i32>,
    },
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }

    /// Create a process execution error
    pub fn process(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Process {
            message: message.into(),
            exit_code,
        }
    }
}

/// Result type for noderig operations
pub type Result<T> = std::result::Result<T, Error>;
