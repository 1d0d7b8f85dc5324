use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CONFIG: i32 = 2;
/// Any other failure
pub const EXIT_FAILURE: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(noderig::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A toolchain process failed; its exit code is propagated
    #[error("{message}")]
    #[diagnostic(code(noderig::cli::process))]
    Process {
        /// The error message
        message: String,
        /// Exit code of the child, if it exited normally
        exit_code: Option<i32>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(noderig::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error with help text
    #[must_use]
    pub fn other_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Convert `noderig_core::Error` to the matching `CliError` variant.
impl From<noderig_core::Error> for CliError {
    fn from(err: noderig_core::Error) -> Self {
        match err {
            // Extract just the message to avoid "Configuration error: Configuration error:"
            noderig_core::Error::Configuration { message } => Self::config(message),
            noderig_core::Error::Io {
                source,
                path,
                operation,
            } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" on {}", p.display()));
                Self::other_with_help(
                    format!("I/O {operation} failed{path_str}: {source}"),
                    "Check file permissions and ensure the path exists",
                )
            }
            noderig_core::Error::Process { message, exit_code } => {
                Self::Process { message, exit_code }
            }
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CONFIG,
        CliError::Process {
            exit_code: Some(code),
            ..
        } if *code != 0 => *code,
        CliError::Process { .. } | CliError::Other { .. } => EXIT_FAILURE,
    }
}

/// Render an error on stderr with miette
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    #[allow(clippy::print_stderr)]
    {
        eprintln!("{report:?}");
    }
    let _ = io::stderr().flush();
}

/// Run node and its package managers from a pinned or system-wide toolchain.
#[derive(Parser, Debug)]
#[command(name = "noderig")]
#[command(about = "Run node and its package managers from a pinned or system-wide toolchain")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Project root; defaults to the current directory.
    #[arg(long, global = true, env = "NODERIG_PROJECT_DIR", value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Configuration file, relative to the current directory; defaults to
    /// `<project-dir>/noderig.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use the versioned runtime under the project instead of the search path.
    #[arg(long, global = true, conflicts_with = "no_download")]
    pub download: bool,

    /// Use commands from the search path, whatever the configuration says.
    #[arg(long, global = true)]
    pub no_download: bool,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, default_value = "compact", value_enum)]
    pub log_format: TracingFormat,

    /// Print the resolved invocation as JSON instead of running it.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl Cli {
    /// Download mode requested on the command line, if any.
    #[must_use]
    pub const fn download_override(&self) -> Option<bool> {
        if self.download {
            Some(true)
        } else if self.no_download {
            Some(false)
        } else {
            None
        }
    }
}

/// Options shared by every command that launches a process.
#[derive(Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// Working directory of the process; defaults to the project root.
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Succeed even if the process exits with a non-zero code.
    #[arg(long)]
    pub ignore_exit_code: bool,

    /// Extra environment variable for the process (repeatable).
    #[arg(
        short = 'e',
        long = "env",
        value_name = "KEY=VALUE",
        action = clap::ArgAction::Append
    )]
    pub env: Vec<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node runtime.
    Node {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// Runtime option placed before the script (repeatable).
        #[arg(long = "opt", value_name = "OPTION", allow_hyphen_values = true)]
        node_options: Vec<String>,
        /// Script to run.
        script: Option<String>,
        /// Script arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run a command with the active package manager.
    Run {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// Package manager command, e.g. `install` or `run`.
        command: String,
        /// Command arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run a command with the npm bundled with the runtime.
    Npm {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// npm command.
        command: String,
        /// Command arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run the package manager's secondary command, such as npx.
    X {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// Arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Install project dependencies with the active package manager.
    Install {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// Extra install arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Install the configured package manager with the bundled npm.
    Setup {
        /// Common process options.
        #[command(flatten)]
        exec: ExecArgs,
        /// Extra npm install arguments.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Show the resolved toolchain.
    Info {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Apply POSIX permissions to the downloaded runtime and link its scripts.
    Permissions,
}

/// Parse command line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
