//! Toolchain tasks.
//!
//! Each task turns a request into an [`InvocationDescriptor`] through the
//! project's [`InvocationBuilder`]. Running it is a separate step so callers
//! can inspect the invocation first.

use crate::environment::Environment;
use crate::invocation::{InvocationBuilder, InvocationDescriptor};
use crate::packager::PackagerResolver;
use crate::resolver::{Resolver, absolute};
use crate::toolchain::Toolchain;
use noderig_core::{Error, Result};
use std::path::PathBuf;
use std::process::ExitStatus;

/// A unit of work that launches one toolchain process.
pub trait Task {
    /// Task name used in logs.
    fn name(&self) -> &'static str;

    /// Resolve the process this task launches.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the command cannot be resolved.
    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor>;

    /// Resolve and run the process.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures, spawn failures and non-zero exits
    /// that are not ignored.
    fn execute(&self, toolchain: &Toolchain) -> Result<ExitStatus> {
        let invocation = self.invocation(toolchain)?;
        tracing::info!(task = self.name(), "Executing task");
        invocation.run()
    }
}

/// Options shared by every task.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory; the project root when unset
    pub working_dir: Option<PathBuf>,
    /// Tolerate non-zero exit codes
    pub ignore_exit_code: bool,
    /// Variables overlaid on the inherited environment
    pub environment: Environment,
}

impl ExecOptions {
    fn builder(&self, toolchain: &Toolchain) -> Result<InvocationBuilder> {
        Ok(toolchain
            .invocation_builder()?
            .working_dir(self.working_dir.clone())
            .ignore_exit_code(self.ignore_exit_code)
            .environment(self.environment.clone()))
    }
}

/// Runs the runtime with options, an optional script and arguments.
#[derive(Debug, Clone, Default)]
pub struct NodeTask {
    /// Common options
    pub options: ExecOptions,
    /// Runtime options placed before the script
    pub node_options: Vec<String>,
    /// Script to run
    pub script: Option<String>,
    /// Script arguments
    pub args: Vec<String>,
}

impl Task for NodeTask {
    fn name(&self) -> &'static str {
        "node"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        let args = self
            .node_options
            .iter()
            .chain(&self.script)
            .chain(&self.args)
            .cloned();
        self.options
            .builder(toolchain)?
            .build(toolchain.runtime(), None, args)
    }
}

/// Runs a command through the active packager.
#[derive(Debug, Clone, Default)]
pub struct PackagerTask {
    /// Common options
    pub options: ExecOptions,
    /// Packager command, e.g. `run`
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl Task for PackagerTask {
    fn name(&self) -> &'static str {
        "packager"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        self.options.builder(toolchain)?.build(
            toolchain.active_packager(),
            Some(&self.command),
            self.args.clone(),
        )
    }
}

/// Runs a command through the runtime's bundled npm, whatever packager is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct DefaultPackagerTask {
    /// Common options
    pub options: ExecOptions,
    /// npm command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl Task for DefaultPackagerTask {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        self.options.builder(toolchain)?.build(
            toolchain.runtime().default_packager(),
            Some(&self.command),
            self.args.clone(),
        )
    }
}

/// Runs the active packager's secondary command.
#[derive(Debug, Clone, Default)]
pub struct PackagerCliTask {
    /// Common options
    pub options: ExecOptions,
    /// Arguments
    pub args: Vec<String>,
}

impl Task for PackagerCliTask {
    fn name(&self) -> &'static str {
        "packager-cli"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        let packager = toolchain.active_packager();
        let cli = packager.cli()?.ok_or_else(|| {
            Error::configuration(format!("Packager '{}' has no CLI", packager.name()))
        })?;
        self.options
            .builder(toolchain)?
            .build(cli, None, self.args.clone())
    }
}

/// Installs project dependencies with the active packager.
#[derive(Debug, Clone, Default)]
pub struct InstallTask {
    /// Common options
    pub options: ExecOptions,
    /// Extra `install` arguments
    pub args: Vec<String>,
}

impl InstallTask {
    /// Files the install reads.
    #[must_use]
    pub fn input_files(toolchain: &Toolchain) -> Vec<String> {
        toolchain.active_packager().identity().input_files
    }

    /// Files the install writes.
    #[must_use]
    pub fn output_files(toolchain: &Toolchain) -> Vec<String> {
        toolchain.active_packager().identity().output_files
    }

    /// Directories the install writes.
    #[must_use]
    pub fn output_directories(toolchain: &Toolchain) -> Vec<String> {
        toolchain.active_packager().identity().output_directories
    }
}

impl Task for InstallTask {
    fn name(&self) -> &'static str {
        "install"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        self.options.builder(toolchain)?.build(
            toolchain.active_packager(),
            Some("install"),
            self.args.clone(),
        )
    }
}

/// Installs the standalone packager with the runtime's bundled npm.
#[derive(Debug, Clone, Default)]
pub struct PackagerSetupTask {
    /// Common options
    pub options: ExecOptions,
    /// Extra `npm install` arguments
    pub args: Vec<String>,
}

impl PackagerSetupTask {
    fn packager(toolchain: &Toolchain) -> Result<&PackagerResolver> {
        toolchain.registry().packager().ok_or_else(|| {
            Error::configuration("Unable to set up packager: no standalone packager is configured")
        })
    }

    /// Directory the packager is installed into.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no standalone packager is configured.
    pub fn output_directory(toolchain: &Toolchain) -> Result<PathBuf> {
        absolute(Self::packager(toolchain)?.working_directory()?)
    }
}

impl Task for PackagerSetupTask {
    fn name(&self) -> &'static str {
        "packager-setup"
    }

    fn invocation(&self, toolchain: &Toolchain) -> Result<InvocationDescriptor> {
        let packager = Self::packager(toolchain)?;
        let prefix = Self::output_directory(toolchain)?;
        let package = format!("{}@{}", packager.npm_package(), packager.version());

        let mut args = vec![
            "--global".to_string(),
            "--no-save".to_string(),
            "--prefix".to_string(),
            prefix.to_string_lossy().into_owned(),
            package,
        ];
        args.extend(self.args.iter().cloned());

        let runtime = toolchain.runtime();
        let invocation = self
            .options
            .builder(toolchain)?
            .build(runtime.default_packager(), Some("install"), args)?
            .with_search_path(absolute(&runtime.bin_directory()?)?);

        tracing::debug!(packager = packager.name(), prefix = %prefix.display(), "Prepared packager setup");
        Ok(invocation)
    }
}
