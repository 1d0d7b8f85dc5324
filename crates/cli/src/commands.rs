//! Command handlers.
//!
//! Handlers return what should be printed on stdout; the binary does the
//! printing.

use crate::cli::{Cli, CliError, Commands, ExecArgs};
use noderig_toolchain::config::FILE_NAME;
use noderig_toolchain::{
    Config, DefaultPackagerTask, EXECUTABLE_MODE, Environment, ExecOptions, InstallTask, NodeTask,
    PackagerCliTask, PackagerSetupTask, PackagerTask, Task, Toolchain, ToolchainInfo,
};
use std::fmt::Write as _;

/// Execute the parsed command line.
///
/// # Errors
///
/// Returns a [`CliError`] for configuration problems, resolution failures and
/// failed child processes.
pub fn execute(cli: &Cli) -> Result<Option<String>, CliError> {
    let toolchain = load_toolchain(cli)?;

    let task: Box<dyn Task> = match &cli.command {
        Commands::Node {
            exec,
            node_options,
            script,
            args,
        } => Box::new(NodeTask {
            options: exec_options(exec)?,
            node_options: node_options.clone(),
            script: script.clone(),
            args: args.clone(),
        }),
        Commands::Run {
            exec,
            command,
            args,
        } => Box::new(PackagerTask {
            options: exec_options(exec)?,
            command: command.clone(),
            args: args.clone(),
        }),
        Commands::Npm {
            exec,
            command,
            args,
        } => Box::new(DefaultPackagerTask {
            options: exec_options(exec)?,
            command: command.clone(),
            args: args.clone(),
        }),
        Commands::X { exec, args } => Box::new(PackagerCliTask {
            options: exec_options(exec)?,
            args: args.clone(),
        }),
        Commands::Install { exec, args } => Box::new(InstallTask {
            options: exec_options(exec)?,
            args: args.clone(),
        }),
        Commands::Setup { exec, args } => Box::new(PackagerSetupTask {
            options: exec_options(exec)?,
            args: args.clone(),
        }),
        Commands::Info { json } => return info(&toolchain, *json).map(Some),
        Commands::Permissions => {
            toolchain
                .runtime()
                .set_executable_posix_rights(EXECUTABLE_MODE)?;
            return Ok(None);
        }
    };

    if cli.dry_run {
        let invocation = task.invocation(&toolchain)?;
        let json = serde_json::to_string_pretty(&invocation)
            .map_err(|e| CliError::other(format!("Failed to serialize invocation: {e}")))?;
        return Ok(Some(json));
    }

    let status = task.execute(&toolchain)?;
    tracing::debug!(task = task.name(), %status, "Task finished");
    Ok(None)
}

/// Resolve the project, load its configuration and finalize the toolchain.
///
/// Relative `--project-dir` and `--config` paths resolve against the current
/// directory.
///
/// # Errors
///
/// Returns a configuration error if the configuration file is missing when
/// given explicitly, or is invalid.
pub fn load_toolchain(cli: &Cli) -> Result<Toolchain, CliError> {
    let cwd = std::env::current_dir()
        .map_err(|e| CliError::other(format!("Failed to read current directory: {e}")))?;
    let project_root = cli
        .project_dir
        .as_ref()
        .map_or_else(|| cwd.clone(), |dir| cwd.join(dir));

    let config = match &cli.config {
        Some(path) => {
            let path = cwd.join(path);
            Config::load(&path)?.ok_or_else(|| {
                CliError::config_with_help(
                    format!("Configuration file not found: {}", path.display()),
                    format!("Create {FILE_NAME} or drop --config to use the defaults"),
                )
            })?
        }
        None => Config::discover(&project_root)?,
    };

    let mut toolchain = Toolchain::from_config(&project_root, &config)?;
    if let Some(download) = cli.download_override() {
        toolchain = toolchain.with_download(download);
    }
    toolchain.after_evaluate()?;
    Ok(toolchain)
}

fn exec_options(exec: &ExecArgs) -> Result<ExecOptions, CliError> {
    Ok(ExecOptions {
        working_dir: exec.working_dir.clone(),
        ignore_exit_code: exec.ignore_exit_code,
        environment: Environment::from_assignments(&exec.env)?,
    })
}

fn info(toolchain: &Toolchain, json: bool) -> Result<String, CliError> {
    let info = toolchain.info()?;
    if json {
        return serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::other(format!("Failed to serialize toolchain info: {e}")));
    }
    Ok(render_info(&info))
}

fn render_info(info: &ToolchainInfo) -> String {
    let mode = if info.download { "download" } else { "system path" };
    let mut out = String::new();
    let _ = writeln!(out, "project:  {}", info.project_root.display());
    let _ = writeln!(out, "platform: {}-{} ({mode})", info.os, info.arch);
    let _ = writeln!(
        out,
        "node:     {} -> {}",
        info.node.version, info.node.executable.executable
    );
    if let Some(dir) = &info.node.working_dir {
        let _ = writeln!(out, "          installed in {}", dir.display());
    }
    let binding = if info.packager.bound { "bundled" } else { "standalone" };
    let _ = writeln!(
        out,
        "packager: {} {} ({binding}) -> {}",
        info.packager.kind, info.packager.version, info.packager.executable.executable
    );
    if let Some(cli) = &info.packager.cli {
        let _ = writeln!(out, "cli:      {} -> {}", cli.name, cli.executable);
    }
    out.trim_end().to_string()
}
