//! Secondary packager commands such as `npx` and `pnpx`.

use crate::identity::CliIdentity;
use crate::invocation::InvocationDescriptor;
use crate::packager::PackagerInner;
use crate::resolver::{Resolver, executable_in, through_runtime};
use noderig_core::{Error, PlatformProbe, Result};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Resolver for a packager's secondary command.
///
/// The command lives next to its packager: it shares the packager's bin
/// directory and system-path mode, and its script sits in the same bundled
/// npm directory.
#[derive(Debug)]
pub struct CliResolver {
    name: String,
    parent: Arc<PackagerInner>,
    probe: OnceLock<Arc<dyn PlatformProbe>>,
}

impl CliResolver {
    pub(crate) fn from_parent(parent: &Arc<PackagerInner>) -> Result<Option<Self>> {
        let Some(cli) = parent.identity().cli else {
            return Ok(None);
        };

        let name = parent
            .kind()
            .cli_name()
            .map_or_else(|| cli.command.trim().to_string(), str::to_string);
        if name.is_empty() {
            return Err(Error::configuration(format!(
                "Packager '{}' defines a CLI without a command name",
                parent.name()
            )));
        }

        tracing::debug!(packager = parent.name(), cli = %name, "Created packager CLI");
        Ok(Some(Self {
            name,
            parent: Arc::clone(parent),
            probe: OnceLock::new(),
        }))
    }

    pub(crate) fn set_probe(&self, probe: &Arc<dyn PlatformProbe>) {
        if self.probe.set(Arc::clone(probe)).is_err() {
            tracing::debug!(cli = %self.name, "Platform probe already injected, keeping the first one");
        }
    }

    fn probe(&self) -> Result<Arc<dyn PlatformProbe>> {
        match self.probe.get() {
            Some(probe) => Ok(Arc::clone(probe)),
            None => self.parent.probe(),
        }
    }

    fn definition(&self) -> CliIdentity {
        self.parent.identity().cli.unwrap_or_default()
    }

    /// Install script, resolved inside the runtime's bundled npm directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the runtime's platform is unknown.
    pub fn script_file(&self) -> Result<Option<PathBuf>> {
        self.parent
            .script_in_runtime(self.definition().local_script.as_deref())
    }

    /// Link the CLI script into the runtime's bin directory and apply `mode`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the parent packager is not bound to
    /// the runtime or the CLI has no install script.
    pub fn mark_executable(&self, mode: u32) -> Result<()> {
        self.parent
            .link_into_runtime(&self.name, &self.command(), self.script_file()?, mode)
    }
}

impl Resolver for CliResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> String {
        let command = self.definition().command;
        if command.is_empty() {
            self.name.clone()
        } else {
            command
        }
    }

    fn on_system_path(&self) -> bool {
        self.parent.on_system_path()
    }

    fn executable_bin_dir(&self) -> Result<PathBuf> {
        self.parent.executable_bin_dir()
    }

    fn compute_executable(&self) -> Result<String> {
        let command = self.command();
        if self.on_system_path() {
            return Ok(command);
        }
        let probe = self.probe()?;
        executable_in(&self.executable_bin_dir()?, &self.name, &command, |c| {
            probe.command_file(c)
        })
    }

    fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor> {
        match self.parent.runtime() {
            Some(runtime) if !self.on_system_path() => {
                through_runtime(runtime, &self.name, self.script_file()?, args)
            }
            _ => Ok(InvocationDescriptor::new(self.compute_executable()?, args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::identity::{CliIdentity, PackagerKind};
    use crate::packager::PackagerResolver;
    use crate::resolver::Resolver;
    use noderig_core::{Arch, FixedPlatform, Os, PlatformProbe};
    use std::sync::Arc;

    fn probe(os: Os) -> Arc<dyn PlatformProbe> {
        Arc::new(FixedPlatform::new(os, Arch::X64))
    }

    #[test]
    fn test_custom_cli_takes_configured_name() {
        let custom = PackagerResolver::standalone(PackagerKind::Custom, "/p/custom");
        custom.configure(|id| {
            id.command = "bower".into();
            id.cli = Some(CliIdentity {
                command: "bowerx".into(),
                local_script: None,
            });
        });
        custom.after_evaluate(true, &probe(Os::Linux)).unwrap();

        let cli = custom.cli().unwrap().unwrap();
        assert_eq!(cli.name(), "bowerx");
        let invocation = cli.resolve_invocation(vec!["serve".into()]).unwrap();
        assert_eq!(invocation.executable, "bowerx");
        assert_eq!(invocation.args, ["serve"]);
    }

    #[test]
    fn test_cli_follows_parent_system_path_mode() {
        let pnpm = PackagerResolver::standalone(PackagerKind::Pnpm, "/p/pnpm");
        pnpm.after_evaluate(false, &probe(Os::Windows)).unwrap();
        let cli = pnpm.cli().unwrap().unwrap();

        assert!(!cli.on_system_path());
        assert_eq!(cli.executable_bin_dir().unwrap(), pnpm.executable_bin_dir().unwrap());
        assert!(cli.compute_executable().unwrap().ends_with("pnpx.cmd"));
    }

    #[test]
    fn test_renamed_cli_command_is_used_verbatim() {
        let pnpm = PackagerResolver::standalone(PackagerKind::Pnpm, "/p/pnpm");
        pnpm.configure(|id| {
            if let Some(cli) = id.cli.as_mut() {
                cli.command = "pnpm-dlx".into();
            }
        });
        pnpm.after_evaluate(false, &probe(Os::Windows)).unwrap();

        let cli = pnpm.cli().unwrap().unwrap();
        assert_eq!(cli.name(), "pnpx");
        assert!(cli.compute_executable().unwrap().ends_with("pnpm-dlx"));
    }

    #[test]
    fn test_first_injected_probe_is_kept() {
        let pnpm = PackagerResolver::standalone(PackagerKind::Pnpm, "/p/pnpm");
        pnpm.after_evaluate(false, &probe(Os::Windows)).unwrap();
        let cli = pnpm.cli().unwrap().unwrap();

        cli.set_probe(&probe(Os::Linux));
        assert!(cli.compute_executable().unwrap().ends_with("pnpx.cmd"));
    }
}
