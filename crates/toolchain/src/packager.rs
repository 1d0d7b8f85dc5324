//! Package manager resolvers.
//!
//! A packager is either bound to the runtime, as the npm shipped inside a
//! Node.js release is, or standalone with its own versioned install directory.

use crate::identity::{PackagerKind, ToolchainIdentity};
use crate::invocation::InvocationDescriptor;
use crate::links;
use crate::packager_cli::CliResolver;
use crate::resolver::{
    self, Resolver, ResolverState, absolute, executable_in, require_probe, through_runtime,
};
use crate::runtime::RuntimeInner;
use noderig_core::{Error, Lazy, PlatformProbe, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Version label used when no version is declared.
pub const LATEST: &str = "latest";

#[derive(Debug)]
enum Binding {
    Runtime(Arc<RuntimeInner>),
    Standalone,
}

#[derive(Debug)]
struct PackagerCore {
    kind: PackagerKind,
    name: String,
    identity: RwLock<ToolchainIdentity>,
    state: ResolverState,
    binding: Binding,
}

impl PackagerCore {
    fn compute_working_dir(&self) -> PathBuf {
        let identity = resolver::read(&self.identity);
        let suffix = identity
            .version
            .as_ref()
            .map_or_else(|| format!("-{LATEST}"), |v| format!("-v{v}"));
        identity.working_dir.join(format!("{}{suffix}", self.name))
    }
}

/// Packager state reachable from its CLI.
#[derive(Debug)]
pub(crate) struct PackagerInner {
    core: Arc<PackagerCore>,
    working_dir: Lazy<PathBuf>,
}

impl PackagerInner {
    pub(crate) fn name(&self) -> &str {
        &self.core.name
    }

    pub(crate) fn kind(&self) -> PackagerKind {
        self.core.kind
    }

    pub(crate) fn identity(&self) -> ToolchainIdentity {
        resolver::read(&self.core.identity).clone()
    }

    pub(crate) fn runtime(&self) -> Option<&Arc<RuntimeInner>> {
        match &self.core.binding {
            Binding::Runtime(runtime) => Some(runtime),
            Binding::Standalone => None,
        }
    }

    pub(crate) fn on_system_path(&self) -> bool {
        match &self.core.binding {
            Binding::Runtime(runtime) => runtime.on_system_path(),
            Binding::Standalone => self.core.state.system_path(),
        }
    }

    pub(crate) fn probe(&self) -> Result<Arc<dyn PlatformProbe>> {
        if let Some(probe) = self.core.state.probe() {
            return Ok(Arc::clone(probe));
        }
        match self.runtime() {
            Some(runtime) => runtime.probe(),
            None => require_probe(self.name(), None),
        }
    }

    pub(crate) fn working_directory(&self) -> Result<&Path> {
        self.working_dir.get().map(PathBuf::as_path)
    }

    /// Bound packagers live in the runtime's bin directory.
    pub(crate) fn executable_bin_dir(&self) -> Result<PathBuf> {
        match self.runtime() {
            Some(runtime) => runtime.bin_directory(),
            None => self.probe()?.bin_directory(self.working_directory()?),
        }
    }

    /// Resolve a script path relative to the runtime's bundled npm directory.
    pub(crate) fn script_in_runtime(&self, local_script: Option<&str>) -> Result<Option<PathBuf>> {
        let (Some(runtime), Some(script)) = (self.runtime(), local_script) else {
            return Ok(None);
        };
        Ok(Some(runtime.packager_working_directory()?.join(script)))
    }

    /// Link `command` in the runtime's bin directory to `script`.
    pub(crate) fn link_into_runtime(
        &self,
        owner: &str,
        command: &str,
        script: Option<PathBuf>,
        mode: u32,
    ) -> Result<()> {
        let Some(runtime) = self.runtime() else {
            return Err(Error::configuration(format!(
                "Linking '{owner}' requires a packager bound to the node runtime"
            )));
        };
        let Some(script) = script else {
            return Err(Error::configuration(format!(
                "Linking '{owner}' requires an install script"
            )));
        };
        let bin_dir = absolute(&runtime.bin_directory()?)?;
        links::link_script(&bin_dir, command, &absolute(&script)?, mode)?;
        Ok(())
    }
}

/// A package manager resolver.
#[derive(Debug)]
pub struct PackagerResolver {
    inner: Arc<PackagerInner>,
    cli: Lazy<Option<CliResolver>>,
}

impl PackagerResolver {
    pub(crate) fn bound(kind: PackagerKind, identity: ToolchainIdentity, runtime: Arc<RuntimeInner>) -> Self {
        Self::with_binding(kind, identity, Binding::Runtime(runtime))
    }

    /// Create a standalone packager from its template, installed under `base_dir`.
    pub fn standalone(kind: PackagerKind, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_binding(kind, kind.template(base_dir), Binding::Standalone)
    }

    fn with_binding(kind: PackagerKind, identity: ToolchainIdentity, binding: Binding) -> Self {
        let core = Arc::new(PackagerCore {
            kind,
            name: kind.name().to_string(),
            identity: RwLock::new(identity),
            state: ResolverState::new(),
            binding,
        });

        let for_dir = Arc::clone(&core);
        let inner = Arc::new(PackagerInner {
            core,
            working_dir: Lazy::racy(move || Ok(for_dir.compute_working_dir())),
        });

        let parent = Arc::clone(&inner);
        let cli = Lazy::double_checked(move || CliResolver::from_parent(&parent));

        Self { inner, cli }
    }

    /// Packager kind.
    #[must_use]
    pub fn kind(&self) -> PackagerKind {
        self.inner.kind()
    }

    /// Whether this packager is the runtime's bundled npm.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.runtime().is_some()
    }

    /// Edit the packager identity.
    ///
    /// Paths and the CLI already derived from the identity are kept.
    pub fn configure(&self, edit: impl FnOnce(&mut ToolchainIdentity)) {
        edit(&mut resolver::write(&self.inner.core.identity));
    }

    /// Snapshot of the packager identity.
    #[must_use]
    pub fn identity(&self) -> ToolchainIdentity {
        self.inner.identity()
    }

    /// Declared version, or `latest`.
    #[must_use]
    pub fn version(&self) -> String {
        resolver::read(&self.inner.core.identity)
            .version
            .clone()
            .unwrap_or_else(|| LATEST.to_string())
    }

    /// Package name used to install this packager.
    #[must_use]
    pub fn npm_package(&self) -> String {
        resolver::read(&self.inner.core.identity).npm_package.clone()
    }

    /// Keyword that adds a dependency, if the packager has one.
    #[must_use]
    pub fn add_command(&self) -> Option<String> {
        resolver::read(&self.inner.core.identity).add_command.clone()
    }

    /// `<base>/<name>-v<version>` or `<base>/<name>-latest`, computed once.
    ///
    /// # Errors
    ///
    /// This computation cannot fail today; the signature matches the other
    /// memoized locations.
    pub fn working_directory(&self) -> Result<&Path> {
        self.inner.working_directory()
    }

    /// Install script, resolved inside the runtime's bundled npm directory.
    ///
    /// Always `None` for standalone packagers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the runtime's platform is unknown.
    pub fn script_file(&self) -> Result<Option<PathBuf>> {
        let local_script = resolver::read(&self.inner.core.identity).local_script.clone();
        self.inner.script_in_runtime(local_script.as_deref())
    }

    /// The packager's secondary command, built on first access.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a CLI is defined without a name.
    pub fn cli(&self) -> Result<Option<&CliResolver>> {
        Ok(self.cli.get()?.as_ref())
    }

    /// Inject the system-path flag and platform probe.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the CLI definition is invalid.
    pub fn after_evaluate(&self, on_system_path: bool, probe: &Arc<dyn PlatformProbe>) -> Result<()> {
        self.inner.core.state.set_system_path(on_system_path);
        self.inner.core.state.set_probe(probe);
        if let Some(cli) = self.cli()? {
            cli.set_probe(probe);
        }
        Ok(())
    }

    /// Link the install script into the runtime's bin directory and apply
    /// `mode`, then do the same for the CLI.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for standalone packagers or packagers
    /// without an install script.
    pub fn mark_executable(&self, mode: u32) -> Result<()> {
        self.inner
            .link_into_runtime(self.name(), &self.command(), self.script_file()?, mode)?;
        if let Some(cli) = self.cli()? {
            cli.mark_executable(mode)?;
        }
        Ok(())
    }
}

impl Resolver for PackagerResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn command(&self) -> String {
        resolver::read(&self.inner.core.identity).command.clone()
    }

    fn on_system_path(&self) -> bool {
        self.inner.on_system_path()
    }

    fn executable_bin_dir(&self) -> Result<PathBuf> {
        self.inner.executable_bin_dir()
    }

    fn compute_executable(&self) -> Result<String> {
        let command = self.command();
        if self.on_system_path() {
            return Ok(command);
        }
        let probe = self.inner.probe()?;
        executable_in(&self.executable_bin_dir()?, self.name(), &command, |c| {
            probe.command_file(c)
        })
    }

    fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor> {
        match self.inner.runtime() {
            Some(runtime) if !self.on_system_path() => {
                through_runtime(runtime, self.name(), self.script_file()?, args)
            }
            _ => Ok(InvocationDescriptor::new(self.compute_executable()?, args)),
        }
    }
}
