//! The Node.js runtime resolver.

use crate::identity::{DEFAULT_NPM_VERSION, NODE_COMMAND, PackagerKind, RuntimeIdentity};
use crate::invocation::InvocationDescriptor;
use crate::links;
use crate::packager::PackagerResolver;
use crate::resolver::{self, Resolver, ResolverState, executable_in, require_probe};
use noderig_core::{Arch, Error, Lazy, Os, PlatformProbe, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Identity and injected settings, shared with the memo producers.
#[derive(Debug)]
pub(crate) struct RuntimeCore {
    identity: RwLock<RuntimeIdentity>,
    state: ResolverState,
}

impl RuntimeCore {
    fn probe(&self) -> Result<Arc<dyn PlatformProbe>> {
        require_probe(NODE_COMMAND, self.state.probe())
    }

    fn compute_working_dir(&self) -> Result<PathBuf> {
        let probe = self.probe()?;
        let os = probe.os_name()?;
        let arch = probe.os_arch()?;
        let identity = resolver::read(&self.identity);
        let dir = identity
            .working_dir
            .join(format!("{NODE_COMMAND}-v{}-{os}-{arch}", identity.version));
        tracing::debug!(working_dir = %dir.display(), "Computed runtime working directory");
        Ok(dir)
    }
}

/// Runtime state reachable from the packagers bound to it.
#[derive(Debug)]
pub(crate) struct RuntimeInner {
    core: Arc<RuntimeCore>,
    working_dir: Arc<Lazy<PathBuf>>,
    executable: Lazy<PathBuf>,
}

impl RuntimeInner {
    fn new(identity: RuntimeIdentity) -> Self {
        let core = Arc::new(RuntimeCore {
            identity: RwLock::new(identity),
            state: ResolverState::new(),
        });

        let for_dir = Arc::clone(&core);
        let working_dir = Arc::new(Lazy::racy(move || for_dir.compute_working_dir()));

        let for_exe = Arc::clone(&core);
        let exe_dir = Arc::clone(&working_dir);
        let executable = Lazy::racy(move || {
            let probe = for_exe.probe()?;
            let bin_dir = probe.bin_directory(exe_dir.get()?)?;
            let command = resolver::read(&for_exe.identity).command.clone();
            let path = executable_in(&bin_dir, NODE_COMMAND, &command, |c| probe.executable_file(c))?;
            Ok(PathBuf::from(path))
        });

        Self {
            core,
            working_dir,
            executable,
        }
    }

    pub(crate) fn probe(&self) -> Result<Arc<dyn PlatformProbe>> {
        self.core.probe()
    }

    pub(crate) fn on_system_path(&self) -> bool {
        self.core.state.system_path()
    }

    pub(crate) fn command(&self) -> String {
        resolver::read(&self.core.identity).command.clone()
    }

    pub(crate) fn working_directory(&self) -> Result<&Path> {
        self.working_dir.get().map(PathBuf::as_path)
    }

    pub(crate) fn bin_directory(&self) -> Result<PathBuf> {
        self.probe()?.bin_directory(self.working_directory()?)
    }

    /// Directory of the npm bundled with the runtime.
    pub(crate) fn packager_working_directory(&self) -> Result<PathBuf> {
        let working_dir = self.working_directory()?;
        let modules = if self.probe()?.is_windows()? {
            working_dir.join("node_modules")
        } else {
            working_dir.join("lib").join("node_modules")
        };
        Ok(modules.join("npm"))
    }

    fn executable_path(&self) -> Result<&Path> {
        self.executable.get().map(PathBuf::as_path)
    }

    pub(crate) fn compute_executable(&self) -> Result<String> {
        if self.on_system_path() {
            return Ok(self.command());
        }
        Ok(self.executable_path()?.to_string_lossy().into_owned())
    }

    pub(crate) fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor> {
        Ok(InvocationDescriptor::new(self.compute_executable()?, args))
    }
}

/// Where a Node.js release is fetched from and unpacked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    /// Release version
    pub version: String,
    /// Host OS code
    pub os: Os,
    /// Host architecture code
    pub arch: Arch,
    /// Archive file name, e.g. `node-v12.16.3-linux-x64.tar.gz`
    pub archive: String,
    /// Full download URL of the archive
    pub url: String,
    /// Directory the archive unpacks into
    pub install_dir: PathBuf,
}

/// The runtime interpreter together with its bundled npm.
#[derive(Debug)]
pub struct RuntimeManager {
    inner: Arc<RuntimeInner>,
    packager: PackagerResolver,
}

impl RuntimeManager {
    /// Create a runtime and its default npm packager.
    #[must_use]
    pub fn new(identity: RuntimeIdentity) -> Self {
        let mut npm = PackagerKind::Npm.template(identity.working_dir.clone());
        npm.version = Some(DEFAULT_NPM_VERSION.to_string());

        let inner = Arc::new(RuntimeInner::new(identity));
        let packager = PackagerResolver::bound(PackagerKind::Npm, npm, Arc::clone(&inner));
        Self { inner, packager }
    }

    /// Edit the runtime identity.
    ///
    /// Paths already computed are not recomputed.
    pub fn configure(&self, edit: impl FnOnce(&mut RuntimeIdentity)) {
        edit(&mut resolver::write(&self.inner.core.identity));
    }

    /// Snapshot of the runtime identity.
    #[must_use]
    pub fn identity(&self) -> RuntimeIdentity {
        resolver::read(&self.inner.core.identity).clone()
    }

    /// Declared runtime version.
    #[must_use]
    pub fn version(&self) -> String {
        resolver::read(&self.inner.core.identity).version.clone()
    }

    /// Base URL of the distribution server.
    #[must_use]
    pub fn url(&self) -> String {
        resolver::read(&self.inner.core.identity).url.clone()
    }

    /// `<base>/node-v<version>-<os>-<arch>`, computed once.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown.
    pub fn working_directory(&self) -> Result<&Path> {
        self.inner.working_directory()
    }

    /// Binary directory of the versioned install.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown.
    pub fn bin_directory(&self) -> Result<PathBuf> {
        self.inner.bin_directory()
    }

    /// Install directory of the bundled npm.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown.
    pub fn packager_working_directory(&self) -> Result<PathBuf> {
        self.inner.packager_working_directory()
    }

    /// The npm packager bound to this runtime.
    #[must_use]
    pub fn default_packager(&self) -> &PackagerResolver {
        &self.packager
    }

    /// Download coordinates of the configured release.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown.
    pub fn distribution(&self) -> Result<Distribution> {
        let probe = self.inner.probe()?;
        let os = probe.os_name()?;
        let arch = probe.os_arch()?;
        let extension = if os == Os::Windows { "zip" } else { "tar.gz" };
        let (version, base_url) = {
            let identity = resolver::read(&self.inner.core.identity);
            (identity.version.clone(), identity.url.clone())
        };
        let archive = format!("{NODE_COMMAND}-v{version}-{os}-{arch}.{extension}");
        let url = format!("{}/v{version}/{archive}", base_url.trim_end_matches('/'));

        Ok(Distribution {
            version,
            os,
            arch,
            archive,
            url,
            install_dir: self.working_directory()?.to_path_buf(),
        })
    }

    /// Inject the system-path flag and platform probe into the runtime and
    /// its default packager.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the default packager's CLI is invalid.
    pub fn after_evaluate(&self, on_system_path: bool, probe: &Arc<dyn PlatformProbe>) -> Result<()> {
        self.inner.core.state.set_system_path(on_system_path);
        self.inner.core.state.set_probe(probe);
        self.packager.after_evaluate(on_system_path, probe)
    }

    /// Apply `mode` to the downloaded runtime executable, then to the
    /// default packager and its CLI.
    ///
    /// Nothing happens when the runtime executable does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on Windows, and an I/O error if
    /// permissions or links cannot be written.
    pub fn set_executable_posix_rights(&self, mode: u32) -> Result<()> {
        if self.inner.probe()?.is_windows()? {
            return Err(Error::configuration(
                "POSIX permissions cannot be applied on Windows",
            ));
        }

        let executable = self.inner.executable_path()?;
        if !executable.exists() {
            tracing::debug!(executable = %executable.display(), "Runtime not downloaded, skipping permissions");
            return Ok(());
        }

        links::set_mode(executable, mode)?;
        tracing::info!(executable = %executable.display(), mode = %format!("{mode:o}"), "Applied runtime permissions");
        self.packager.mark_executable(mode)
    }
}

impl Resolver for RuntimeManager {
    fn name(&self) -> &str {
        NODE_COMMAND
    }

    fn command(&self) -> String {
        self.inner.command()
    }

    fn on_system_path(&self) -> bool {
        self.inner.on_system_path()
    }

    fn executable_bin_dir(&self) -> Result<PathBuf> {
        self.inner.bin_directory()
    }

    fn compute_executable(&self) -> Result<String> {
        self.inner.compute_executable()
    }

    fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor> {
        self.inner.resolve_invocation(args)
    }
}
