//! The per-project toolchain: runtime, packagers and the platform they run on.

use crate::config::Config;
use crate::identity::RuntimeIdentity;
use crate::invocation::InvocationBuilder;
use crate::packager::PackagerResolver;
use crate::registry::PackagerRegistry;
use crate::resolver::{Resolver, absolute};
use crate::runtime::RuntimeManager;
use noderig_core::{Arch, HostPlatform, HostProperties, Os, PlatformProbe, Result, SystemExecutor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory under the project root holding all installs.
pub const BASE_DIR: &str = ".noderig";

/// Subdirectory of [`BASE_DIR`] holding runtime releases.
pub const RUNTIME_DIR: &str = "nodejs";

/// Runtime, packagers and platform probe of one project.
#[derive(Debug)]
pub struct Toolchain {
    project_root: PathBuf,
    download: bool,
    runtime: RuntimeManager,
    registry: PackagerRegistry,
    probe: Arc<dyn PlatformProbe>,
}

impl Toolchain {
    /// Toolchain with default settings, probing the running host.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let base_dir = project_root.join(BASE_DIR);
        Self {
            runtime: RuntimeManager::new(RuntimeIdentity::new(base_dir.join(RUNTIME_DIR))),
            registry: PackagerRegistry::new(base_dir),
            download: false,
            probe: host_probe(HostProperties::current()),
            project_root,
        }
    }

    /// Build a toolchain from a parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if more than one packager is declared or
    /// a packager kind is unknown.
    pub fn from_config(project_root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        let mut toolchain = Self::new(project_root);
        toolchain.download = config.node.download;

        let root = toolchain.project_root.clone();
        toolchain
            .runtime
            .configure(|identity| config.node.apply(identity, &root));

        if let Some((kind, packager)) = config.standalone_packager()? {
            toolchain
                .registry
                .register(kind, |identity| packager.apply(identity, &root))?;
        }

        if let Some(platform) = &config.platform {
            toolchain.probe = host_probe(platform.into());
        }

        tracing::debug!(
            project_root = %toolchain.project_root.display(),
            download = toolchain.download,
            packager = %toolchain.active_packager().name(),
            "Configured toolchain"
        );
        Ok(toolchain)
    }

    /// Replace the platform probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn PlatformProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Override the download flag.
    #[must_use]
    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Finalize configuration: inject the system-path flag and the probe
    /// into every resolver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a packager CLI definition is invalid.
    pub fn after_evaluate(&self) -> Result<()> {
        let on_system_path = !self.download;
        self.runtime.after_evaluate(on_system_path, &self.probe)?;
        if let Some(packager) = self.registry.packager() {
            packager.after_evaluate(on_system_path, &self.probe)?;
        }
        tracing::debug!(on_system_path, "Finalized toolchain configuration");
        Ok(())
    }

    /// Project root directory.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Whether versioned installs are used.
    #[must_use]
    pub fn download(&self) -> bool {
        self.download
    }

    /// The runtime.
    #[must_use]
    pub fn runtime(&self) -> &RuntimeManager {
        &self.runtime
    }

    /// The standalone packager registry.
    #[must_use]
    pub fn registry(&self) -> &PackagerRegistry {
        &self.registry
    }

    /// The platform probe.
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn PlatformProbe> {
        &self.probe
    }

    /// The standalone packager if one is registered, else the runtime's npm.
    #[must_use]
    pub fn active_packager(&self) -> &PackagerResolver {
        self.registry
            .packager()
            .unwrap_or_else(|| self.runtime.default_packager())
    }

    /// Builder for invocations in this project.
    ///
    /// In download mode the runtime bin directory is added to the search path.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown.
    pub fn invocation_builder(&self) -> Result<InvocationBuilder> {
        let builder = InvocationBuilder::new(&self.project_root);
        if self.download {
            return Ok(builder.runtime_bin_dir(absolute(&self.runtime.bin_directory()?)?));
        }
        Ok(builder)
    }

    /// Summary of the resolved toolchain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform is unknown or a packager
    /// CLI definition is invalid.
    pub fn info(&self) -> Result<ToolchainInfo> {
        let packager = self.active_packager();
        let cli = match packager.cli()? {
            Some(cli) => Some(ExecutableInfo::of(cli)?),
            None => None,
        };

        Ok(ToolchainInfo {
            project_root: self.project_root.clone(),
            download: self.download,
            os: self.probe.os_name()?,
            arch: self.probe.os_arch()?,
            node: RuntimeInfo {
                version: self.runtime.version(),
                executable: ExecutableInfo::of(&self.runtime)?,
                working_dir: self
                    .download
                    .then(|| self.runtime.working_directory().map(Path::to_path_buf))
                    .transpose()?,
            },
            packager: PackagerInfo {
                kind: packager.kind().to_string(),
                version: packager.version(),
                bound: packager.is_bound(),
                executable: ExecutableInfo::of(packager)?,
                cli,
            },
        })
    }
}

fn host_probe(properties: HostProperties) -> Arc<dyn PlatformProbe> {
    Arc::new(HostPlatform::new(
        properties,
        Arc::new(SystemExecutor::default()),
    ))
}

/// Resolved view of a toolchain, printed by `noderig info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainInfo {
    /// Project root
    pub project_root: PathBuf,
    /// Download mode
    pub download: bool,
    /// Host OS
    pub os: Os,
    /// Host architecture
    pub arch: Arch,
    /// Runtime
    pub node: RuntimeInfo,
    /// Active packager
    pub packager: PackagerInfo,
}

/// Runtime part of [`ToolchainInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    /// Declared version
    pub version: String,
    /// Resolved executable
    #[serde(flatten)]
    pub executable: ExecutableInfo,
    /// Versioned install directory, in download mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// Packager part of [`ToolchainInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagerInfo {
    /// Kind name
    pub kind: String,
    /// Declared version or `latest`
    pub version: String,
    /// Whether this is the runtime's bundled npm
    pub bound: bool,
    /// Resolved executable
    #[serde(flatten)]
    pub executable: ExecutableInfo,
    /// Secondary command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli: Option<ExecutableInfo>,
}

/// Name, command and resolved executable of a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableInfo {
    /// Logical name
    pub name: String,
    /// Configured command
    pub command: String,
    /// Executable that would be launched
    pub executable: String,
}

impl ExecutableInfo {
    fn of(resolver: &dyn Resolver) -> Result<Self> {
        Ok(Self {
            name: resolver.name().to_string(),
            command: resolver.command(),
            executable: resolver.compute_executable()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PackagerKind;
    use noderig_core::{Error, FixedPlatform};

    fn linux() -> Arc<dyn PlatformProbe> {
        Arc::new(FixedPlatform::new(Os::Linux, Arch::X64))
    }

    #[test]
    fn test_defaults_use_system_path_and_bundled_npm() {
        let toolchain = Toolchain::new("/p").with_probe(linux());
        toolchain.after_evaluate().unwrap();

        assert!(!toolchain.download());
        let packager = toolchain.active_packager();
        assert!(packager.is_bound());
        assert_eq!(packager.kind(), PackagerKind::Npm);
        assert_eq!(packager.compute_executable().unwrap(), "npm");
        assert!(toolchain.invocation_builder().unwrap().build(
            toolchain.runtime(),
            None,
            ["-v"]
        ).unwrap().search_path.is_empty());
    }

    #[test]
    fn test_from_config_registers_packager() {
        let config = Config::from_toml(
            "[node]\ndownload = true\nversion = \"14.0.0\"\n[packager.yarn]\nversion = \"1.22.4\"\n",
        )
        .unwrap();
        let toolchain = Toolchain::from_config("/p", &config)
            .unwrap()
            .with_probe(linux());
        toolchain.after_evaluate().unwrap();

        assert!(toolchain.download());
        assert_eq!(toolchain.runtime().version(), "14.0.0");
        let yarn = toolchain.active_packager();
        assert_eq!(yarn.kind(), PackagerKind::Yarn);
        assert!(!yarn.on_system_path());
        assert_eq!(
            yarn.working_directory().unwrap(),
            Path::new("/p/.noderig/yarn/yarn-v1.22.4")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_download_mode_adds_runtime_bin_to_search_path() {
        let toolchain = Toolchain::new("/p").with_probe(linux()).with_download(true);
        toolchain.after_evaluate().unwrap();

        let invocation = toolchain
            .invocation_builder()
            .unwrap()
            .build(toolchain.runtime(), None, ["app.js"])
            .unwrap();
        assert_eq!(
            invocation.search_path,
            [PathBuf::from("/p/.noderig/nodejs/node-v12.16.3-linux-x64/bin")]
        );
    }

    #[test]
    fn test_configured_platform_overrides_host() {
        let config = Config::from_toml("[platform]\nos_name = \"Windows 10\"\nos_arch = \"x86\"\n")
            .unwrap();
        let toolchain = Toolchain::from_config("/p", &config).unwrap();
        assert_eq!(toolchain.probe().os_name().unwrap(), Os::Windows);
        assert_eq!(toolchain.probe().os_arch().unwrap(), Arch::X86);
    }

    #[test]
    fn test_conflicting_packagers_fail() {
        let config = Config::from_toml("[packager.npm]\n[packager.pnpm]\n").unwrap();
        let err = Toolchain::from_config("/p", &config).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_info_in_system_path_mode() {
        let config = Config::from_toml("[packager.pnpm]\n").unwrap();
        let toolchain = Toolchain::from_config("/p", &config)
            .unwrap()
            .with_probe(linux());
        toolchain.after_evaluate().unwrap();

        let info = toolchain.info().unwrap();
        assert_eq!(info.node.executable.executable, "node");
        assert!(info.node.working_dir.is_none());
        assert_eq!(info.packager.kind, "pnpm");
        assert_eq!(info.packager.version, "latest");
        assert!(!info.packager.bound);
        assert_eq!(info.packager.cli.unwrap().executable, "pnpx");
    }
}
