//! Host platform classification.
//!
//! Node.js distributions name their archives `node-v<version>-<os>-<arch>`
//! and lay them out differently on Windows. [`PlatformProbe`] maps the host
//! onto those names and exposes the matching filename and directory rules.

use crate::lazy::Lazy;
use crate::process::ProcessExecutor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Operating system, spelled the way Node.js distributions spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
    /// Windows (`win`)
    #[serde(rename = "win")]
    Windows,
    /// macOS (`darwin`)
    #[serde(rename = "darwin")]
    Darwin,
    /// Linux and FreeBSD (`linux`)
    #[serde(rename = "linux")]
    Linux,
    /// Solaris (`sunos`)
    #[serde(rename = "sunos")]
    SunOs,
}

impl Os {
    /// Classify a host-reported OS name such as `Windows 10` or `Mac OS X`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unrecognized operating systems.
    pub fn classify(host_name: &str) -> Result<Self> {
        let name = host_name.to_lowercase();
        if name.contains("windows") {
            Ok(Self::Windows)
        } else if name.contains("mac") {
            Ok(Self::Darwin)
        } else if name.contains("linux") || name.contains("freebsd") {
            Ok(Self::Linux)
        } else if name.contains("sunos") {
            Ok(Self::SunOs)
        } else {
            Err(Error::configuration(format!("Unsupported OS {name}")))
        }
    }

    /// Distribution code for this OS.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "win",
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::SunOs => "sunos",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture, spelled the way Node.js distributions spell it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 32-bit x86
    X86,
    /// 64-bit x86
    X64,
    /// 64-bit ARM
    Arm64,
    /// Whatever `uname -m` reported on an ARM host, verbatim
    Other(String),
}

impl Arch {
    /// Classify a host-reported architecture such as `amd64` or `aarch64`.
    ///
    /// ARM hosts report ambiguous names, so for `arm` and `aarch*` the machine
    /// name is read from `uname -m` through `executor`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the `uname` probe fails.
    pub fn classify(host_arch: &str, executor: &dyn ProcessExecutor) -> Result<Self> {
        let name = host_arch.to_lowercase();
        if name == "arm" || name.starts_with("aarch") {
            let machine = executor.execute("uname", &["-m"]).map_err(|e| {
                Error::configuration(format!("Unable to get system arch: {e}"))
            })?;
            tracing::debug!(host_arch = %name, machine = %machine, "Probed ARM machine name");
            return Ok(Self::from_machine(&machine));
        }
        if name.contains("64") {
            Ok(Self::X64)
        } else {
            Ok(Self::X86)
        }
    }

    fn from_machine(machine: &str) -> Self {
        match machine {
            "armv8l" | "arm64" => Self::Arm64,
            other => Self::Other(other.to_string()),
        }
    }

    /// Distribution code for this architecture.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::Other(machine) => machine,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Arch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Maps the host onto distribution naming and filesystem conventions.
pub trait PlatformProbe: Send + Sync + fmt::Debug {
    /// The host OS.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host OS is not supported.
    fn os_name(&self) -> Result<Os>;

    /// The host architecture.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the architecture cannot be probed.
    fn os_arch(&self) -> Result<Arch>;

    /// Whether the host is Windows.
    ///
    /// # Errors
    ///
    /// Propagates OS classification failures.
    fn is_windows(&self) -> Result<bool> {
        Ok(self.os_name()? == Os::Windows)
    }

    /// Script launcher name: `name.cmd` on Windows, `name` elsewhere.
    ///
    /// # Errors
    ///
    /// Propagates OS classification failures.
    fn command_file(&self, name: &str) -> Result<String> {
        Ok(if self.is_windows()? {
            format!("{name}.cmd")
        } else {
            name.to_string()
        })
    }

    /// Binary name: `name.exe` on Windows, `name` elsewhere.
    ///
    /// # Errors
    ///
    /// Propagates OS classification failures.
    fn executable_file(&self, name: &str) -> Result<String> {
        Ok(if self.is_windows()? {
            format!("{name}.exe")
        } else {
            name.to_string()
        })
    }

    /// Directory holding binaries of an unpacked distribution.
    ///
    /// # Errors
    ///
    /// Propagates OS classification failures.
    fn bin_directory(&self, working_dir: &Path) -> Result<PathBuf> {
        Ok(if self.is_windows()? {
            working_dir.to_path_buf()
        } else {
            working_dir.join("bin")
        })
    }
}

/// Raw OS name and architecture strings as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProperties {
    /// OS name, e.g. `Linux` or `Windows 10`
    pub os_name: String,
    /// Architecture, e.g. `amd64` or `aarch64`
    pub os_arch: String,
}

impl HostProperties {
    /// Create properties from explicit strings.
    pub fn new(os_name: impl Into<String>, os_arch: impl Into<String>) -> Self {
        Self {
            os_name: os_name.into(),
            os_arch: os_arch.into(),
        }
    }

    /// Properties of the running host.
    #[must_use]
    pub fn current() -> Self {
        let os_name = match std::env::consts::OS {
            "windows" => "Windows",
            "macos" => "Mac OS X",
            "linux" => "Linux",
            "freebsd" => "FreeBSD",
            "solaris" | "illumos" => "SunOS",
            other => other,
        };
        let os_arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "x86",
            other => other,
        };
        Self::new(os_name, os_arch)
    }
}

/// Probe backed by host properties, classifying each value once.
pub struct HostPlatform {
    properties: HostProperties,
    os: Lazy<Os>,
    arch: Lazy<Arch>,
}

impl HostPlatform {
    /// Create a probe for the given properties.
    ///
    /// Classification is deferred to first use. The architecture cell is
    /// synchronized because classifying it may spawn `uname`.
    pub fn new(properties: HostProperties, executor: Arc<dyn ProcessExecutor>) -> Self {
        let os_name = properties.os_name.clone();
        let os_arch = properties.os_arch.clone();
        Self {
            properties,
            os: Lazy::racy(move || Os::classify(&os_name)),
            arch: Lazy::double_checked(move || Arch::classify(&os_arch, executor.as_ref())),
        }
    }

    /// The raw host properties.
    #[must_use]
    pub fn properties(&self) -> &HostProperties {
        &self.properties
    }
}

impl fmt::Debug for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostPlatform")
            .field("properties", &self.properties)
            .field("os", &self.os.get_if_initialized())
            .field("arch", &self.arch.get_if_initialized())
            .finish()
    }
}

impl PlatformProbe for HostPlatform {
    fn os_name(&self) -> Result<Os> {
        self.os.get().copied()
    }

    fn os_arch(&self) -> Result<Arch> {
        self.arch.get().cloned()
    }
}

/// Probe with pre-classified values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPlatform {
    os: Os,
    arch: Arch,
}

impl FixedPlatform {
    /// Create a probe that always reports `os` and `arch`.
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }
}

impl PlatformProbe for FixedPlatform {
    fn os_name(&self) -> Result<Os> {
        Ok(self.os)
    }

    fn os_arch(&self) -> Result<Arch> {
        Ok(self.arch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CannedExecutor {
        output: Mutex<Option<String>>,
        calls: AtomicUsize,
    }

    impl CannedExecutor {
        fn returning(output: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Mutex::new(Some(output.to_string())),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    impl ProcessExecutor for CannedExecutor {
        fn execute(&self, program: &str, args: &[&str]) -> Result<String> {
            assert_eq!(program, "uname");
            assert_eq!(args, ["-m"]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::process("uname produced no output", None))
        }
    }

    fn probe(os_name: &str, os_arch: &str, executor: Arc<CannedExecutor>) -> HostPlatform {
        HostPlatform::new(HostProperties::new(os_name, os_arch), executor)
    }

    #[test]
    fn test_os_classification() {
        let cases = [
            ("Windows 10", Os::Windows),
            ("Mac OS X", Os::Darwin),
            ("Linux", Os::Linux),
            ("FreeBSD", Os::Linux),
            ("SunOS", Os::SunOs),
        ];
        for (host, expected) in cases {
            assert_eq!(Os::classify(host).unwrap(), expected, "host {host}");
        }
        assert_eq!(Os::Windows.to_string(), "win");
        assert_eq!(Os::SunOs.to_string(), "sunos");
    }

    #[test]
    fn test_unknown_os_is_fatal() {
        let err = Os::classify("Plan9").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("plan9"));
    }

    #[test]
    fn test_arch_without_probe() {
        let executor = CannedExecutor::failing();
        assert_eq!(Arch::classify("amd64", executor.as_ref()).unwrap(), Arch::X64);
        assert_eq!(Arch::classify("x86_64", executor.as_ref()).unwrap(), Arch::X64);
        assert_eq!(Arch::classify("ppc64le", executor.as_ref()).unwrap(), Arch::X64);
        assert_eq!(Arch::classify("x86", executor.as_ref()).unwrap(), Arch::X86);
        assert_eq!(Arch::classify("i386", executor.as_ref()).unwrap(), Arch::X86);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arm_consults_uname() {
        let executor = CannedExecutor::returning("armv8l");
        assert_eq!(Arch::classify("arm", executor.as_ref()).unwrap(), Arch::Arm64);

        let executor = CannedExecutor::returning("armv7l");
        let arch = Arch::classify("aarch32", executor.as_ref()).unwrap();
        assert_eq!(arch, Arch::Other("armv7l".to_string()));
        assert_eq!(arch.to_string(), "armv7l");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uname_failure_is_configuration_error() {
        let executor = CannedExecutor::failing();
        let err = Arch::classify("aarch64", executor.as_ref()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("Unable to get system arch"));
    }

    #[test]
    fn test_host_platform_memoizes_arch_probe() {
        let executor = CannedExecutor::returning("armv8l");
        let platform = probe("Linux", "aarch64", Arc::clone(&executor));

        assert_eq!(platform.os_arch().unwrap(), Arch::Arm64);
        assert_eq!(platform.os_arch().unwrap(), Arch::Arm64);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_windows_file_conventions() {
        let platform = FixedPlatform::new(Os::Windows, Arch::X64);
        assert!(platform.is_windows().unwrap());
        assert_eq!(platform.command_file("npm").unwrap(), "npm.cmd");
        assert_eq!(platform.executable_file("node").unwrap(), "node.exe");
        assert_eq!(
            platform.bin_directory(Path::new("/tools/node")).unwrap(),
            PathBuf::from("/tools/node")
        );
    }

    #[test]
    fn test_posix_file_conventions() {
        let platform = probe("Linux", "amd64", CannedExecutor::failing());
        assert!(!platform.is_windows().unwrap());
        assert_eq!(platform.command_file("npm").unwrap(), "npm");
        assert_eq!(platform.executable_file("node").unwrap(), "node");
        assert_eq!(
            platform.bin_directory(Path::new("/tools/node")).unwrap(),
            PathBuf::from("/tools/node/bin")
        );
    }

    #[test]
    fn test_unsupported_host_fails_every_query() {
        let platform = probe("Haiku", "x86", CannedExecutor::failing());
        assert!(platform.is_windows().is_err());
        assert!(platform.command_file("npm").is_err());
    }

    #[test]
    fn test_current_properties_are_populated() {
        let properties = HostProperties::current();
        assert!(!properties.os_name.is_empty());
        assert!(!properties.os_arch.is_empty());
    }
}
