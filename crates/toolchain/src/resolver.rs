//! The resolver contract shared by the runtime, packagers and packager CLIs.
//!
//! A resolver turns a logical command into a concrete [`InvocationDescriptor`].
//! In system-path mode that is the bare command. Otherwise it is a path inside
//! a versioned install, or, for packagers shipped as runtime scripts, a call
//! to the runtime with the script prepended to the arguments.

use crate::invocation::InvocationDescriptor;
use crate::runtime::RuntimeInner;
use noderig_core::{Error, PlatformProbe, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Permission bits applied to downloaded executables (`rwxr-xr-x`).
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Resolves a logical command to a concrete process invocation.
pub trait Resolver: Send + Sync {
    /// Logical name, e.g. `node`, `yarn` or `npx`.
    fn name(&self) -> &str;

    /// The configured command string.
    fn command(&self) -> String;

    /// Whether the command is expected on the host search path.
    fn on_system_path(&self) -> bool;

    /// Directory the executable is resolved in when not on the search path.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform probe is missing or fails.
    fn executable_bin_dir(&self) -> Result<PathBuf>;

    /// The executable to launch: the bare command in system-path mode,
    /// otherwise an absolute path inside [`Self::executable_bin_dir`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the platform probe is missing or fails.
    fn compute_executable(&self) -> Result<String>;

    /// Resolve an invocation of this command with `args`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the command must run through the
    /// runtime but has no install script.
    fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor>;
}

/// Settings injected into a resolver when configuration is finalized.
#[derive(Debug)]
pub(crate) struct ResolverState {
    system_path: AtomicBool,
    probe: OnceLock<Arc<dyn PlatformProbe>>,
}

impl ResolverState {
    pub(crate) fn new() -> Self {
        Self {
            system_path: AtomicBool::new(true),
            probe: OnceLock::new(),
        }
    }

    pub(crate) fn system_path(&self) -> bool {
        self.system_path.load(Ordering::Acquire)
    }

    pub(crate) fn set_system_path(&self, on_system_path: bool) {
        self.system_path.store(on_system_path, Ordering::Release);
    }

    pub(crate) fn probe(&self) -> Option<&Arc<dyn PlatformProbe>> {
        self.probe.get()
    }

    pub(crate) fn set_probe(&self, probe: &Arc<dyn PlatformProbe>) {
        if self.probe.set(Arc::clone(probe)).is_err() {
            tracing::debug!("Platform probe already injected, keeping the first one");
        }
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn require_probe(
    name: &str,
    probe: Option<&Arc<dyn PlatformProbe>>,
) -> Result<Arc<dyn PlatformProbe>> {
    probe.cloned().ok_or_else(|| {
        Error::configuration(format!(
            "'{name}' has no platform probe; finalize the configuration before resolving executables"
        ))
    })
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "resolve absolute path"))
}

/// Join the platform-specific file for `command` onto `bin_dir`.
///
/// The platform naming rule only applies when `command` is the canonical
/// command for `name`; anything else is used verbatim.
pub(crate) fn executable_in(
    bin_dir: &Path,
    name: &str,
    command: &str,
    platform_file: impl FnOnce(&str) -> Result<String>,
) -> Result<String> {
    let file = if name == command {
        platform_file(command)?
    } else {
        command.to_string()
    };
    Ok(absolute(&bin_dir.join(file))?.to_string_lossy().into_owned())
}

/// Run `owner`'s install script through the runtime.
pub(crate) fn through_runtime(
    runtime: &RuntimeInner,
    owner: &str,
    script: Option<PathBuf>,
    args: Vec<String>,
) -> Result<InvocationDescriptor> {
    let script = script.ok_or_else(|| {
        Error::configuration(format!(
            "'{owner}' has no install script and cannot be launched through the node runtime"
        ))
    })?;
    let mut arguments = Vec::with_capacity(args.len() + 1);
    arguments.push(absolute(&script)?.to_string_lossy().into_owned());
    arguments.extend(args);
    tracing::debug!(owner, script = %script.display(), "Launching install script through runtime");
    runtime.resolve_invocation(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_platform_file_only_for_canonical_command() {
        let bin = Path::new("/opt/node/bin");
        let canonical = executable_in(bin, "npm", "npm", |c| Ok(format!("{c}.cmd"))).unwrap();
        assert_eq!(canonical, "/opt/node/bin/npm.cmd");

        let custom = executable_in(bin, "npm", "my-npm", |_| {
            Err(Error::configuration("platform rule must not run"))
        })
        .unwrap();
        assert_eq!(custom, "/opt/node/bin/my-npm");
    }

    #[test]
    fn test_state_defaults_to_system_path() {
        let state = ResolverState::new();
        assert!(state.system_path());
        state.set_system_path(false);
        assert!(!state.system_path());
        assert!(state.probe().is_none());
    }

    #[test]
    fn test_missing_probe_is_configuration_error() {
        let err = require_probe("yarn", None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("'yarn'"));
    }
}
