//! Process invocation descriptors and the builder that assembles them.

use crate::environment::{self, Environment};
use crate::resolver::Resolver;
use noderig_core::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Everything needed to launch one toolchain process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationDescriptor {
    /// Executable path or bare command
    pub executable: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory of the child
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Whether a non-zero exit status is tolerated
    pub ignore_exit_code: bool,
    /// Variables overlaid on the inherited environment
    pub environment: Environment,
    /// Entries appended to the search path
    pub search_path: Vec<PathBuf>,
}

impl InvocationDescriptor {
    /// A bare descriptor for `executable` with `args`.
    pub fn new(executable: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
            working_dir: None,
            ignore_exit_code: false,
            environment: Environment::new(),
            search_path: Vec::new(),
        }
    }

    /// Add a search-path entry unless it is already present.
    #[must_use]
    pub fn with_search_path(mut self, entry: impl Into<PathBuf>) -> Self {
        let entry = entry.into();
        if !self.search_path.contains(&entry) {
            self.search_path.push(entry);
        }
        self
    }

    /// Variables to set on the child, given the environment it inherits.
    ///
    /// Search-path entries are appended to the inherited value, which may hold
    /// entries that are not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a search-path entry is invalid.
    pub fn environment_changes(
        &self,
        inherited: &HashMap<OsString, OsString>,
    ) -> Result<HashMap<OsString, OsString>> {
        let mut changes = self.environment.to_os_vars();
        if !self.search_path.is_empty() {
            let key = OsString::from(environment::search_path_key(inherited));
            let existing = changes
                .get(&key)
                .or_else(|| inherited.get(&key))
                .map(OsString::as_os_str);
            let value = environment::append_search_path(existing, &self.search_path)?;
            changes.insert(key, value);
        }
        Ok(changes)
    }

    /// The complete environment of the child.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a search-path entry is invalid.
    pub fn merged_environment(
        &self,
        inherited: &HashMap<OsString, OsString>,
    ) -> Result<HashMap<OsString, OsString>> {
        let mut merged = inherited.clone();
        merged.extend(self.environment_changes(inherited)?);
        Ok(merged)
    }

    /// Build a [`Command`] for this invocation on top of the current process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a search-path entry is invalid.
    pub fn to_command(&self) -> Result<Command> {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command.envs(self.environment_changes(&environment::inherited())?);
        Ok(command)
    }

    /// Run the process to completion with inherited stdio.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the process cannot be spawned, and a process
    /// error for a non-zero exit unless exit codes are ignored.
    pub fn run(&self) -> Result<ExitStatus> {
        tracing::info!(executable = %self.executable, args = ?self.args, "Running toolchain command");
        let status = self
            .to_command()?
            .status()
            .map_err(|e| Error::io(e, None, format!("spawn {}", self.executable)))?;

        if !status.success() && !self.ignore_exit_code {
            return Err(Error::process(
                format!("'{}' finished with {status}", self.executable),
                status.code(),
            ));
        }
        Ok(status)
    }
}

/// Assembles [`InvocationDescriptor`]s for a project.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    project_root: PathBuf,
    runtime_bin_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    ignore_exit_code: bool,
    environment: Environment,
}

impl InvocationBuilder {
    /// Builder for commands run in `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            runtime_bin_dir: None,
            working_dir: None,
            ignore_exit_code: false,
            environment: Environment::new(),
        }
    }

    /// Make the downloaded runtime's bin directory discoverable to children.
    ///
    /// Only set in download mode.
    #[must_use]
    pub fn runtime_bin_dir(mut self, bin_dir: impl Into<PathBuf>) -> Self {
        self.runtime_bin_dir = Some(bin_dir.into());
        self
    }

    /// Override the working directory. Relative paths resolve against the
    /// project root.
    #[must_use]
    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Tolerate non-zero exit codes.
    #[must_use]
    pub fn ignore_exit_code(mut self, ignore: bool) -> Self {
        self.ignore_exit_code = ignore;
        self
    }

    /// Variables overlaid on the inherited environment.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Project root used as default working directory.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve `command` followed by `extra_args` through `resolver`.
    ///
    /// Empty tokens are dropped.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures.
    pub fn build<I, S>(
        &self,
        resolver: &dyn Resolver,
        command: Option<&str>,
        extra_args: I,
    ) -> Result<InvocationDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = command
            .map(str::to_string)
            .into_iter()
            .chain(extra_args.into_iter().map(Into::into))
            .filter(|arg| !arg.is_empty())
            .collect();

        let mut descriptor = resolver.resolve_invocation(args)?;
        descriptor.working_dir = Some(
            self.working_dir
                .as_ref()
                .map_or_else(|| self.project_root.clone(), |dir| self.project_root.join(dir)),
        );
        descriptor.ignore_exit_code = self.ignore_exit_code;
        descriptor.environment = self.environment.clone();
        if let Some(bin_dir) = &self.runtime_bin_dir {
            descriptor = descriptor.with_search_path(bin_dir.clone());
        }

        tracing::debug!(
            resolver = resolver.name(),
            executable = %descriptor.executable,
            args = ?descriptor.args,
            "Built invocation"
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    struct Echo;

    impl Resolver for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn command(&self) -> String {
            "echo".to_string()
        }

        fn on_system_path(&self) -> bool {
            true
        }

        fn executable_bin_dir(&self) -> Result<PathBuf> {
            Ok(PathBuf::new())
        }

        fn compute_executable(&self) -> Result<String> {
            Ok(self.command())
        }

        fn resolve_invocation(&self, args: Vec<String>) -> Result<InvocationDescriptor> {
            Ok(InvocationDescriptor::new(self.compute_executable()?, args))
        }
    }

    #[test]
    fn test_build_filters_empty_tokens_and_defaults_working_dir() {
        let builder = InvocationBuilder::new("/project");
        let descriptor = builder
            .build(&Echo, Some("run"), ["", "build", ""])
            .unwrap();

        assert_eq!(descriptor.args, ["run", "build"]);
        assert_eq!(descriptor.working_dir, Some(PathBuf::from("/project")));
        assert!(descriptor.search_path.is_empty());
        assert!(!descriptor.ignore_exit_code);
    }

    #[test]
    fn test_build_without_command_token() {
        let descriptor = InvocationBuilder::new("/project")
            .build(&Echo, None, vec!["script.js".to_string()])
            .unwrap();
        assert_eq!(descriptor.args, ["script.js"]);
    }

    #[test]
    fn test_build_applies_overrides() {
        let mut env = Environment::new();
        env.set("CI", "true");
        let descriptor = InvocationBuilder::new("/project")
            .working_dir(Some(PathBuf::from("/project/web")))
            .ignore_exit_code(true)
            .environment(env)
            .runtime_bin_dir("/tools/node/bin")
            .build(&Echo, Some("test"), Vec::<String>::new())
            .unwrap();

        assert_eq!(descriptor.working_dir, Some(PathBuf::from("/project/web")));
        assert!(descriptor.ignore_exit_code);
        assert_eq!(descriptor.environment.get("CI"), Some("true"));
        assert_eq!(descriptor.search_path, [PathBuf::from("/tools/node/bin")]);
    }

    #[test]
    fn test_relative_working_dir_resolves_against_project_root() {
        let descriptor = InvocationBuilder::new("/project")
            .working_dir(Some(PathBuf::from("packages/web")))
            .build(&Echo, None, ["x"])
            .unwrap();
        assert_eq!(
            descriptor.working_dir,
            Some(Path::new("/project").join("packages/web"))
        );
    }

    #[test]
    fn test_search_path_not_duplicated() {
        let descriptor = InvocationDescriptor::new("npm", vec![])
            .with_search_path("/tools/node/bin")
            .with_search_path("/tools/node/bin");
        assert_eq!(descriptor.search_path.len(), 1);
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<OsString, OsString> {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_merged_environment_appends_to_path() {
        let inherited = vars(&[("PATH", "/usr/bin"), ("HOME", "/home/dev")]);
        let mut descriptor =
            InvocationDescriptor::new("npm", vec![]).with_search_path("/tools/node/bin");
        descriptor.environment.set("HOME", "/tmp/home");

        let merged = descriptor.merged_environment(&inherited).unwrap();
        assert_eq!(merged[OsStr::new("PATH")], "/usr/bin:/tools/node/bin");
        assert_eq!(merged[OsStr::new("HOME")], "/tmp/home");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_entries_are_kept() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let inherited = HashMap::from([(
            OsString::from("PATH"),
            OsString::from_vec(b"/usr/bin:/opt/caf\xe9/bin".to_vec()),
        )]);
        let descriptor =
            InvocationDescriptor::new("npm", vec![]).with_search_path("/tools/node/bin");

        let changes = descriptor.environment_changes(&inherited).unwrap();
        assert_eq!(
            changes[OsStr::new("PATH")].as_bytes(),
            b"/usr/bin:/opt/caf\xe9/bin:/tools/node/bin"
        );
    }

    #[test]
    fn test_merged_environment_uses_windows_key_when_present() {
        let inherited = vars(&[("Path", "")]);
        let descriptor = InvocationDescriptor::new("npm", vec![]).with_search_path("nodebin");

        let merged = descriptor.merged_environment(&inherited).unwrap();
        assert_eq!(merged[OsStr::new("Path")], "nodebin");
        assert!(!merged.contains_key(OsStr::new("PATH")));
    }

    #[test]
    fn test_no_search_path_leaves_environment_untouched() {
        let inherited = vars(&[("PATH", "/usr/bin")]);
        let descriptor = InvocationDescriptor::new("yarn", vec!["install".into()]);
        assert_eq!(descriptor.merged_environment(&inherited).unwrap(), inherited);
        assert!(descriptor.environment_changes(&inherited).unwrap().is_empty());
    }

    #[test]
    fn test_serializes_for_dry_run() {
        let descriptor = InvocationBuilder::new("/project")
            .build(&Echo, Some("hi"), Vec::<String>::new())
            .unwrap();
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["executable"], "echo");
        assert_eq!(json["args"], serde_json::json!(["hi"]));
        assert_eq!(json["ignoreExitCode"], false);
        assert!(json["searchPath"].as_array().unwrap().is_empty());
        assert!(json.get("workingDir").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_code() {
        let failing = InvocationDescriptor::new("sh", vec!["-c".into(), "exit 3".into()]);
        let err = failing.run().unwrap_err();
        assert!(matches!(err, Error::Process { exit_code: Some(3), .. }));

        let mut ignored = failing.clone();
        ignored.ignore_exit_code = true;
        assert_eq!(ignored.run().unwrap().code(), Some(3));
    }
}
