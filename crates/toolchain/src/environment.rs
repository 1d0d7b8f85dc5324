//! Environment overlays for toolchain invocations.

use noderig_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Search-path key used on Windows when the inherited environment has it.
pub const WINDOWS_PATH_KEY: &str = "Path";

/// Search-path key everywhere else.
pub const PATH_KEY: &str = "PATH";

/// Environment variables applied on top of the inherited process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Map of environment variable names to values
    #[serde(flatten)]
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Create a new empty environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=VALUE` assignments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for entries without `=` or with an empty key.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut env = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            match assignment.split_once('=') {
                Some((key, value)) if !key.is_empty() => env.set(key, value),
                _ => {
                    return Err(Error::configuration(format!(
                        "Invalid environment assignment '{assignment}', expected KEY=VALUE"
                    )));
                }
            }
        }
        Ok(env)
    }

    /// Get an environment variable value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set an environment variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// The overlay as OS strings, ready to merge with a process environment.
    pub(crate) fn to_os_vars(&self) -> HashMap<OsString, OsString> {
        self.vars
            .iter()
            .map(|(key, value)| (OsString::from(key), OsString::from(value)))
            .collect()
    }
}

/// The current process environment, including entries that are not UTF-8.
#[must_use]
pub fn inherited() -> HashMap<OsString, OsString> {
    std::env::vars_os().collect()
}

/// Search-path variable name for `inherited`: `Path` if and only if that
/// spelling is present, otherwise `PATH`.
#[must_use]
pub fn search_path_key(inherited: &HashMap<OsString, OsString>) -> &'static str {
    if inherited.contains_key(OsStr::new(WINDOWS_PATH_KEY)) {
        WINDOWS_PATH_KEY
    } else {
        PATH_KEY
    }
}

/// Append `entries` to an existing search-path value, keeping its entries.
///
/// # Errors
///
/// Returns a configuration error if an entry contains the path separator.
pub fn append_search_path(existing: Option<&OsStr>, entries: &[PathBuf]) -> Result<OsString> {
    let current = existing
        .filter(|value| !value.is_empty())
        .map(|value| std::env::split_paths(value).collect::<Vec<_>>())
        .unwrap_or_default();

    std::env::join_paths(current.iter().chain(entries))
        .map_err(|e| Error::configuration(format!("Invalid search path entry: {e}")))
}
