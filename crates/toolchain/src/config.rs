//! Project configuration loaded from `noderig.toml`.
//!
//! ```toml
//! [node]
//! download = true
//! version = "12.16.3"
//!
//! [packager.yarn]
//! version = "1.22.4"
//! ```
//!
//! Every key is optional. Relative directories resolve against the project
//! root.

use crate::identity::{CliIdentity, PackagerKind, RuntimeIdentity, ToolchainIdentity};
use noderig_core::{Error, HostProperties, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the project root.
pub const FILE_NAME: &str = "noderig.toml";

/// Root of a `noderig.toml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Runtime settings
    #[serde(default)]
    pub node: NodeConfig,
    /// Standalone packager, keyed by kind name
    #[serde(default)]
    pub packager: BTreeMap<String, PackagerConfig>,
    /// Host platform override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformConfig>,
}

/// `[node]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Use versioned installs instead of commands on the search path
    #[serde(default)]
    pub download: bool,
    /// Runtime version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Runtime command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Distribution server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base directory of versioned runtimes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// `[packager.<kind>]` table. Unset keys keep the kind's template values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct PackagerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli: Option<CliIdentity>,
}

/// `[platform]` table, spelled the way a JVM reports host properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// OS name, e.g. `Linux` or `Windows 10`
    pub os_name: String,
    /// Architecture, e.g. `amd64` or `aarch64`
    pub os_arch: String,
}

impl From<&PlatformConfig> for HostProperties {
    fn from(config: &PlatformConfig) -> Self {
        Self::new(config.os_name.clone(), config.os_arch.clone())
    }
}

impl Config {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse configuration: {e}")))
    }

    /// Load a configuration file. Returns `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the file if it cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            Error::configuration(format!("Failed to parse {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(Some(config))
    }

    /// Load `noderig.toml` from `project_root`, or defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file exists but is invalid.
    pub fn discover(project_root: &Path) -> Result<Self> {
        Ok(Self::load(&project_root.join(FILE_NAME))?.unwrap_or_default())
    }

    /// The single declared packager, if any.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when more than one packager is declared
    /// or the kind is unknown.
    pub fn standalone_packager(&self) -> Result<Option<(PackagerKind, &PackagerConfig)>> {
        let mut declared = self.packager.iter();
        let Some((name, config)) = declared.next() else {
            return Ok(None);
        };
        if let Some((other, _)) = declared.next() {
            return Err(Error::configuration(format!(
                "Multiple packagers defined ('{name}' and '{other}'). Please configure a single packager"
            )));
        }
        Ok(Some((name.parse()?, config)))
    }
}

impl NodeConfig {
    /// Apply the declared values on top of `identity`.
    pub fn apply(&self, identity: &mut RuntimeIdentity, project_root: &Path) {
        if let Some(version) = &self.version {
            identity.version.clone_from(version);
        }
        if let Some(command) = &self.command {
            identity.command.clone_from(command);
        }
        if let Some(url) = &self.url {
            identity.url.clone_from(url);
        }
        if let Some(dir) = &self.working_dir {
            identity.working_dir = project_root.join(dir);
        }
    }
}

impl PackagerConfig {
    /// Apply the declared values on top of a template identity.
    pub fn apply(&self, identity: &mut ToolchainIdentity, project_root: &Path) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        if self.version.is_some() {
            identity.version.clone_from(&self.version);
        }
        if self.add_command.is_some() {
            identity.add_command.clone_from(&self.add_command);
        }
        if self.local_script.is_some() {
            identity.local_script.clone_from(&self.local_script);
        }
        if self.cli.is_some() {
            identity.cli.clone_from(&self.cli);
        }
        set(&mut identity.command, self.command.as_ref());
        set(&mut identity.npm_package, self.npm_package.as_ref());
        set(&mut identity.input_files, self.input_files.as_ref());
        set(&mut identity.output_files, self.output_files.as_ref());
        set(&mut identity.output_directories, self.output_directories.as_ref());
        if let Some(dir) = &self.working_dir {
            identity.working_dir = project_root.join(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(!config.node.download);
        assert!(config.packager.is_empty());
        assert!(config.platform.is_none());
    }

    #[test]
    fn test_full_document() {
        let config = Config::from_toml(
            r#"
            [node]
            download = true
            version = "14.17.0"
            working_dir = "tools/node"

            [packager.yarn]
            version = "1.22.4"
            output_files = ["yarn.lock"]
            cli = { command = "yarnx", local_script = "bin/yarnx.js" }

            [platform]
            os_name = "Linux"
            os_arch = "amd64"
            "#,
        )
        .unwrap();

        assert!(config.node.download);
        assert_eq!(config.node.version.as_deref(), Some("14.17.0"));
        let (kind, yarn) = config.standalone_packager().unwrap().unwrap();
        assert_eq!(kind, PackagerKind::Yarn);
        let cli = yarn.cli.as_ref().unwrap();
        assert_eq!(cli.command, "yarnx");
        assert_eq!(cli.local_script.as_deref(), Some("bin/yarnx.js"));
        assert_eq!(config.platform.unwrap().os_arch, "amd64");
    }

    #[test]
    fn test_unknown_keys_and_kinds_are_rejected() {
        let err = Config::from_toml("[node]\nversions = \"1\"").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let config = Config::from_toml("[packager.bun]\nversion = \"1\"").unwrap();
        let err = config.standalone_packager().unwrap_err();
        assert!(err.to_string().contains("Unknown packager 'bun'"));
    }

    #[test]
    fn test_two_packagers_are_rejected() {
        let config = Config::from_toml("[packager.pnpm]\n[packager.yarn]\n").unwrap();
        let err = config.standalone_packager().unwrap_err();
        assert!(err.to_string().contains("Multiple packagers defined"));
    }

    #[test]
    fn test_apply_keeps_template_values() {
        let mut identity = PackagerKind::Pnpm.template("/p/.noderig/pnpm");
        let config = PackagerConfig {
            version: Some("5.1.0".into()),
            working_dir: Some("cache/pnpm".into()),
            ..PackagerConfig::default()
        };
        config.apply(&mut identity, Path::new("/p"));

        assert_eq!(identity.version.as_deref(), Some("5.1.0"));
        assert_eq!(identity.command, "pnpm");
        assert_eq!(identity.add_command.as_deref(), Some("add"));
        assert_eq!(identity.working_dir, Path::new("/p/cache/pnpm"));
        assert!(identity.cli.is_some());
    }

    #[test]
    fn test_node_apply() {
        let mut identity = RuntimeIdentity::new("/p/.noderig/nodejs");
        let config = NodeConfig {
            version: Some("16.0.0".into()),
            url: Some("https://mirror.example/dist".into()),
            ..NodeConfig::default()
        };
        config.apply(&mut identity, Path::new("/p"));
        assert_eq!(identity.version, "16.0.0");
        assert_eq!(identity.url, "https://mirror.example/dist");
        assert_eq!(identity.command, "node");
        assert_eq!(identity.working_dir, Path::new("/p/.noderig/nodejs"));
    }

    #[test]
    fn test_discover_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_reports_file_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "[node\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains(FILE_NAME));
    }
}
