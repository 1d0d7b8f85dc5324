//! Toolchain identities and the built-in packager templates.

use noderig_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Node.js version used when none is configured.
pub const DEFAULT_NODE_VERSION: &str = "12.16.3";

/// npm version bundled with [`DEFAULT_NODE_VERSION`].
pub const DEFAULT_NPM_VERSION: &str = "6.14.4";

/// Distribution server used when none is configured.
pub const DEFAULT_NODE_URL: &str = "https://nodejs.org/dist";

/// Canonical runtime command.
pub const NODE_COMMAND: &str = "node";

/// Identity of the runtime interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeIdentity {
    /// Command used to launch the runtime
    pub command: String,
    /// Declared runtime version
    pub version: String,
    /// Base URL of the distribution server
    pub url: String,
    /// Base directory that versioned runtimes are unpacked into
    pub working_dir: PathBuf,
}

impl RuntimeIdentity {
    /// Runtime identity with default command, version and URL.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: NODE_COMMAND.to_string(),
            version: DEFAULT_NODE_VERSION.to_string(),
            url: DEFAULT_NODE_URL.to_string(),
            working_dir: working_dir.into(),
        }
    }
}

/// Secondary command shipped with a packager, such as `npx`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliIdentity {
    /// Command string
    pub command: String,
    /// Script path relative to the packager installation
    #[serde(default, alias = "local_script", skip_serializing_if = "Option::is_none")]
    pub local_script: Option<String>,
}

impl CliIdentity {
    fn new(command: &str, local_script: &str) -> Self {
        Self {
            command: command.to_string(),
            local_script: Some(local_script.to_string()),
        }
    }
}

/// Identity of a package manager.
///
/// Mutable while the configuration is evaluated. Resolvers snapshot derived
/// paths on first use, so later edits do not move them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainIdentity {
    /// Command string
    pub command: String,
    /// Keyword that adds a dependency, e.g. `add` for yarn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_command: Option<String>,
    /// Declared version; `None` means the latest release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Package name used to install this packager from a registry
    pub npm_package: String,
    /// Script path relative to the runtime's packager directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_script: Option<String>,
    /// Base directory that versioned installs are placed into
    pub working_dir: PathBuf,
    /// Files read by install operations
    pub input_files: Vec<String>,
    /// Files written by install operations
    pub output_files: Vec<String>,
    /// Directories written by install operations
    pub output_directories: Vec<String>,
    /// Secondary command, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli: Option<CliIdentity>,
}

/// Supported package manager kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagerKind {
    /// npm
    Npm,
    /// pnpm
    Pnpm,
    /// cnpm
    Cnpm,
    /// Yarn
    Yarn,
    /// Any other registry client
    Custom,
}

impl PackagerKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 5] = [Self::Npm, Self::Pnpm, Self::Cnpm, Self::Yarn, Self::Custom];

    /// Logical name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Cnpm => "cnpm",
            Self::Yarn => "yarn",
            Self::Custom => "custom",
        }
    }

    /// Name assigned to the secondary command by the template, if any.
    #[must_use]
    pub const fn cli_name(self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("npx"),
            Self::Pnpm => Some("pnpx"),
            Self::Cnpm | Self::Yarn | Self::Custom => None,
        }
    }

    /// Template identity for this kind, rooted at `working_dir`.
    pub fn template(self, working_dir: impl Into<PathBuf>) -> ToolchainIdentity {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let name = self.name();
        let mut identity = ToolchainIdentity {
            command: name.to_string(),
            add_command: None,
            version: None,
            npm_package: name.to_string(),
            local_script: None,
            working_dir: working_dir.into(),
            input_files: Vec::new(),
            output_files: Vec::new(),
            output_directories: Vec::new(),
            cli: None,
        };

        match self {
            Self::Npm => {
                identity.add_command = Some("install".to_string());
                identity.local_script = Some("bin/npm-cli.js".to_string());
                identity.input_files = strings(&["package.json", "package-lock.json"]);
                identity.output_files = strings(&["package-lock.json"]);
                identity.output_directories = strings(&["node_modules"]);
                identity.cli = Some(CliIdentity::new("npx", "bin/npx-cli.js"));
            }
            Self::Pnpm => {
                identity.add_command = Some("add".to_string());
                identity.local_script = Some("bin/pnpm.js".to_string());
                identity.input_files = strings(&["package.json"]);
                identity.output_files = strings(&["pnpm-lock.yaml"]);
                identity.output_directories = strings(&["node_modules"]);
                identity.cli = Some(CliIdentity::new("pnpx", "bin/pnpx.js"));
            }
            Self::Cnpm => {
                identity.add_command = Some("install".to_string());
                identity.input_files = strings(&["package.json"]);
                identity.output_directories = strings(&["node_modules"]);
            }
            Self::Yarn => {
                identity.add_command = Some("add".to_string());
                identity.input_files = strings(&["package.json", "yarn.lock"]);
                identity.output_files = strings(&["yarn.lock"]);
                identity.output_directories = strings(&["node_modules"]);
            }
            Self::Custom => {}
        }

        identity
    }
}

impl fmt::Display for PackagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackagerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "Unknown packager '{s}', expected one of npm, pnpm, cnpm, yarn, custom"
                ))
            })
    }
}
