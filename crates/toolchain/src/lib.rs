//! Executable resolution for a Node.js toolchain
//!
//! Given a project configuration, this crate decides which executable to
//! launch for the runtime, its package managers and their secondary commands,
//! and with which arguments, working directory and search path.
//!
//! Resolution has two modes. In system-path mode every resolver returns its
//! bare command. In download mode executables live in versioned install
//! directories, and packagers shipped inside the runtime are launched as
//! scripts through the runtime itself.

pub mod config;
pub mod environment;
pub mod identity;
pub mod invocation;
mod links;
pub mod packager;
pub mod packager_cli;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod tasks;
pub mod toolchain;

pub use config::Config;
pub use environment::Environment;
pub use identity::{CliIdentity, PackagerKind, RuntimeIdentity, ToolchainIdentity};
pub use invocation::{InvocationBuilder, InvocationDescriptor};
pub use packager::PackagerResolver;
pub use packager_cli::CliResolver;
pub use registry::PackagerRegistry;
pub use resolver::{EXECUTABLE_MODE, Resolver};
pub use runtime::{Distribution, RuntimeManager};
pub use tasks::{
    DefaultPackagerTask, ExecOptions, InstallTask, NodeTask, PackagerCliTask, PackagerSetupTask,
    PackagerTask, Task,
};
pub use toolchain::{Toolchain, ToolchainInfo};
