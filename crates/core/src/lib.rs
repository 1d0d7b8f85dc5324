//! Core building blocks for noderig
//!
//! This crate holds the pieces every other noderig crate depends on:
//! - [`Error`] and [`Result`], the shared error surface
//! - [`Lazy`], a single-assignment memo cell with racy and double-checked variants
//! - [`PlatformProbe`], which maps the host OS and architecture onto the
//!   naming scheme used by Node.js distributions
//! - [`ProcessExecutor`], the seam used to run short-lived host commands

pub mod error;
pub mod lazy;
pub mod platform;
pub mod process;

pub use error::{Error, Result};
pub use lazy::Lazy;
pub use platform::{Arch, FixedPlatform, HostPlatform, HostProperties, Os, PlatformProbe};
pub use process::{ProcessExecutor, SystemExecutor};
