//! noderig command-line interface
//!
//! The binary parses arguments with [`cli::parse`], installs logging with
//! [`tracing::init_tracing`] and hands over to [`commands::execute`].

pub mod cli;
pub mod commands;
pub mod tracing;
