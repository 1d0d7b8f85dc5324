//! Tests for error types

use miette::Diagnostic;
use noderig_core::Error;
use std::io;
use std::path::PathBuf;

#[test]
fn test_configuration_error() {
    let error = Error::configuration("Multiple packagers defined");
    assert_eq!(
        error.to_string(),
        "Configuration error: Multiple packagers defined"
    );

    let error = Error::configuration(String::from("missing install script"));
    assert_eq!(error.to_string(), "Configuration error: missing install script");
}

#[test]
fn test_io_error_keeps_context() {
    let source = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
    let error = Error::io(source, Some(PathBuf::from("/opt/node/bin/npm")), "create symlink");

    assert!(error.to_string().starts_with("I/O error during create symlink"));
    match error {
        Error::Io { path, .. } => {
            assert_eq!(path.as_deref(), Some(PathBuf::from("/opt/node/bin/npm").as_path()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_process_error_carries_exit_code() {
    let error = Error::process("npm exited with status 1", Some(1));
    assert_eq!(
        error.to_string(),
        "Process execution failed: npm exited with status 1"
    );
    assert!(matches!(error, Error::Process { exit_code: Some(1), .. }));
}

#[test]
fn test_diagnostic_codes() {
    let code = Error::configuration("x").code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("noderig::config::invalid"));

    let code = Error::process("x", None).code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("noderig::process"));
}
