//! noderig binary entry point

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use noderig::cli::{self, EXIT_FAILURE, EXIT_OK, exit_code_for, render_error};
use noderig::commands;
use noderig::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize logging: {e:?}");
        std::process::exit(EXIT_FAILURE);
    }

    let exit_code = match commands::execute(&cli) {
        Ok(Some(output)) => {
            println!("{output}");
            EXIT_OK
        }
        Ok(None) => EXIT_OK,
        Err(err) => {
            render_error(&err);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}
