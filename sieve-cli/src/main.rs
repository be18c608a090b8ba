//! Entry point for the `osm-sieve` command-line interface.
#![forbid(unsafe_code)]

use sieve_cli::CliError;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = sieve_cli::run() {
        report(&err);
        std::process::exit(err.exit_code());
    }
}

/// Send log records to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &CliError) {
    if let CliError::ArgumentParsing(clap_err) = err {
        // Clap renders usage, help and version output itself.
        if clap_err.print().is_ok() {
            return;
        }
    }
    eprintln!("osm-sieve: {err}");
}
