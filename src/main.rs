//! fcache - inspect and edit persistent file-based caches
//!
//! A thin command-line wrapper around the `fcache` library. Every invocation
//! opens the cache, runs one operation and exits.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fcache::cli::{run, Cli, Outcome};

/// Sets up log output on stderr, honoring RUST_LOG and the -v flag
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fcache={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    // Usage errors exit 1 like other failures; status 2 is reserved for stale entries
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    setup_logging(cli.verbose);

    let mut stdout = io::stdout().lock();
    match run(&cli, &mut stdout) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Stale) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
