//! `sitepatch`: run the manifest in the current directory, list backups or
//! restore one

#![allow(missing_docs)]

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let matches = cli::build_cli().get_matches();
    init_logging(matches.get_flag("verbose"), matches.get_flag("log-json"));

    if let Err(err) = cli::dispatch(&matches) {
        eprintln!("error: {err:#}");
        std::process::exit(cli::exit_code(&err));
    }
}

/// Logs go to stderr so the stdout summary stays parseable
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
