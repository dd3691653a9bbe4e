//! tubestore CLI entry point.

use std::io;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tubestore_cli::cli::Cli;
use tubestore_cli::commands;
use tubestore_persistence::{ErrorKind, Store};

fn main() {
    // Load .env if it exists (for TUBESTORE_DATA_PATH etc.)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let store = match Store::open(cli.store_config()) {
        Ok(store) => store,
        Err(e) if e.kind() == ErrorKind::LockTimeout => {
            eprintln!("Error: {} (is another tubestore process running?)", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    let result = commands::execute(cli.command, &store, cli.format, &mut stdout);
    drop(stdout);

    if let Err(e) = store.close() {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
