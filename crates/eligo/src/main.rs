// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eligo - asynchronous eligibility verification tracker.
//!
//! Binary entry point: the long-running service plus a few one-shot
//! inspection commands over the same database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod context;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eligo_config::EligoConfig;
use eligo_core::IndexKind;

/// Eligo - asynchronous eligibility verification tracker.
#[derive(Parser, Debug)]
#[command(name = "eligo", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the XDG hierarchy.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the polling scheduler, purge loop, and (if enabled) intake.
    Serve,
    /// Run a single appointment intake pass and print its metrics.
    Check,
    /// Look up tracked tasks through a metadata index.
    Lookup {
        /// Index to query: subject, patient, national_id, member, scheduling.
        kind: IndexKind,
        /// Value indexed under `kind`.
        value: String,
        /// Only the newest completed task (subject lookups).
        #[arg(long)]
        latest: bool,
    },
    /// List verifications still pending or processing.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> EligoConfig {
    let loaded = match path {
        Some(path) => eligo_config::load_and_validate_path(path),
        None => eligo_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            eligo_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => commands::run_check(&config).await,
        Some(Commands::Lookup {
            kind,
            value,
            latest,
        }) => commands::run_lookup(&config, kind, &value, latest).await,
        Some(Commands::Status { json }) => commands::run_status(&config, json).await,
        None => {
            println!("eligo: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
