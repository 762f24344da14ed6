//! OpenFit CLI
//!
//! Answers admission and staff questions against a JSON data file holding
//! the catalog, the member directory and the persisted entitlement stores.
//!
//! # Usage
//!
//! ```bash
//! openfit --data club.json check-in --member 100 --branch 2
//! openfit --data club.json book --member 100 --branch 1 --class 10
//! openfit --data club.json summary --member 100 --format yaml
//! openfit --data club.json explain --member 100 --branch 1 --class 10
//! openfit --data club.json --at 2026-07-01T08:00:00Z validate
//! ```

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "openfit")]
#[command(author = "OpenFit")]
#[command(version)]
#[command(about = "OpenFit entitlement command line interface", long_about = None)]
struct Cli {
    /// Data file with catalog, members and stores
    #[arg(long, short, env = "OPENFIT_DATA", default_value = "openfit-data.json")]
    data: String,

    /// Service configuration file
    #[arg(long, short, env = "OPENFIT_CONFIG")]
    config: Option<String>,

    /// Evaluation instant (RFC 3339), defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check-in admission at a branch
    CheckIn {
        #[arg(long)]
        member: u64,
        #[arg(long)]
        branch: u64,
    },
    /// Class-booking admission
    Book {
        #[arg(long)]
        member: u64,
        #[arg(long)]
        branch: u64,
        #[arg(long)]
        class: u64,
    },
    /// Staff summary of a member's entitlements
    Summary {
        #[arg(long)]
        member: u64,
    },
    /// Show which rule decides a class type at a branch
    Explain {
        #[arg(long)]
        member: u64,
        #[arg(long)]
        branch: u64,
        #[arg(long)]
        class: u64,
    },
    /// Validate the data file
    Validate,
    /// Print the persisted store layout
    Export,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = run(cli);
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let service_config = config::load_service_config(cli.config.as_deref())?;
    let data = config::DataFile::load(&cli.data)
        .with_context(|| format!("loading data file {}", cli.data))?;
    let ctx = commands::Context::build(data, service_config, cli.at)?;

    commands::handle(cli.command, &ctx, cli.format)
}
