//! # rig
//!
//! Command-line runner for testrig suites.
//!
//! ## Commands
//!
//! - `list`: Show the registered root tests
//! - `run`: Run the suite and write TAP/JSON reports
//!
//! ## Example
//!
//! ```bash
//! # Everything, four bodies at a time
//! rig run --parallel 4
//!
//! # Only the os-release checks for ID
//! rig run --filter 'os-release/^ID$'
//!
//! # Second of three CI shards, with a config file
//! rig --config rig.toml run --sharding hash:2/3
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rig_harness::HarnessConfig;

mod commands;
mod probes;

use commands::{list, run};

/// Default configuration file, read when present.
const DEFAULT_CONFIG: &str = "rig.toml";

/// Command-line runner for testrig suites.
#[derive(Parser, Debug)]
#[command(name = "rig")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./rig.toml if it exists)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Report passing and skipped tests, and log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered root tests
    List {
        /// Only list roots matching this pattern
        pattern: Option<String>,
    },

    /// Run the suite
    Run {
        /// Slash-separated filter, one regular expression per level
        #[arg(long, short)]
        filter: Option<String>,

        /// Maximum bodies running at once (0 = one per CPU)
        #[arg(long, short)]
        parallel: Option<usize>,

        /// Stop starting tests at a level once one of them failed
        #[arg(long)]
        fail_fast: bool,

        /// Only run root tests in this shard (hash:m/n)
        #[arg(long)]
        sharding: Option<String>,

        /// Directory for test.tap and reports/
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    config.run.verbose |= cli.verbose;

    match cli.command {
        Commands::List { pattern } => {
            list::run(&config, pattern.as_deref().unwrap_or_default())?;
        }
        Commands::Run {
            filter,
            parallel,
            fail_fast,
            sharding,
            output_dir,
        } => {
            if let Some(filter) = filter {
                config.run.filter = filter;
            }
            if let Some(parallel) = parallel {
                config.run.parallel = parallel;
            }
            if sharding.is_some() {
                config.run.sharding = sharding;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            config.run.fail_fast |= fail_fast;
            run::run(config).await?;
        }
    }

    Ok(())
}

/// Load the configuration named on the command line, else `rig.toml` if
/// present, else defaults.
fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            HarnessConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("Failed to load {DEFAULT_CONFIG}"))
        }
        None => Ok(HarnessConfig::default()),
    }
}
