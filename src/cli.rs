use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::FeatureFlag;

/// php53-forge - build and install PHP 5.3 from source
#[derive(Parser)]
#[command(name = "php53-forge")]
#[command(about = "Resolve, build and install PHP 5.3 from a source tree")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be executed without making changes.
    ///
    /// Build commands and file changes are logged instead of performed.
    /// Host probing (pg_config) still runs so the plan is realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the feature flags this recipe understands
    Options,
    /// Resolve and print the configure arguments for a set of flags
    Plan {
        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,

        /// Configuration file supplying layout and default features
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Feature flags, e.g. `with-fpm` (use `-- --with-fpm` for the dashed form)
        #[arg(value_parser = parse_flag)]
        flags: Vec<FeatureFlag>,
    },
    /// Build and install from an unpacked PHP source tree
    Install {
        /// Unpacked php-5.3.x source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Configuration file supplying layout and default features
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(value_parser = parse_flag)]
        flags: Vec<FeatureFlag>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Check an installed build (php-fpm config test)
    Verify {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(value_parser = parse_flag)]
        flags: Vec<FeatureFlag>,
    },
}

fn parse_flag(arg: &str) -> Result<FeatureFlag, String> {
    FeatureFlag::parse_arg(arg).map_err(|e| e.to_string())
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
