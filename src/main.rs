//! php53-forge - Main entry point
//!
//! Loads configuration, resolves a build plan and either prints it or runs
//! the guarded install.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use php53_forge::cli::{Cli, Commands};
use php53_forge::config_file::RecipeConfig;
use php53_forge::fs_ops::{DryRunFs, Filesystem, HostFs};
use php53_forge::layout::InstallLayout;
use php53_forge::logic::plan::{BuildPlan, prepare};
use php53_forge::probe::PathLocator;
use php53_forge::recipe::{self, Php53Recipe};
use php53_forge::request::BuildRequest;
use php53_forge::runner::{DryRunRunner, ProcessRunner, ToolRunner};
use php53_forge::types::FeatureFlag;

/// Initialize the tracing subscriber; `RUST_LOG` overrides the level
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Main application entry point
fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Options => print_options(),
        Commands::Plan {
            json,
            config,
            flags,
        } => {
            let (_, layout, plan) = resolve(config.as_deref(), &flags)?;
            print_plan(&plan, &layout, json)?;
        }
        Commands::Install {
            source,
            config,
            flags,
        } => {
            let (config, layout, plan) = resolve(config.as_deref(), &flags)?;
            let runner: &dyn ToolRunner;
            let fs: &dyn Filesystem;
            if cli.dry_run {
                info!("Dry-run mode: no commands will run and no files will change");
                runner = &DryRunRunner;
                fs = &DryRunFs;
            } else {
                runner = &ProcessRunner;
                fs = &HostFs;
            }

            Php53Recipe::new(&plan, &layout, source, runner, fs)
                .patches_dir(config.patches_dir.clone())
                .dry_run(cli.dry_run)
                .install()
                .context("Install failed")?;
        }
        Commands::Validate { config } => {
            info!("Validating configuration file: {:?}", config);
            match RecipeConfig::load_from_file(&config).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => {
                    info!("Configuration validation successful");
                    println!("✓ Configuration file is valid: {:?}", config);
                }
                Err(e) => {
                    error!("Configuration validation failed: {:#}", e);
                    eprintln!("✗ Configuration validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Verify { config, flags } => {
            let (_, layout, plan) = resolve(config.as_deref(), &flags)?;
            let runner: &dyn ToolRunner = if cli.dry_run {
                &DryRunRunner
            } else {
                &ProcessRunner
            };
            recipe::verify(&plan, &layout, runner).context("Verification failed")?;
            println!("✓ Installation verified");
        }
    }

    Ok(())
}

/// Load config, merge command-line flags, probe the host and resolve a plan
fn resolve(
    config_path: Option<&Path>,
    flags: &[FeatureFlag],
) -> Result<(RecipeConfig, InstallLayout, BuildPlan)> {
    let config = RecipeConfig::load_or_default(config_path)?;
    config.validate()?;
    let layout = config.layout()?;

    let request = config
        .request()
        .merged(&BuildRequest::new(flags.iter().copied()));
    let plan = prepare(&request, &layout, &PathLocator, &ProcessRunner, &HostFs)?;
    Ok((config, layout, plan))
}

fn print_options() {
    for flag in FeatureFlag::all() {
        println!("  --{:<24} {}", flag.to_string(), flag.description());
    }
}

fn print_plan(plan: &BuildPlan, layout: &InstallLayout, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(plan).context("Failed to serialize plan")?
        );
        return Ok(());
    }

    println!("Prefix: {}", layout.prefix.display());
    println!("Dependencies:");
    for dep in &plan.dependencies {
        println!("  {} ({})", dep.name, dep.kind);
    }
    if !plan.patches.is_empty() {
        println!("Patches:");
        for patch in &plan.patches {
            println!("  {} <{}>", patch.file_name, patch.url);
        }
    }
    println!("Configure arguments:");
    for arg in plan.configure_args() {
        println!("  {}", arg);
    }
    Ok(())
}
