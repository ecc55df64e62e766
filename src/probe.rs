//! Host probing
//!
//! Everything the resolver needs to know about the host is gathered here,
//! once, into `HostFacts`. The resolver itself never looks at the machine.

use crate::error::Result;
use crate::fs_ops::Filesystem;
use crate::layout::InstallLayout;
use crate::request::BuildRequest;
use crate::runner::{Invocation, ToolRunner};
use crate::types::FeatureFlag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment-query interface
pub trait ToolLocator {
    fn lookup_tool(&self, name: &str) -> Option<PathBuf>;
}

/// Looks tools up on `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn lookup_tool(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// A fixed name -> path table, for hosts described up front
#[derive(Debug, Default, Clone)]
pub struct FixedLocator {
    tools: HashMap<String, PathBuf>,
}

impl FixedLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), path.into());
        self
    }
}

impl ToolLocator for FixedLocator {
    fn lookup_tool(&self, name: &str) -> Option<PathBuf> {
        self.tools.get(name).cloned()
    }
}

/// Where the PostgreSQL client libraries were found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostgresLocation {
    /// A PostgreSQL formula installed under `opt/postgresql`
    Keg(PathBuf),
    /// A system PostgreSQL discovered through `pg_config`
    PgConfig {
        include_dir: PathBuf,
        pg_config: PathBuf,
    },
}

/// Facts about the host, collected before argument assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    pub postgres: Option<PostgresLocation>,
    /// `pg_config` on PATH; decides whether postgresql is a recommended dependency
    pub pg_config_installed: bool,
}

/// Probe the host for what `request` needs.
///
/// Only features that depend on the host trigger a lookup; an empty request
/// never touches the environment.
pub fn detect_host(
    request: &BuildRequest,
    layout: &InstallLayout,
    locator: &dyn ToolLocator,
    runner: &dyn ToolRunner,
    fs: &dyn Filesystem,
) -> Result<HostFacts> {
    let mut facts = HostFacts::default();

    if !request.contains(FeatureFlag::WithPgsql) {
        return Ok(facts);
    }

    let pg_config = locator.lookup_tool("pg_config");
    facts.pg_config_installed = pg_config.is_some();

    let keg = layout.dependency_prefix("postgresql");
    if fs.is_dir(&keg) {
        info!("Using PostgreSQL from {}", keg.display());
        facts.postgres = Some(PostgresLocation::Keg(keg));
    } else if let Some(pg_config) = pg_config {
        let include_dir = runner.capture(
            &Invocation::new(pg_config.to_string_lossy()).arg("--includedir"),
        )?;
        let include_dir = include_dir.trim();
        if include_dir.is_empty() {
            warn!("{} --includedir printed nothing", pg_config.display());
        } else {
            info!(
                "Using system PostgreSQL via {} (includes in {})",
                pg_config.display(),
                include_dir
            );
            facts.postgres = Some(PostgresLocation::PgConfig {
                include_dir: PathBuf::from(include_dir),
                pg_config,
            });
        }
    } else {
        debug!("No PostgreSQL keg at {} and no pg_config on PATH", keg.display());
    }

    Ok(facts)
}
