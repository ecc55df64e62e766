//! Recipe configuration file handling.
//!
//! A `RecipeConfig` records where a build installs to and which features it
//! enables, so a build can be repeated from a saved JSON file. Feature names
//! are the same kebab-case strings the command line accepts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::InstallLayout;
use crate::request::BuildRequest;
use crate::types::FeatureFlag;

/// Environment variable overriding the keg prefix
pub const PREFIX_ENV: &str = "PHP53_FORGE_PREFIX";
/// Environment variable overriding the shared root
pub const ROOT_ENV: &str = "PHP53_FORGE_ROOT";

pub const DEFAULT_ROOT: &str = "/usr/local";
pub const DEFAULT_PREFIX: &str = "/usr/local/Cellar/php53/5.3.15";

/// Build configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub prefix: PathBuf,
    pub root: PathBuf,

    /// Defaults to the current user's home directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,

    #[serde(default)]
    pub features: Vec<FeatureFlag>,

    /// Where source patches (suhosin) have been downloaded to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches_dir: Option<PathBuf>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(DEFAULT_PREFIX),
            root: PathBuf::from(DEFAULT_ROOT),
            home: None,
            features: Vec::new(),
            patches_dir: None,
        }
    }
}

impl RecipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults; then apply
    /// environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `PHP53_FORGE_PREFIX` / `PHP53_FORGE_ROOT` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup(PREFIX_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("{} overrides prefix: {}", PREFIX_ENV, prefix);
            self.prefix = PathBuf::from(prefix);
        }
        if let Some(root) = lookup(ROOT_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("{} overrides root: {}", ROOT_ENV, root);
            self.root = PathBuf::from(root);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.prefix.is_absolute() {
            anyhow::bail!("Prefix must be an absolute path: {}", self.prefix.display());
        }
        if !self.root.is_absolute() {
            anyhow::bail!("Root must be an absolute path: {}", self.root.display());
        }
        if self.prefix == self.root {
            anyhow::bail!("Prefix must be a keg directory, not the shared root");
        }
        if let Some(home) = &self.home {
            if !home.is_absolute() {
                anyhow::bail!("Home must be an absolute path: {}", home.display());
            }
        }

        self.request()
            .check_conflicts()
            .context("Invalid feature selection")?;

        if self.features.contains(&FeatureFlag::WithSuhosin) && self.patches_dir.is_none() {
            anyhow::bail!("--with-suhosin requires patches_dir");
        }

        Ok(())
    }

    /// Configured features as a request (implied flags not applied)
    pub fn request(&self) -> BuildRequest {
        BuildRequest::new(self.features.iter().copied())
    }

    pub fn layout(&self) -> Result<InstallLayout> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => dirs::home_dir().context("Could not determine home directory")?,
        };
        Ok(InstallLayout::new(&self.prefix, &self.root, home))
    }
}
