//! Error handling module for php53-forge
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every failure of an install attempt is one of these kinds; none are retried.

use crate::types::FeatureFlag;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for php53-forge
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Mutually exclusive feature flags were requested together.
    /// Raised before any I/O happens.
    #[error("Cannot specify more than one {group}: {}", join_flags(.flags))]
    Conflict {
        group: &'static str,
        flags: Vec<FeatureFlag>,
    },

    /// An external build step exited non-zero
    #[error("{step} failed (exit code {code}): {stderr}")]
    ExternalTool {
        step: String,
        code: i32,
        stderr: String,
    },

    /// A backup, restore or file write failed
    #[error("Filesystem error: cannot {op} {}: {source}", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An optional host tool needed by a requested feature is absent
    #[error("{feature} requires {tool}, which was not found on this host")]
    MissingTool {
        tool: &'static str,
        feature: FeatureFlag,
    },

    /// The install failed and the backups could not all be put back
    #[error("{original} (rollback incomplete: {restore})")]
    RollbackIncomplete {
        original: Box<ForgeError>,
        restore: Box<ForgeError>,
    },

    /// A file patch did not apply
    #[error("Patch error: {0}")]
    Patch(String),

    /// Validation errors (unknown flags, bad config values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (loading, parsing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Install state machine transition errors
    #[error("Install transition error: {0}")]
    InstallTransition(String),

    /// IO errors outside the filesystem abstraction (process spawning, pipes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for php53-forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

fn join_flags(flags: &[FeatureFlag]) -> String {
    flags
        .iter()
        .map(|f| format!("--{}", f))
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenient error constructors
impl ForgeError {
    /// Create a filesystem error for `op` on `path`
    pub fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// Create an external tool error
    pub fn external_tool(step: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self::ExternalTool {
            step: step.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Create a patch error
    pub fn patch(msg: impl Into<String>) -> Self {
        Self::Patch(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an install transition error
    pub fn install_transition(msg: impl Into<String>) -> Self {
        Self::InstallTransition(msg.into())
    }

    /// Returns true for the error kinds raised before any side effect
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
