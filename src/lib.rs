//! php53-forge Library
//!
//! Resolves PHP 5.3 build options into `./configure` arguments and runs the
//! source build inside a guarded install that backs up and restores
//! colliding files.

pub mod backup;
pub mod cli;
pub mod config_file;
pub mod error;
pub mod fs_ops;
pub mod install_state;
pub mod installer;
pub mod layout;
pub mod logic;
pub mod patching;
pub mod probe;
pub mod recipe;
pub mod request;
pub mod runner;
pub mod types;

// Re-export main types for convenience
pub use backup::{BackupEntry, BackupSet};
pub use config_file::RecipeConfig;
pub use error::{ForgeError, Result};
pub use install_state::{InstallContext, InstallStage, InstallTransitionError};
pub use installer::GuardedInstaller;
pub use layout::InstallLayout;
pub use logic::plan::{BuildPlan, prepare};
pub use logic::resolver::{render_args, resolve_build_args};
pub use probe::HostFacts;
pub use recipe::Php53Recipe;
pub use request::BuildRequest;
pub use runner::{Invocation, StepOutput, ToolRunner};
pub use types::{BuildArgument, ConflictRule, FeatureFlag};
