//! Guarded installer
//!
//! Wraps a fallible install procedure so files it would collide with are
//! moved aside first and put back if it fails. A restore failure never hides
//! the procedure's own error: both are reported together.

use crate::backup::BackupSet;
use crate::error::{ForgeError, Result};
use crate::fs_ops::Filesystem;
use crate::install_state::{InstallContext, InstallStage};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{error, info, warn};

pub struct GuardedInstaller<'a> {
    fs: &'a dyn Filesystem,
    /// Paths the procedure may overwrite
    candidates: Vec<PathBuf>,
    context: InstallContext,
}

impl<'a> GuardedInstaller<'a> {
    pub fn new(fs: &'a dyn Filesystem, candidates: Vec<PathBuf>) -> Self {
        Self {
            fs,
            candidates,
            context: InstallContext::new(),
        }
    }

    pub fn context(&self) -> &InstallContext {
        &self.context
    }

    pub fn stage(&self) -> InstallStage {
        self.context.current_stage()
    }

    /// Back up colliding files, run `procedure`, then commit or roll back.
    ///
    /// On success the backups are deleted and the procedure's value returned.
    /// On failure the backups are moved back and the procedure's error is
    /// returned unchanged; if that restore itself fails the result is
    /// `ForgeError::RollbackIncomplete` carrying both errors.
    ///
    /// A panic inside `procedure` restores the backups, rolls the context
    /// back and then resumes unwinding.
    ///
    /// An installer runs once. Calling this again returns a transition error.
    pub fn run<T, F>(&mut self, procedure: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.stage() != InstallStage::Idle {
            return Err(ForgeError::install_transition(format!(
                "installer already ran (stage: {})",
                self.stage()
            )));
        }

        let colliding = self.candidates.iter().filter(|p| self.fs.exists(p)).count();
        if colliding > 0 {
            warn!("Backing up {} conflicting file(s) before install", colliding);
        }

        let mut backups = match BackupSet::acquire(self.fs, &self.candidates) {
            Ok(backups) => backups,
            Err(err) => {
                self.context.roll_back()?;
                return Err(err);
            }
        };
        self.context.transition_to(InstallStage::BackedUp)?;
        self.context.transition_to(InstallStage::Installing)?;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(procedure)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!("Install panicked, restoring backups");
                if let Err(restore) = backups.restore() {
                    error!("Rollback incomplete: {}", restore);
                }
                if let Err(err) = self.context.roll_back() {
                    error!("{}", err);
                }
                panic::resume_unwind(payload);
            }
        };

        match outcome {
            Ok(value) => {
                // The install is in place even if a backup cannot be deleted.
                let discarded = backups.discard();
                self.context.transition_to(InstallStage::Committed)?;
                discarded?;
                info!("Install committed");
                Ok(value)
            }
            Err(original) => {
                error!("Install failed: {}", original);
                let restored = backups.restore();
                self.context.roll_back()?;
                match restored {
                    Ok(()) => {
                        info!("Rolled back {} backup(s)", backups.len());
                        Err(original)
                    }
                    Err(restore) => {
                        error!("Rollback incomplete: {}", restore);
                        Err(ForgeError::RollbackIncomplete {
                            original: Box::new(original),
                            restore: Box::new(restore),
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::HostFs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_clean_host_commits_without_backups() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("pear.conf");
        let mut installer = GuardedInstaller::new(&HostFs, vec![conf.clone()]);

        let value = installer.run(|| Ok(42)).unwrap();

        assert_eq!(value, 42);
        assert!(installer.context().is_committed());
        assert!(!dir.path().join("pear.conf-backup").exists());
    }

    #[test]
    fn test_failure_restores_and_returns_original_error() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("pear.conf");
        fs::write(&conf, "user settings").unwrap();

        let mut installer = GuardedInstaller::new(&HostFs, vec![conf.clone()]);
        let err = installer
            .run(|| -> Result<()> {
                fs::write(&conf, "half written").unwrap();
                Err(ForgeError::external_tool("make install", 2, "boom"))
            })
            .unwrap_err();

        assert!(matches!(err, ForgeError::ExternalTool { code: 2, .. }));
        assert_eq!(fs::read_to_string(&conf).unwrap(), "user settings");
        assert_eq!(installer.stage(), InstallStage::RolledBack);
        assert_eq!(
            installer.context().rolled_back_from(),
            Some(InstallStage::Installing)
        );
    }

    #[test]
    fn test_runs_only_once() {
        let dir = TempDir::new().unwrap();
        let mut installer = GuardedInstaller::new(&HostFs, vec![dir.path().join("pear.conf")]);
        installer.run(|| Ok(())).unwrap();

        let err = installer.run(|| Ok(())).unwrap_err();
        assert!(matches!(err, ForgeError::InstallTransition(_)));
    }
}
