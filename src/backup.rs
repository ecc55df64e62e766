//! Scoped file backups
//!
//! `BackupSet` moves colliding files aside and guarantees each one is either
//! restored or discarded exactly once. Settling happens through `restore()`
//! or `discard()`; a set dropped while still holding backups restores them,
//! which covers panics unwinding through the install procedure.

use crate::error::{ForgeError, Result};
use crate::fs_ops::Filesystem;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Suffix appended to a file's path to form its backup path
pub const BACKUP_SUFFIX: &str = "-backup";

/// A file relocated for the duration of a risky operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub original: PathBuf,
    pub backup: PathBuf,
}

impl BackupEntry {
    /// `pear.conf` -> `pear.conf-backup`, alongside the original
    pub fn for_path(path: &Path) -> Self {
        let mut backup = path.as_os_str().to_os_string();
        backup.push(BACKUP_SUFFIX);
        Self {
            original: path.to_path_buf(),
            backup: PathBuf::from(backup),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Held,
    Restored,
    Discarded,
    /// Restore was attempted and failed; never retried
    Stuck,
}

/// Backups taken for one guarded install
pub struct BackupSet<'a> {
    fs: &'a dyn Filesystem,
    entries: Vec<(BackupEntry, EntryState)>,
}

impl<'a> BackupSet<'a> {
    /// Move every existing candidate to its backup path.
    ///
    /// Candidates that do not exist are skipped, so a clean host gets no
    /// backup files at all. If a move fails, whatever was already moved is
    /// put back before the error is returned.
    pub fn acquire(fs: &'a dyn Filesystem, candidates: &[PathBuf]) -> Result<Self> {
        let mut set = Self {
            fs,
            entries: Vec::with_capacity(candidates.len()),
        };

        for path in candidates {
            if !fs.exists(path) {
                debug!("No {} to back up", path.display());
                continue;
            }

            let entry = BackupEntry::for_path(path);
            if fs.exists(&entry.backup) {
                warn!("Overwriting stale backup {}", entry.backup.display());
            }

            if let Err(err) = fs.rename(&entry.original, &entry.backup) {
                error!("Backup of {} failed: {}", path.display(), err);
                return match set.restore() {
                    Ok(()) => Err(err),
                    Err(restore) => Err(ForgeError::RollbackIncomplete {
                        original: Box::new(err),
                        restore: Box::new(restore),
                    }),
                };
            }

            info!("Backed up {} to {}", entry.original.display(), entry.backup.display());
            set.entries.push((entry, EntryState::Held));
        }

        Ok(set)
    }

    pub fn entries(&self) -> impl Iterator<Item = &BackupEntry> {
        self.entries.iter().map(|(entry, _)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once every entry has been restored or discarded
    pub fn is_settled(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, state)| *state != EntryState::Held)
    }

    /// Move every held backup back to its original path.
    ///
    /// Idempotent: entries already settled are skipped, and a backup that
    /// no longer exists counts as restored. Every entry is attempted; the
    /// first failure is returned.
    pub fn restore(&mut self) -> Result<()> {
        let fs = self.fs;
        let mut first_err = None;

        for (entry, state) in self.entries.iter_mut() {
            if *state != EntryState::Held {
                continue;
            }

            if !fs.exists(&entry.backup) {
                warn!("Backup {} vanished, nothing to restore", entry.backup.display());
                *state = EntryState::Restored;
                continue;
            }

            match fs.rename(&entry.backup, &entry.original) {
                Ok(()) => {
                    info!("Restored {}", entry.original.display());
                    *state = EntryState::Restored;
                }
                Err(err) => {
                    error!("Could not restore {}: {}", entry.original.display(), err);
                    *state = EntryState::Stuck;
                    first_err.get_or_insert(err);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Delete every held backup. Every entry is attempted; the first failure
    /// is returned.
    pub fn discard(&mut self) -> Result<()> {
        let fs = self.fs;
        let mut first_err = None;

        for (entry, state) in self.entries.iter_mut() {
            if *state != EntryState::Held {
                continue;
            }

            *state = EntryState::Discarded;
            if !fs.exists(&entry.backup) {
                continue;
            }
            match fs.remove(&entry.backup) {
                Ok(()) => debug!("Discarded {}", entry.backup.display()),
                Err(err) => {
                    error!("Could not discard {}: {}", entry.backup.display(), err);
                    first_err.get_or_insert(err);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for BackupSet<'_> {
    fn drop(&mut self) {
        if self.is_settled() {
            return;
        }
        warn!("Backups dropped without being settled, restoring");
        if let Err(err) = self.restore() {
            error!("Restore during cleanup failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::HostFs;
    use std::fs;
    use tempfile::TempDir;

    fn candidates(dir: &TempDir) -> Vec<PathBuf> {
        vec![dir.path().join("etc-pear.conf"), dir.path().join("home-pear.conf")]
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        let entry = BackupEntry::for_path(Path::new("/usr/local/etc/php/5.3/pear.conf"));
        assert_eq!(
            entry.backup,
            PathBuf::from("/usr/local/etc/php/5.3/pear.conf-backup")
        );
    }

    #[test]
    fn test_acquire_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        let set = BackupSet::acquire(&HostFs, &candidates(&dir)).unwrap();
        assert!(set.is_empty());
        assert!(set.is_settled());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_backup_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("pear.conf");
        let stale = dir.path().join("pear.conf-backup");
        fs::write(&conf, "current").unwrap();
        fs::write(&stale, "stale").unwrap();

        let mut set = BackupSet::acquire(&HostFs, &[conf.clone()]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!conf.exists());
        assert_eq!(fs::read_to_string(&stale).unwrap(), "current");

        set.restore().unwrap();
        assert_eq!(fs::read_to_string(&conf).unwrap(), "current");
        assert!(!stale.exists());
    }

    #[test]
    fn test_partial_backup_restores() {
        let dir = TempDir::new().unwrap();
        let paths = candidates(&dir);
        fs::write(&paths[1], "home").unwrap();

        let mut set = BackupSet::acquire(&HostFs, &paths).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!paths[1].exists());

        set.restore().unwrap();
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "home");
        assert!(!paths[0].exists());
        // second restore is a no-op
        set.restore().unwrap();
    }

    #[test]
    fn test_discard_removes_backups() {
        let dir = TempDir::new().unwrap();
        let paths = candidates(&dir);
        fs::write(&paths[0], "etc").unwrap();
        fs::write(&paths[1], "home").unwrap();

        let mut set = BackupSet::acquire(&HostFs, &paths).unwrap();
        let backups: Vec<PathBuf> = set.entries().map(|e| e.backup.clone()).collect();
        set.discard().unwrap();

        assert!(set.is_settled());
        for backup in backups {
            assert!(!backup.exists());
        }
    }

    #[test]
    fn test_restore_overwrites_file_written_meanwhile() {
        let dir = TempDir::new().unwrap();
        let paths = candidates(&dir);
        fs::write(&paths[0], "original").unwrap();

        let mut set = BackupSet::acquire(&HostFs, &paths).unwrap();
        fs::write(&paths[0], "written by install").unwrap();
        set.restore().unwrap();

        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "original");
    }

    #[test]
    fn test_vanished_backup_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = candidates(&dir);
        fs::write(&paths[0], "etc").unwrap();

        let mut set = BackupSet::acquire(&HostFs, &paths).unwrap();
        fs::remove_file(dir.path().join("etc-pear.conf-backup")).unwrap();

        assert!(set.restore().is_ok());
        assert!(set.is_settled());
    }

    #[test]
    fn test_drop_restores_unsettled_backups() {
        let dir = TempDir::new().unwrap();
        let paths = candidates(&dir);
        fs::write(&paths[0], "etc").unwrap();

        {
            let _set = BackupSet::acquire(&HostFs, &paths).unwrap();
            assert!(!paths[0].exists());
        }

        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "etc");
        assert!(!dir.path().join("etc-pear.conf-backup").exists());
    }
}
