//! Tests for the Guarded Installer
//!
//! These tests verify:
//! - Colliding files are restored when the install fails
//! - Backups are discarded when the install succeeds
//! - No backup files appear on a clean host
//! - A failed restore surfaces both the install error and the restore error
//! - A panic inside the install restores backups and rolls back
//! - A backup that cannot be deleted after success is reported

use std::cell::Cell;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use php53_forge::fs_ops::{Filesystem, HostFs};
use php53_forge::{ForgeError, GuardedInstaller, InstallStage, Result};

/// Two pear.conf locations inside a temp dir, like config path and home
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etc/php/5.3")).unwrap();
        fs::create_dir_all(dir.path().join("home")).unwrap();
        Self { dir }
    }

    fn etc_conf(&self) -> PathBuf {
        self.dir.path().join("etc/php/5.3/pear.conf")
    }

    fn home_conf(&self) -> PathBuf {
        self.dir.path().join("home/pear.conf")
    }

    fn candidates(&self) -> Vec<PathBuf> {
        vec![self.etc_conf(), self.home_conf()]
    }

    fn backup_of(path: &Path) -> PathBuf {
        PathBuf::from(format!("{}-backup", path.display()))
    }
}

/// Host filesystem that refuses to move backups back into place
struct NoRestoreFs;

impl Filesystem for NoRestoreFs {
    fn exists(&self, path: &Path) -> bool {
        HostFs.exists(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        HostFs.is_dir(path)
    }
    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        if src.to_string_lossy().ends_with("-backup") {
            return Err(ForgeError::filesystem(
                "move",
                src,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        HostFs.rename(src, dst)
    }
    fn remove(&self, path: &Path) -> Result<()> {
        HostFs.remove(path)
    }
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        HostFs.write(path, contents)
    }
    fn read_to_string(&self, path: &Path) -> Result<String> {
        HostFs.read_to_string(path)
    }
    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        HostFs.copy(src, dst)
    }
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        HostFs.create_dir_all(path)
    }
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode(path, mode)
    }
    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode_recursive(path, mode)
    }
}

/// Host filesystem that cannot delete backups
struct NoDiscardFs;

impl Filesystem for NoDiscardFs {
    fn exists(&self, path: &Path) -> bool {
        HostFs.exists(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        HostFs.is_dir(path)
    }
    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        HostFs.rename(src, dst)
    }
    fn remove(&self, path: &Path) -> Result<()> {
        if path.to_string_lossy().ends_with("-backup") {
            return Err(ForgeError::filesystem(
                "remove",
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "immutable"),
            ));
        }
        HostFs.remove(path)
    }
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        HostFs.write(path, contents)
    }
    fn read_to_string(&self, path: &Path) -> Result<String> {
        HostFs.read_to_string(path)
    }
    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        HostFs.copy(src, dst)
    }
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        HostFs.create_dir_all(path)
    }
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode(path, mode)
    }
    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode_recursive(path, mode)
    }
}

/// Host filesystem whose Nth rename fails
struct FailNthRenameFs {
    remaining: Cell<usize>,
}

impl Filesystem for FailNthRenameFs {
    fn exists(&self, path: &Path) -> bool {
        HostFs.exists(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        HostFs.is_dir(path)
    }
    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        let remaining = self.remaining.get();
        self.remaining.set(remaining.saturating_sub(1));
        if remaining == 1 {
            return Err(ForgeError::filesystem(
                "move",
                src,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        HostFs.rename(src, dst)
    }
    fn remove(&self, path: &Path) -> Result<()> {
        HostFs.remove(path)
    }
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        HostFs.write(path, contents)
    }
    fn read_to_string(&self, path: &Path) -> Result<String> {
        HostFs.read_to_string(path)
    }
    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        HostFs.copy(src, dst)
    }
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        HostFs.create_dir_all(path)
    }
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode(path, mode)
    }
    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()> {
        HostFs.set_mode_recursive(path, mode)
    }
}

// =============================================================================
// Commit Path
// =============================================================================

#[test]
fn test_clean_host_creates_no_backup_files() {
    let fx = Fixture::new();
    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());

    installer.run(|| Ok(())).unwrap();

    assert_eq!(installer.stage(), InstallStage::Committed);
    for path in fx.candidates() {
        assert!(!path.exists());
        assert!(!Fixture::backup_of(&path).exists());
    }
}

#[test]
fn test_success_discards_backups() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "old etc").unwrap();
    fs::write(fx.home_conf(), "old home").unwrap();

    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());
    installer
        .run(|| {
            // the procedure sees the collision-free layout
            assert!(!fx.etc_conf().exists());
            assert!(!fx.home_conf().exists());
            fs::write(fx.etc_conf(), "fresh").unwrap();
            Ok(())
        })
        .unwrap();

    assert_eq!(fs::read_to_string(fx.etc_conf()).unwrap(), "fresh");
    assert!(!fx.home_conf().exists());
    assert!(!Fixture::backup_of(&fx.etc_conf()).exists());
    assert!(!Fixture::backup_of(&fx.home_conf()).exists());
    assert_eq!(
        installer.context().history(),
        &[
            InstallStage::BackedUp,
            InstallStage::Installing,
            InstallStage::Committed
        ]
    );
}

// =============================================================================
// Rollback Path
// =============================================================================

#[test]
fn test_external_tool_failure_restores_collision() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "user pear settings").unwrap();

    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());
    let err = installer
        .run(|| -> Result<()> { Err(ForgeError::external_tool("make", 2, "error: boom")) })
        .unwrap_err();

    match err {
        ForgeError::ExternalTool { step, code, stderr } => {
            assert_eq!(step, "make");
            assert_eq!(code, 2);
            assert_eq!(stderr, "error: boom");
        }
        other => panic!("expected ExternalTool, got {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(fx.etc_conf()).unwrap(),
        "user pear settings"
    );
    assert!(!Fixture::backup_of(&fx.etc_conf()).exists());
    assert!(installer.context().is_rolled_back());
}

#[test]
fn test_partial_collision_restores_only_existing_file() {
    let fx = Fixture::new();
    fs::write(fx.home_conf(), "home only").unwrap();

    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());
    let _ = installer.run(|| -> Result<()> { Err(ForgeError::patch("Makefile: no match")) });

    assert_eq!(fs::read_to_string(fx.home_conf()).unwrap(), "home only");
    assert!(!fx.etc_conf().exists());
    assert!(!Fixture::backup_of(&fx.etc_conf()).exists());
}

#[test]
fn test_restore_failure_surfaces_both_errors() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "user pear settings").unwrap();

    let mut installer = GuardedInstaller::new(&NoRestoreFs, fx.candidates());
    let err = installer
        .run(|| -> Result<()> { Err(ForgeError::external_tool("make install", 1, "denied")) })
        .unwrap_err();

    match &err {
        ForgeError::RollbackIncomplete { original, restore } => {
            assert!(matches!(**original, ForgeError::ExternalTool { code: 1, .. }));
            assert!(matches!(**restore, ForgeError::Filesystem { .. }));
        }
        other => panic!("expected RollbackIncomplete, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("make install failed"));
    assert!(msg.contains("rollback incomplete"));

    // the backup is still where the user can recover it
    assert!(Fixture::backup_of(&fx.etc_conf()).exists());
    assert_eq!(installer.stage(), InstallStage::RolledBack);
}

#[test]
fn test_backup_failure_midway_restores_moved_files() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "etc").unwrap();
    fs::write(fx.home_conf(), "home").unwrap();

    // first rename (etc) succeeds, second (home) fails
    let failing = FailNthRenameFs {
        remaining: Cell::new(2),
    };
    let mut installer = GuardedInstaller::new(&failing, fx.candidates());
    let ran = Cell::new(false);
    let err = installer
        .run(|| {
            ran.set(true);
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, ForgeError::Filesystem { .. }));
    assert!(!ran.get());
    assert_eq!(fs::read_to_string(fx.etc_conf()).unwrap(), "etc");
    assert_eq!(fs::read_to_string(fx.home_conf()).unwrap(), "home");
    assert_eq!(installer.stage(), InstallStage::RolledBack);
    assert_eq!(
        installer.context().rolled_back_from(),
        Some(InstallStage::Idle)
    );
}

#[test]
fn test_panic_during_install_restores_backups() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "survives panics").unwrap();

    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        installer.run(|| -> Result<()> { panic!("build script crashed") })
    }));

    assert!(result.is_err());
    assert_eq!(
        fs::read_to_string(fx.etc_conf()).unwrap(),
        "survives panics"
    );
    assert!(!Fixture::backup_of(&fx.etc_conf()).exists());
    assert_eq!(installer.stage(), InstallStage::RolledBack);
    assert_eq!(
        installer.context().rolled_back_from(),
        Some(InstallStage::Installing)
    );
}

#[test]
fn test_panic_payload_reaches_caller() {
    let fx = Fixture::new();
    let mut installer = GuardedInstaller::new(&HostFs, fx.candidates());

    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        installer.run(|| -> Result<()> { panic!("configure segfaulted") })
    }))
    .unwrap_err();

    assert_eq!(
        payload.downcast_ref::<&str>().copied(),
        Some("configure segfaulted")
    );
    assert!(installer.context().is_rolled_back());
}

// =============================================================================
// Leftover Backups
// =============================================================================

#[test]
fn test_discard_failure_after_success_still_commits() {
    let fx = Fixture::new();
    fs::write(fx.etc_conf(), "old etc").unwrap();

    let mut installer = GuardedInstaller::new(&NoDiscardFs, fx.candidates());
    let err = installer
        .run(|| {
            fs::write(fx.etc_conf(), "fresh").unwrap();
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, ForgeError::Filesystem { .. }));
    assert_eq!(installer.stage(), InstallStage::Committed);
    assert_eq!(fs::read_to_string(fx.etc_conf()).unwrap(), "fresh");
    assert_eq!(
        fs::read_to_string(Fixture::backup_of(&fx.etc_conf())).unwrap(),
        "old etc"
    );
}
