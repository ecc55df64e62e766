//! Filesystem interface
//!
//! The guarded installer and the recipe touch the disk only through the
//! `Filesystem` trait, so tests can substitute a failing implementation.
//! Errors carry the operation and path that failed.

use crate::error::{ForgeError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Narrow filesystem contract used by the installer
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Move `src` to `dst`, replacing `dst` if it is a file
    fn rename(&self, src: &Path, dst: &Path) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn copy(&self, src: &Path, dst: &Path) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    /// Apply `mode` to `path` and everything below it
    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl Filesystem for HostFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("mv {} {}", src.display(), dst.display());
        fs::rename(src, dst).map_err(|e| ForgeError::filesystem("move", src, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        debug!("rm {}", path.display());
        fs::remove_file(path).map_err(|e| ForgeError::filesystem("remove", path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).map_err(|e| ForgeError::filesystem("write", path, e))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| ForgeError::filesystem("read", path, e))
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::copy(src, dst)
            .map(|_| ())
            .map_err(|e| ForgeError::filesystem("copy", src, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| ForgeError::filesystem("create", path, e))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| ForgeError::filesystem("chmod", path, e))
    }

    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()> {
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                let at = e.path().unwrap_or(path).to_path_buf();
                ForgeError::filesystem("walk", at, e.into())
            })?;
            // symlinks point outside the tree we own
            if entry.path_is_symlink() {
                continue;
            }
            self.set_mode(entry.path(), mode)?;
        }
        Ok(())
    }
}

/// Reads from the host, logs every mutation instead of performing it
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunFs;

impl Filesystem for DryRunFs {
    fn exists(&self, path: &Path) -> bool {
        HostFs.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        HostFs.is_dir(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        info!("[DRY RUN] Would move {} to {}", src.display(), dst.display());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        info!("[DRY RUN] Would remove {}", path.display());
        Ok(())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        info!("[DRY RUN] Would write {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        HostFs.read_to_string(path)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        info!("[DRY RUN] Would copy {} to {}", src.display(), dst.display());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        info!("[DRY RUN] Would create {}", path.display());
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        info!("[DRY RUN] Would chmod {:o} {}", mode, path.display());
        Ok(())
    }

    fn set_mode_recursive(&self, path: &Path, mode: u32) -> Result<()> {
        info!("[DRY RUN] Would chmod -R {:o} {}", mode, path.display());
        Ok(())
    }
}
