//! Install layout
//!
//! Every path the recipe writes to or passes to `./configure` is derived
//! from three roots: the keg prefix, the shared root holding `etc/`, `var/`
//! and `opt/`, and the user's home directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// PHP minor series this recipe builds; names the config directory
pub const PHP_SERIES: &str = "5.3";

/// Resolved filesystem layout for one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLayout {
    /// Keg prefix, e.g. `/usr/local/Cellar/php53/5.3.15`
    pub prefix: PathBuf,
    /// Shared root, e.g. `/usr/local`
    pub root: PathBuf,
    pub home: PathBuf,
}

impl InstallLayout {
    pub fn new(
        prefix: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            root: root.into(),
            home: home.into(),
        }
    }

    pub fn bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn sbin(&self) -> PathBuf {
        self.prefix.join("sbin")
    }

    pub fn lib(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    pub fn libexec(&self) -> PathBuf {
        self.prefix.join("libexec")
    }

    pub fn man(&self) -> PathBuf {
        self.prefix.join("share").join("man")
    }

    pub fn etc(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn var(&self) -> PathBuf {
        self.root.join("var")
    }

    /// `etc/php/5.3`: php.ini, pear.conf, php-fpm.conf live here
    pub fn config_path(&self) -> PathBuf {
        self.etc().join("php").join(PHP_SERIES)
    }

    /// Install prefix of another formula, e.g. `opt/openssl`
    pub fn dependency_prefix(&self, name: &str) -> PathBuf {
        self.root.join("opt").join(name)
    }

    /// pear.conf locations that confuse `./configure` if present
    pub fn pear_conf_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.config_path().join("pear.conf"),
            self.home.join("pear.conf"),
        ]
    }

    /// Keg-local php-fpm log file
    pub fn fpm_log(&self) -> PathBuf {
        self.prefix.join("var").join("log").join("php-fpm.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> InstallLayout {
        InstallLayout::new("/usr/local/Cellar/php53/5.3.15", "/usr/local", "/Users/dev")
    }

    #[test]
    fn test_config_path() {
        assert_eq!(
            layout().config_path(),
            PathBuf::from("/usr/local/etc/php/5.3")
        );
    }

    #[test]
    fn test_dependency_prefix() {
        assert_eq!(
            layout().dependency_prefix("icu4c"),
            PathBuf::from("/usr/local/opt/icu4c")
        );
    }

    #[test]
    fn test_pear_conf_candidates() {
        let candidates = layout().pear_conf_candidates();
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/usr/local/etc/php/5.3/pear.conf"),
                PathBuf::from("/Users/dev/pear.conf"),
            ]
        );
    }

    #[test]
    fn test_keg_paths() {
        let layout = layout();
        assert_eq!(layout.sbin(), PathBuf::from("/usr/local/Cellar/php53/5.3.15/sbin"));
        assert_eq!(
            layout.man(),
            PathBuf::from("/usr/local/Cellar/php53/5.3.15/share/man")
        );
        assert_eq!(
            layout.fpm_log(),
            PathBuf::from("/usr/local/Cellar/php53/5.3.15/var/log/php-fpm.log")
        );
    }
}
