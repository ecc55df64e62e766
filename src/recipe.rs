//! PHP 5.3 build recipe
//!
//! Drives one source build from a resolved `BuildPlan`: patch, configure,
//! fix up the generated Makefile, make, install, then lay down default
//! configuration. `install` wraps the whole build in a `GuardedInstaller`
//! so stray `pear.conf` files are moved aside and restored on failure.

use crate::error::{ForgeError, Result};
use crate::fs_ops::Filesystem;
use crate::installer::GuardedInstaller;
use crate::layout::InstallLayout;
use crate::logic::plan::BuildPlan;
use crate::patching::{LineRule, append_make_var, replace_literal, substitute_lines};
use crate::runner::{Invocation, ToolRunner};
use crate::types::FeatureFlag;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Apache module install rule written by `./configure`
const APXS_INSTALL_IT: &str = "INSTALL_IT = $(mkinstalldirs) '$(INSTALL_ROOT)/usr/libexec/apache2' && $(mkinstalldirs) '$(INSTALL_ROOT)/private/etc/apache2' && /usr/sbin/apxs -S LIBEXECDIR='$(INSTALL_ROOT)/usr/libexec/apache2' -S SYSCONFDIR='$(INSTALL_ROOT)/private/etc/apache2' -i -a -n php5 libs/libphp5.so";

/// Mode applied to the PEAR tree so `pear install` works without sudo
const PEAR_TREE_MODE: u32 = 0o775;

pub struct Php53Recipe<'a> {
    plan: &'a BuildPlan,
    layout: &'a InstallLayout,
    source_dir: PathBuf,
    patches_dir: Option<PathBuf>,
    runner: &'a dyn ToolRunner,
    fs: &'a dyn Filesystem,
    dry_run: bool,
}

impl<'a> Php53Recipe<'a> {
    pub fn new(
        plan: &'a BuildPlan,
        layout: &'a InstallLayout,
        source_dir: impl Into<PathBuf>,
        runner: &'a dyn ToolRunner,
        fs: &'a dyn Filesystem,
    ) -> Self {
        Self {
            plan,
            layout,
            source_dir: source_dir.into(),
            patches_dir: None,
            runner,
            fs,
            dry_run: false,
        }
    }

    /// Directory holding downloaded source patches
    pub fn patches_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.patches_dir = dir;
        self
    }

    /// Skip edits of files that only exist after a real build step
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the full build inside a guarded install.
    pub fn install(&self) -> Result<()> {
        self.check_inputs()?;

        let mut installer = GuardedInstaller::new(self.fs, self.layout.pear_conf_candidates());
        installer.run(|| self.build())?;

        info!("PHP {} installed to {}", crate::layout::PHP_SERIES, self.layout.prefix.display());
        Ok(())
    }

    /// Every build step in order. Callers normally want `install`.
    pub fn build(&self) -> Result<()> {
        self.apply_patches()?;
        self.configure()?;
        self.patch_makefile()?;
        self.make()?;
        self.install_php_ini()?;
        self.fix_pear_permissions()?;
        self.configure_pear()?;
        self.install_fpm_config()?;
        Ok(())
    }

    /// Fail before touching anything if the source tree or a patch is missing
    fn check_inputs(&self) -> Result<()> {
        if !self.fs.is_dir(&self.source_dir) {
            return Err(ForgeError::validation(format!(
                "Source directory not found: {}",
                self.source_dir.display()
            )));
        }
        for patch in &self.plan.patches {
            let path = self.patch_path(patch.file_name)?;
            if !self.fs.exists(&path) {
                return Err(ForgeError::validation(format!(
                    "Patch {} not found (download it from {})",
                    path.display(),
                    patch.url
                )));
            }
        }
        Ok(())
    }

    fn patch_path(&self, file_name: &str) -> Result<PathBuf> {
        self.patches_dir
            .as_ref()
            .map(|dir| dir.join(file_name))
            .ok_or_else(|| ForgeError::config("a patches directory is required for source patches"))
    }

    fn in_source(&self, program: &str) -> Invocation {
        Invocation::new(program).dir(&self.source_dir)
    }

    fn fpm_conf(&self) -> PathBuf {
        self.layout.config_path().join("php-fpm.conf")
    }

    fn php_ini(&self) -> PathBuf {
        self.layout.config_path().join("php.ini")
    }

    /// Read, transform and write back a file produced by an earlier step
    fn edit_file<F>(&self, path: &Path, edit: F) -> Result<()>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        if self.dry_run {
            info!("[DRY RUN] Would patch {}", path.display());
            return Ok(());
        }
        let text = self.fs.read_to_string(path)?;
        let patched = edit(&text)?;
        self.fs.write(path, patched.as_bytes())
    }

    fn apply_patches(&self) -> Result<()> {
        for patch in &self.plan.patches {
            let path = self.patch_path(patch.file_name)?;
            info!("Applying {}", patch.file_name);
            self.runner
                .run_checked(&self.in_source("patch").arg("-p1").arg("-i").arg_path(&path))?;
        }
        Ok(())
    }

    fn configure(&self) -> Result<()> {
        let args = self.plan.configure_args();
        debug!("configure arguments: {}", args.join(" "));
        self.runner
            .run_checked(&self.in_source("./configure").args(&args))
    }

    fn patch_makefile(&self) -> Result<()> {
        let makefile = self.source_dir.join("Makefile");

        if !self.plan.has(FeatureFlag::WithoutApache) {
            let module_dir = self.layout.libexec().join("apache2");
            let module_dir = module_dir.display();
            let install_it = format!(
                "INSTALL_IT = $(mkinstalldirs) '{module_dir}' && $(mkinstalldirs) '$(INSTALL_ROOT)/private/etc/apache2' && /usr/sbin/apxs -S LIBEXECDIR='{module_dir}' -S SYSCONFDIR='$(INSTALL_ROOT)/private/etc/apache2' -i -a -n php5 libs/libphp5.so"
            );
            self.edit_file(&makefile, |text| {
                replace_literal(text, APXS_INSTALL_IT, &install_it, "Makefile")
            })?;
        }

        if self.plan.has(FeatureFlag::WithIntl) {
            self.edit_file(&makefile, |text| {
                append_make_var(text, "EXTRA_LIBS", "-lstdc++", "Makefile")
            })?;
        }
        Ok(())
    }

    fn make(&self) -> Result<()> {
        self.runner.run_checked(&self.in_source("make"))?;
        // parallel install is unreliable
        self.runner
            .run_checked(&self.in_source("make").arg("install").env("MAKEFLAGS", "-j1"))
    }

    fn install_php_ini(&self) -> Result<()> {
        let php_ini = self.php_ini();
        if self.fs.exists(&php_ini) {
            info!("Keeping existing {}", php_ini.display());
            return Ok(());
        }
        self.fs.create_dir_all(&self.layout.config_path())?;
        self.fs
            .copy(&self.source_dir.join("php.ini-development"), &php_ini)
    }

    fn fix_pear_permissions(&self) -> Result<()> {
        let tree = self.layout.lib().join("php");
        if !self.fs.exists(&tree) && !self.dry_run {
            debug!("{} not installed, skipping chmod", tree.display());
            return Ok(());
        }
        self.fs.set_mode_recursive(&tree, PEAR_TREE_MODE)
    }

    fn configure_pear(&self) -> Result<()> {
        if self.plan.has(FeatureFlag::WithoutPear) {
            return Ok(());
        }
        let pear = self.layout.bin().join("pear");
        self.runner.run_checked(
            &Invocation::new(pear.to_string_lossy())
                .args(["config-set", "php_ini"])
                .arg_path(&self.php_ini()),
        )
    }

    fn install_fpm_config(&self) -> Result<()> {
        if !self.plan.has(FeatureFlag::WithFpm) {
            return Ok(());
        }

        let log = self.layout.fpm_log();
        if let Some(log_dir) = log.parent() {
            self.fs.create_dir_all(log_dir)?;
        }
        if !self.fs.exists(&log) {
            self.fs.write(&log, b"")?;
        }

        let conf = self.fpm_conf();
        if self.fs.exists(&conf) {
            info!("Keeping existing {}", conf.display());
            return Ok(());
        }

        self.fs.create_dir_all(&self.layout.config_path())?;
        self.fs
            .copy(&self.source_dir.join("sapi/fpm/php-fpm.conf"), &conf)?;
        let rules = fpm_rules(self.layout)?;
        self.edit_file(&conf, |text| substitute_lines(text, &rules, "php-fpm.conf"))
    }
}

/// Check an installed build. With php-fpm, its config must parse.
pub fn verify(plan: &BuildPlan, layout: &InstallLayout, runner: &dyn ToolRunner) -> Result<()> {
    if !plan.has(FeatureFlag::WithFpm) {
        info!("Nothing to verify without --with-fpm");
        return Ok(());
    }
    let php_fpm = layout.sbin().join("php-fpm");
    let conf = layout.config_path().join("php-fpm.conf");
    runner.run_checked(
        &Invocation::new(php_fpm.to_string_lossy())
            .arg("-y")
            .arg_path(&conf)
            .arg("-t"),
    )
}

/// Line substitutions applied to the stock php-fpm.conf
pub fn fpm_rules(layout: &InstallLayout) -> Result<Vec<LineRule>> {
    let include = format!(";include={}/fpm.d/*.conf", layout.config_path().display());
    Ok(vec![
        LineRule::new(r"^;?daemonize\s*=.+$", "daemonize = no")?,
        LineRule::new(r"^;include\s*=.+$", include)?,
        LineRule::new(r"^;?pm\.max_children\s*=.+$", "pm.max_children = 10")?,
        LineRule::new(r"^;?pm\.start_servers\s*=.+$", "pm.start_servers = 3")?,
        LineRule::new(r"^;?pm\.min_spare_servers\s*=.+$", "pm.min_spare_servers = 2")?,
        LineRule::new(r"^;?pm\.max_spare_servers\s*=.+$", "pm.max_spare_servers = 5")?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fpm_rules_rewrite_stock_config() {
        let layout = InstallLayout::new("/usr/local/Cellar/php53/5.3.15", "/usr/local", "/home/u");
        let stock = "\
[global]
;daemonize = yes
;include=etc/fpm.d/*.conf
[www]
pm.max_children = 50
;pm.start_servers = 20
;pm.min_spare_servers = 5
;pm.max_spare_servers = 35
";
        let out = substitute_lines(stock, &fpm_rules(&layout).unwrap(), "php-fpm.conf").unwrap();
        assert_eq!(
            out,
            "\
[global]
daemonize = no
;include=/usr/local/etc/php/5.3/fpm.d/*.conf
[www]
pm.max_children = 10
pm.start_servers = 3
pm.min_spare_servers = 2
pm.max_spare_servers = 5
"
        );
    }

    #[test]
    fn test_apxs_rule_targets_system_libexec() {
        assert!(APXS_INSTALL_IT.starts_with("INSTALL_IT = "));
        assert!(APXS_INSTALL_IT.contains("'$(INSTALL_ROOT)/usr/libexec/apache2'"));
    }
}
