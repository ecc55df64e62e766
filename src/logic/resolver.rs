//! Option Resolver
//!
//! Translates a build request into the ordered argument list for
//! `./configure`.
//!
//! # Design
//!
//! - **Validate first**: conflict groups are checked before anything is assembled
//! - **Implications before assembly**: `--with-cgi`/`--with-fpm` imply `--without-apache`
//! - **Deterministic**: sections are appended in a fixed order, so the same
//!   request always yields the same list in the same order
//! - **Pure logic**: no I/O. Host lookups arrive pre-computed in `HostFacts`
//!
//! # Assembly Order
//!
//! | Section            | Contributes |
//! |--------------------|-------------|
//! | baseline           | prefix, config paths, always-on extensions |
//! | OpenSSL            | keg OpenSSL or `/usr` |
//! | execution mode     | FPM or CGI SAPI |
//! | Apache             | apxs2 module unless `--without-apache` |
//! | extensions         | gmp, imap, intl, mssql |
//! | MySQL              | libmysql client or mysqlnd |
//! | PostgreSQL         | keg or `pg_config` paths |
//! | tidy               | keg path |
//! | ODBC               | unixODBC or iODBC |
//! | PEAR               | `--without-pear` |
//!
//! Later arguments win inside `./configure`, so the order is part of the contract.

use crate::error::{ForgeError, Result};
use crate::layout::InstallLayout;
use crate::probe::{HostFacts, PostgresLocation};
use crate::request::BuildRequest;
use crate::types::{BuildArgument, FeatureFlag};

/// Account php-fpm workers run as
pub const FPM_USER: &str = "_www";
pub const FPM_GROUP: &str = "_www";

/// Unix socket the MySQL server listens on
pub const MYSQL_SOCKET: &str = "/tmp/mysql.sock";

/// Resolve the `./configure` arguments for a request.
///
/// # Errors
///
/// - `Conflict` if the request holds two members of a conflict group. Nothing
///   is assembled in that case.
/// - `MissingTool` if `--with-pgsql` is requested and the host has neither a
///   PostgreSQL keg nor `pg_config`.
pub fn resolve_build_args(
    request: &BuildRequest,
    layout: &InstallLayout,
    host: &HostFacts,
) -> Result<Vec<BuildArgument>> {
    request.check_conflicts()?;
    let request = request.with_implied_flags();

    let mut args = baseline_args(layout);

    // 1. OpenSSL
    if request.contains(FeatureFlag::WithHomebrewOpenssl) {
        args.push(BuildArgument::with_value(
            "with-openssl",
            layout.dependency_prefix("openssl").display(),
        ));
    } else {
        args.push(BuildArgument::with_value("with-openssl", "/usr"));
    }

    // 2. Execution mode. Conflict check guarantees at most one.
    if request.contains(FeatureFlag::WithFpm) {
        args.push(BuildArgument::switch("enable-fpm"));
        args.push(BuildArgument::with_value("with-fpm-user", FPM_USER));
        args.push(BuildArgument::with_value("with-fpm-group", FPM_GROUP));
    } else if request.contains(FeatureFlag::WithCgi) {
        args.push(BuildArgument::switch("enable-cgi"));
    }

    // 3. Apache module is built by default
    if !request.contains(FeatureFlag::WithoutApache) {
        args.push(BuildArgument::with_value("with-apxs2", "/usr/sbin/apxs"));
        args.push(BuildArgument::with_value(
            "libexecdir",
            layout.libexec().display(),
        ));
    }

    // 4. Extensions backed by a keg
    if request.contains(FeatureFlag::WithGmp) {
        args.push(BuildArgument::with_value(
            "with-gmp",
            layout.dependency_prefix("gmp").display(),
        ));
    }

    if request.contains(FeatureFlag::WithImap) {
        args.push(BuildArgument::with_value(
            "with-imap",
            layout.dependency_prefix("imap-uw").display(),
        ));
        args.push(BuildArgument::with_value("with-imap-ssl", "/usr"));
    }

    if request.contains(FeatureFlag::WithIntl) {
        args.push(BuildArgument::switch("enable-intl"));
        args.push(BuildArgument::with_value(
            "with-icu-dir",
            layout.dependency_prefix("icu4c").display(),
        ));
    }

    if request.contains(FeatureFlag::WithMssql) {
        let freetds = layout.dependency_prefix("freetds");
        args.push(BuildArgument::with_value("with-mssql", freetds.display()));
        args.push(BuildArgument::with_value("with-pdo-dblib", freetds.display()));
    }

    // 5. MySQL
    if request.contains(FeatureFlag::WithLibmysql) {
        args.push(BuildArgument::with_value("with-mysql-sock", MYSQL_SOCKET));
        args.push(BuildArgument::with_value(
            "with-mysqli",
            layout.root.join("bin").join("mysql_config").display(),
        ));
        args.push(BuildArgument::with_value("with-mysql", layout.root.display()));
        args.push(BuildArgument::with_value(
            "with-pdo-mysql",
            layout.root.display(),
        ));
    }

    if request.contains(FeatureFlag::WithMysql) || request.contains(FeatureFlag::WithMariadb) {
        args.push(BuildArgument::with_value("with-mysql-sock", MYSQL_SOCKET));
        args.push(BuildArgument::with_value("with-mysqli", "mysqlnd"));
        args.push(BuildArgument::with_value("with-mysql", "mysqlnd"));
        args.push(BuildArgument::with_value("with-pdo-mysql", "mysqlnd"));
    }

    // 6. PostgreSQL
    if request.contains(FeatureFlag::WithPgsql) {
        match &host.postgres {
            Some(PostgresLocation::Keg(prefix)) => {
                args.push(BuildArgument::with_value("with-pgsql", prefix.display()));
                args.push(BuildArgument::with_value("with-pdo-pgsql", prefix.display()));
            }
            Some(PostgresLocation::PgConfig {
                include_dir,
                pg_config,
            }) => {
                args.push(BuildArgument::with_value("with-pgsql", include_dir.display()));
                args.push(BuildArgument::with_value(
                    "with-pdo-pgsql",
                    pg_config.display(),
                ));
            }
            None => {
                return Err(ForgeError::MissingTool {
                    tool: "pg_config",
                    feature: FeatureFlag::WithPgsql,
                });
            }
        }
    }

    // 7. Tidy
    if request.contains(FeatureFlag::WithTidy) {
        args.push(BuildArgument::with_value(
            "with-tidy",
            layout.dependency_prefix("tidy").display(),
        ));
    }

    // 8. ODBC: unixODBC on request, the system iODBC otherwise
    if request.contains(FeatureFlag::WithUnixodbc) {
        let unixodbc = layout.dependency_prefix("unixodbc");
        args.push(BuildArgument::with_value("with-unixODBC", unixodbc.display()));
        args.push(BuildArgument::with_value(
            "with-pdo-odbc",
            format!("unixODBC,{}", unixodbc.display()),
        ));
    } else {
        args.push(BuildArgument::switch("with-iodbc"));
        args.push(BuildArgument::with_value("with-pdo-odbc", "generic,/usr,iodbc"));
    }

    // 9. PEAR
    if request.contains(FeatureFlag::WithoutPear) {
        args.push(BuildArgument::switch("without-pear"));
    }

    Ok(args)
}

/// Render arguments the way they are handed to `./configure`
pub fn render_args(args: &[BuildArgument]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

/// Arguments every build gets, in order
fn baseline_args(layout: &InstallLayout) -> Vec<BuildArgument> {
    let config_path = layout.config_path();
    let opt = |name: &str| layout.dependency_prefix(name).display().to_string();

    let mut args = vec![
        BuildArgument::with_value("prefix", layout.prefix.display()),
        BuildArgument::switch("disable-debug"),
        BuildArgument::with_value("localstatedir", layout.var().display()),
        BuildArgument::with_value("sysconfdir", config_path.display()),
        BuildArgument::with_value("with-config-file-path", config_path.display()),
        BuildArgument::with_value(
            "with-config-file-scan-dir",
            config_path.join("conf.d").display(),
        ),
        BuildArgument::with_value("with-iconv-dir", "/usr"),
        BuildArgument::switch("enable-dba"),
        BuildArgument::with_value("with-ndbm", "/usr"),
    ];

    args.extend(
        [
            "enable-exif",
            "enable-soap",
            "enable-sqlite-utf8",
            "enable-wddx",
            "enable-ftp",
            "enable-sockets",
            "enable-zip",
            "enable-pcntl",
            "enable-shmop",
            "enable-sysvsem",
            "enable-sysvshm",
            "enable-sysvmsg",
            "enable-mbstring",
            "enable-mbregex",
            "enable-zend-multibyte",
            "enable-bcmath",
            "enable-calendar",
        ]
        .into_iter()
        .map(BuildArgument::switch),
    );

    args.extend([
        BuildArgument::with_value("with-zlib", opt("zlib")),
        BuildArgument::with_value("with-bz2", "/usr"),
        BuildArgument::switch("with-ldap"),
        BuildArgument::with_value("with-ldap-sasl", "/usr"),
        BuildArgument::switch("with-xmlrpc"),
        BuildArgument::with_value("with-kerberos", "/usr"),
        BuildArgument::with_value("with-libxml-dir", opt("libxml2")),
        BuildArgument::with_value("with-xsl", "/usr"),
        BuildArgument::with_value("with-curl", "/usr"),
        BuildArgument::switch("with-gd"),
        BuildArgument::switch("enable-gd-native-ttf"),
        BuildArgument::with_value("with-freetype-dir", "/usr/X11"),
        BuildArgument::with_value("with-mcrypt", opt("mcrypt")),
        BuildArgument::with_value("with-jpeg-dir", opt("jpeg")),
        BuildArgument::with_value("with-png-dir", "/usr/X11"),
        BuildArgument::with_value("with-gettext", opt("gettext")),
        BuildArgument::with_value("with-snmp", "/usr"),
        BuildArgument::switch("with-mhash"),
        BuildArgument::switch("with-libedit"),
        BuildArgument::with_value("mandir", layout.man().display()),
    ]);

    args
}

// ============================================================================
// Tests
// ============================================================================
