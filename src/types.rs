//! Type-safe build option types
//!
//! Feature flags are a closed enum rather than raw strings, so a typo in a
//! flag is a parse error instead of a silently ignored option.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// A requested optional capability.
///
/// Variant order is the declaration order used wherever flags are iterated,
/// so sets of flags always come out in the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FeatureFlag {
    WithLibmysql,
    WithMariadb,
    WithMysql,
    WithPgsql,
    WithMssql,
    WithUnixodbc,
    WithCgi,
    WithFpm,
    WithoutApache,
    WithIntl,
    WithImap,
    WithGmp,
    WithSuhosin,
    WithTidy,
    WithoutPear,
    WithHomebrewOpenssl,
}

impl FeatureFlag {
    /// Parse a command-line style flag. Accepts `--with-fpm` and `with-fpm`.
    pub fn parse_arg(arg: &str) -> crate::error::Result<Self> {
        let name = arg.trim().trim_start_matches("--");
        Self::from_str(name)
            .map_err(|_| crate::error::ForgeError::validation(format!("Unknown option: {}", arg)))
    }

    /// Returns the help text shown by `php53-forge options`
    pub const fn description(self) -> &'static str {
        match self {
            Self::WithLibmysql => "Include (old-style) libmysql support",
            Self::WithMariadb => "Include MariaDB support",
            Self::WithMysql => "Include MySQL support",
            Self::WithPgsql => "Include PostgreSQL support",
            Self::WithMssql => "Include MSSQL-DB support",
            Self::WithUnixodbc => "Include unixODBC support",
            Self::WithCgi => "Enable building of the CGI executable (implies --without-apache)",
            Self::WithFpm => {
                "Enable building of the fpm SAPI executable (implies --without-apache)"
            }
            Self::WithoutApache => "Build without shared Apache 2.0 Handler module",
            Self::WithIntl => "Include internationalization support",
            Self::WithImap => "Include IMAP extension",
            Self::WithGmp => "Include GMP support",
            Self::WithSuhosin => "Include Suhosin patch",
            Self::WithTidy => "Include Tidy support",
            Self::WithoutPear => "Build without PEAR",
            Self::WithHomebrewOpenssl => "Include OpenSSL support via Homebrew",
        }
    }

    /// All flags in declaration order
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

/// A named mutual-exclusion constraint over feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictRule {
    /// Human-readable group name used in error messages
    pub group: &'static str,
    pub members: &'static [FeatureFlag],
}

/// Declared conflict groups. At most one member of each may be requested.
pub const CONFLICT_RULES: &[ConflictRule] = &[
    ConflictRule {
        group: "MySQL variant",
        members: &[
            FeatureFlag::WithLibmysql,
            FeatureFlag::WithMariadb,
            FeatureFlag::WithMysql,
        ],
    },
    ConflictRule {
        group: "executable",
        members: &[FeatureFlag::WithCgi, FeatureFlag::WithFpm],
    },
];

/// One configuration token passed to `./configure`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildArgument {
    /// Option name without the leading dashes (e.g. `with-openssl`)
    pub key: String,
    pub value: Option<String>,
}

impl BuildArgument {
    /// A bare switch such as `--enable-fpm`
    pub fn switch(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// A keyed option such as `--with-openssl=/usr`
    pub fn with_value(key: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            value: Some(value.to_string()),
        }
    }
}

impl fmt::Display for BuildArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "--{}={}", self.key, value),
            None => write!(f, "--{}", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_display_is_kebab_case() {
        assert_eq!(FeatureFlag::WithFpm.to_string(), "with-fpm");
        assert_eq!(FeatureFlag::WithoutApache.to_string(), "without-apache");
        assert_eq!(
            FeatureFlag::WithHomebrewOpenssl.to_string(),
            "with-homebrew-openssl"
        );
    }

    #[test]
    fn test_parse_arg_accepts_dashes() {
        assert_eq!(
            FeatureFlag::parse_arg("--with-mysql").unwrap(),
            FeatureFlag::WithMysql
        );
        assert_eq!(
            FeatureFlag::parse_arg("with-unixodbc").unwrap(),
            FeatureFlag::WithUnixodbc
        );
    }

    #[test]
    fn test_parse_arg_rejects_unknown() {
        let err = FeatureFlag::parse_arg("--with-oracle").unwrap_err();
        assert!(err.to_string().contains("Unknown option: --with-oracle"));
    }

    #[test]
    fn test_serde_uses_flag_names() {
        let json = serde_json::to_string(&FeatureFlag::WithIntl).unwrap();
        assert_eq!(json, "\"with-intl\"");
        let back: FeatureFlag = serde_json::from_str("\"without-pear\"").unwrap();
        assert_eq!(back, FeatureFlag::WithoutPear);
    }

    #[test]
    fn test_every_flag_has_description() {
        for flag in FeatureFlag::all() {
            assert!(!flag.description().is_empty(), "{} has no description", flag);
        }
        assert_eq!(FeatureFlag::all().len(), 16);
    }

    #[test]
    fn test_conflict_groups_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for rule in CONFLICT_RULES {
            for member in rule.members {
                assert!(seen.insert(*member), "{} in two groups", member);
            }
        }
    }

    #[test]
    fn test_build_argument_display() {
        assert_eq!(BuildArgument::switch("enable-fpm").to_string(), "--enable-fpm");
        assert_eq!(
            BuildArgument::with_value("with-openssl", "/usr").to_string(),
            "--with-openssl=/usr"
        );
    }
}
