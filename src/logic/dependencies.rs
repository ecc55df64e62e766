//! Dependency Resolver
//!
//! Maps the request onto the formulae that must be installed before the
//! build starts. The table is static; resolution happens once per plan.

use crate::probe::HostFacts;
use crate::request::BuildRequest;
use crate::types::FeatureFlag;
use serde::{Deserialize, Serialize};
use strum::Display;

/// How strongly a dependency is needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DependencyKind {
    Required,
    Recommended,
}

/// A formula the build depends on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Dependency {
    pub name: &'static str,
    pub kind: DependencyKind,
}

/// Dependencies of every build
pub const BASE_DEPENDENCIES: &[&str] = &["gettext", "jpeg", "libxml2", "mcrypt", "zlib"];

/// Dependencies pulled in by a single feature flag
pub const FEATURE_DEPENDENCIES: &[(FeatureFlag, &str)] = &[
    (FeatureFlag::WithMssql, "freetds"),
    (FeatureFlag::WithGmp, "gmp"),
    (FeatureFlag::WithIntl, "icu4c"),
    (FeatureFlag::WithImap, "imap-uw"),
    (FeatureFlag::WithFpm, "libevent"),
    (FeatureFlag::WithHomebrewOpenssl, "openssl"),
    (FeatureFlag::WithTidy, "tidy"),
    (FeatureFlag::WithUnixodbc, "unixodbc"),
];

/// Resolve the dependency list for a request.
///
/// # Returns
///
/// A deduplicated `Vec<Dependency>` sorted by name.
///
/// PostgreSQL is only *recommended*, and only when `pg_config` is absent:
/// a system PostgreSQL satisfies the build on its own.
pub fn resolve_dependencies(request: &BuildRequest, host: &HostFacts) -> Vec<Dependency> {
    let mut deps: Vec<Dependency> = BASE_DEPENDENCIES
        .iter()
        .map(|&name| Dependency {
            name,
            kind: DependencyKind::Required,
        })
        .collect();

    deps.extend(
        FEATURE_DEPENDENCIES
            .iter()
            .filter(|(flag, _)| request.contains(*flag))
            .map(|&(_, name)| Dependency {
                name,
                kind: DependencyKind::Required,
            }),
    );

    if request.contains(FeatureFlag::WithPgsql) && !host.pg_config_installed {
        deps.push(Dependency {
            name: "postgresql",
            kind: DependencyKind::Recommended,
        });
    }

    deps.sort();
    deps.dedup();
    deps
}
