//! Immutable build requests
//!
//! A `BuildRequest` is the set of feature flags the caller asked for. It is
//! never mutated after construction: implied-flag expansion returns a new
//! request, and conflict validation only reads.

use crate::error::{ForgeError, Result};
use crate::types::{CONFLICT_RULES, FeatureFlag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of requested feature flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    flags: BTreeSet<FeatureFlag>,
}

impl BuildRequest {
    pub fn new(flags: impl IntoIterator<Item = FeatureFlag>) -> Self {
        Self {
            flags: flags.into_iter().collect(),
        }
    }

    /// Build a request from command-line style strings (`--with-fpm`, `with-gmp`).
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let flags = args
            .into_iter()
            .map(|arg| FeatureFlag::parse_arg(arg.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { flags })
    }

    #[inline]
    pub fn contains(&self, flag: FeatureFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Flags in declaration order
    pub fn flags(&self) -> impl Iterator<Item = FeatureFlag> + '_ {
        self.flags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Returns a new request that also holds `other`'s flags
    pub fn merged(&self, other: &BuildRequest) -> Self {
        Self {
            flags: self.flags.union(&other.flags).copied().collect(),
        }
    }

    /// Reject requests holding more than one member of any conflict group.
    ///
    /// Fails on the first offending group, naming every member present.
    pub fn check_conflicts(&self) -> Result<()> {
        for rule in CONFLICT_RULES {
            let present: Vec<FeatureFlag> = rule
                .members
                .iter()
                .copied()
                .filter(|member| self.contains(*member))
                .collect();

            if present.len() > 1 {
                return Err(ForgeError::Conflict {
                    group: rule.group,
                    flags: present,
                });
            }
        }
        Ok(())
    }

    /// Apply implied flags, returning the expanded request.
    ///
    /// Building a standalone executable (CGI or FPM) disables the Apache
    /// module.
    pub fn with_implied_flags(&self) -> Self {
        let mut flags = self.flags.clone();
        if self.contains(FeatureFlag::WithCgi) || self.contains(FeatureFlag::WithFpm) {
            flags.insert(FeatureFlag::WithoutApache);
        }
        Self { flags }
    }
}

impl FromIterator<FeatureFlag> for BuildRequest {
    fn from_iter<T: IntoIterator<Item = FeatureFlag>>(iter: T) -> Self {
        Self::new(iter)
    }
}
