//! Build plans
//!
//! A `BuildPlan` is everything decided before the first build step runs:
//! the expanded request, dependencies, configure arguments and source
//! patches. `prepare` is the only entry point that probes the host, and it
//! does so only after the request has passed conflict validation.

use crate::error::Result;
use crate::fs_ops::Filesystem;
use crate::layout::InstallLayout;
use crate::logic::dependencies::{Dependency, resolve_dependencies};
use crate::logic::resolver::{render_args, resolve_build_args};
use crate::probe::{HostFacts, ToolLocator, detect_host};
use crate::request::BuildRequest;
use crate::runner::ToolRunner;
use crate::types::{BuildArgument, FeatureFlag};
use serde::Serialize;
use tracing::debug;

/// Source patch applied before `./configure`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePatch {
    pub url: &'static str,
    /// File name expected in the local patches directory
    pub file_name: &'static str,
}

pub const SUHOSIN_PATCH: SourcePatch = SourcePatch {
    url: "http://download.suhosin.org/suhosin-patch-5.3.9-0.9.10.patch.gz",
    file_name: "suhosin-patch-5.3.9-0.9.10.patch",
};

/// Resolved plan for one build
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Request after implied flags were applied
    pub request: BuildRequest,
    pub host: HostFacts,
    pub dependencies: Vec<Dependency>,
    pub arguments: Vec<BuildArgument>,
    pub patches: Vec<SourcePatch>,
}

impl BuildPlan {
    /// Resolve a plan from already-probed host facts. Pure.
    pub fn resolve(
        request: &BuildRequest,
        layout: &InstallLayout,
        host: HostFacts,
    ) -> Result<Self> {
        request.check_conflicts()?;
        let expanded = request.with_implied_flags();

        let arguments = resolve_build_args(&expanded, layout, &host)?;
        let dependencies = resolve_dependencies(&expanded, &host);
        let patches = source_patches(&expanded);

        Ok(Self {
            request: expanded,
            host,
            dependencies,
            arguments,
            patches,
        })
    }

    /// `./configure` arguments as strings
    pub fn configure_args(&self) -> Vec<String> {
        render_args(&self.arguments)
    }

    #[inline]
    pub fn has(&self, flag: FeatureFlag) -> bool {
        self.request.contains(flag)
    }
}

/// Validate `request`, probe the host, and resolve the full plan.
///
/// Conflicts are reported before any environment lookup.
pub fn prepare(
    request: &BuildRequest,
    layout: &InstallLayout,
    locator: &dyn ToolLocator,
    runner: &dyn ToolRunner,
    fs: &dyn Filesystem,
) -> Result<BuildPlan> {
    request.check_conflicts()?;
    let expanded = request.with_implied_flags();
    debug!(
        "Expanded request: {:?}",
        expanded.flags().map(|f| f.to_string()).collect::<Vec<_>>()
    );

    let host = detect_host(&expanded, layout, locator, runner, fs)?;
    BuildPlan::resolve(&expanded, layout, host)
}

fn source_patches(request: &BuildRequest) -> Vec<SourcePatch> {
    let mut patches = Vec::new();
    if request.contains(FeatureFlag::WithSuhosin) {
        patches.push(SUHOSIN_PATCH);
    }
    patches
}
