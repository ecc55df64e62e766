//! Pure build logic
//!
//! Dependency resolution, configure argument assembly and build plans.
//! Nothing in here touches the host except `plan::prepare`, which probes it
//! once through injected interfaces.

pub mod dependencies;
pub mod plan;
pub mod resolver;
