//! Guarded Install State Machine
//!
//! Authoritative record of where a guarded install is. It enforces valid
//! transitions so a run can never end in `BackedUp` or skip the backup step.
//!
//! `InstallContext` is owned by the `GuardedInstaller`; nothing else moves
//! the stage. A bad transition is an error, never a silent no-op.
//!
//! # Stage Flow
//!
//! ```text
//! Idle
//!     ↓
//! BackedUp
//!     ↓
//! Installing
//!     ↓
//! Committed
//!
//! (Any non-terminal stage can transition to RolledBack)
//! ```

use std::fmt;
use thiserror::Error;

/// Guarded install stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallStage {
    /// Nothing has been touched yet
    Idle = 0,

    /// Conflicting files have been moved aside
    BackedUp = 1,

    /// The build procedure is running
    Installing = 2,

    /// Build succeeded, backups discarded (terminal state)
    Committed = 3,

    /// Build failed, backups restored (terminal state)
    RolledBack = 255,
}

impl InstallStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a terminal state (Committed or RolledBack)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Stage reached on success from here; None once terminal
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::BackedUp),
            Self::BackedUp => Some(Self::Installing),
            Self::Installing => Some(Self::Committed),
            Self::Committed | Self::RolledBack => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::BackedUp => "Backed up",
            Self::Installing => "Installing",
            Self::Committed => "Committed",
            Self::RolledBack => "Rolled back",
        }
    }

    /// Returns the forward stages in order (excluding RolledBack)
    pub const fn all_stages() -> &'static [Self] {
        &[Self::Idle, Self::BackedUp, Self::Installing, Self::Committed]
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Rejected stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    /// Target is not the immediate next stage
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: InstallStage,
        to: InstallStage,
    },

    /// Target comes before the current stage
    #[error("Cannot go backwards from {from} to {to} (install is forward-only)")]
    BackwardTransition {
        from: InstallStage,
        to: InstallStage,
    },

    /// Committed and RolledBack are final
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

/// Tracks one guarded install from Idle to a terminal stage.
///
/// # Example
///
/// ```
/// use php53_forge::install_state::{InstallContext, InstallStage};
///
/// let mut ctx = InstallContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), InstallStage::BackedUp);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(InstallStage::Committed).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InstallContext {
    current: InstallStage,

    /// Stage at which the rollback happened (if any)
    rolled_back_from: Option<InstallStage>,

    /// Stages entered, in order
    history: Vec<InstallStage>,
}

impl Default for InstallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallContext {
    pub fn new() -> Self {
        Self {
            current: InstallStage::Idle,
            rolled_back_from: None,
            history: Vec::with_capacity(InstallStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    #[inline]
    pub fn rolled_back_from(&self) -> Option<InstallStage> {
        self.rolled_back_from
    }

    #[inline]
    pub fn is_committed(&self) -> bool {
        self.current == InstallStage::Committed
    }

    #[inline]
    pub fn is_rolled_back(&self) -> bool {
        self.current == InstallStage::RolledBack
    }

    pub fn history(&self) -> &[InstallStage] {
        &self.history
    }

    /// Move one stage forward.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Committed or RolledBack
    pub fn advance(&mut self) -> Result<InstallStage, InstallTransitionError> {
        let Some(next_stage) = self.current.next() else {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        };

        tracing::debug!("Install stage: {} -> {}", self.current, next_stage);
        self.history.push(next_stage);
        self.current = next_stage;

        Ok(next_stage)
    }

    /// Move to `target`, which must be the stage directly after the current one.
    ///
    /// # Errors
    ///
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    /// - `FromTerminalState` if current is a terminal state
    pub fn transition_to(
        &mut self,
        target: InstallStage,
    ) -> Result<InstallStage, InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(InstallTransitionError::AlreadyAtStage { stage: target });
        }

        // RolledBack is only reachable through roll_back()
        if target == InstallStage::RolledBack {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.advance()
    }

    /// Mark the install as rolled back, recording the stage it happened at.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Committed or RolledBack
    pub fn roll_back(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }

        tracing::debug!("Install stage: {} -> {}", self.current, InstallStage::RolledBack);
        self.rolled_back_from = Some(self.current);
        self.history.push(InstallStage::RolledBack);
        self.current = InstallStage::RolledBack;

        Ok(())
    }
}

impl From<InstallTransitionError> for crate::error::ForgeError {
    fn from(err: InstallTransitionError) -> Self {
        crate::error::ForgeError::InstallTransition(err.to_string())
    }
}
