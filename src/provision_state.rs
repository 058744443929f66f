//! Provisioning stage tracking.
//!
//! `ProvisionContext` is the single source of truth for how far a run got.
//! Stages only move forward, one at a time; any non-terminal stage can fail.
//!
//! ```text
//! NotStarted
//!     ↓
//! RefreshingPackages
//!     ↓
//! InstallingSystemPackages
//!     ↓
//! ConfiguringProfile
//!     ↓
//! InstallingMiniconda
//!     ↓
//! CreatingEnvironment
//!     ↓
//! CloningRepository
//!     ↓
//! PatchingSource
//!     ↓
//! InstallingRequirements
//!     ↓
//! Launching
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Provisioning stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProvisionStage {
    NotStarted = 0,
    /// apt update / upgrade
    RefreshingPackages = 1,
    /// apt install of the system package list
    InstallingSystemPackages = 2,
    /// PATH export appended to the shell profile
    ConfiguringProfile = 3,
    /// Installer download and batch install
    InstallingMiniconda = 4,
    /// conda create
    CreatingEnvironment = 5,
    /// git clone
    CloningRepository = 6,
    /// Source patch inside the checkout
    PatchingSource = 7,
    /// pip install -r
    InstallingRequirements = 8,
    /// Application entry point
    Launching = 9,
    /// Terminal: every stage was entered
    Completed = 10,
    /// Terminal: aborted under the fail-fast policy
    Failed = 255,
}

impl ProvisionStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Next stage in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::RefreshingPackages),
            Self::RefreshingPackages => Some(Self::InstallingSystemPackages),
            Self::InstallingSystemPackages => Some(Self::ConfiguringProfile),
            Self::ConfiguringProfile => Some(Self::InstallingMiniconda),
            Self::InstallingMiniconda => Some(Self::CreatingEnvironment),
            Self::CreatingEnvironment => Some(Self::CloningRepository),
            Self::CloningRepository => Some(Self::PatchingSource),
            Self::PatchingSource => Some(Self::InstallingRequirements),
            Self::InstallingRequirements => Some(Self::Launching),
            Self::Launching => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::RefreshingPackages => "Updating and upgrading the system",
            Self::InstallingSystemPackages => "Installing required packages",
            Self::ConfiguringProfile => "Adding PATH export to shell profile",
            Self::InstallingMiniconda => "Downloading and installing Miniconda",
            Self::CreatingEnvironment => "Creating conda environment",
            Self::CloningRepository => "Cloning the repository",
            Self::PatchingSource => "Patching application source",
            Self::InstallingRequirements => "Installing Python dependencies",
            Self::Launching => "Running the application",
            Self::Completed => "Provisioning complete",
            Self::Failed => "Provisioning failed",
        }
    }

    /// Stages that carry work, in order
    pub const fn work_stages() -> &'static [Self] {
        &[
            Self::RefreshingPackages,
            Self::InstallingSystemPackages,
            Self::ConfiguringProfile,
            Self::InstallingMiniconda,
            Self::CreatingEnvironment,
            Self::CloningRepository,
            Self::PatchingSource,
            Self::InstallingRequirements,
            Self::Launching,
        ]
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur during stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionTransitionError {
    #[error("Cannot skip from '{from}' to '{to}'")]
    SkippedStage {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    #[error("Cannot go backwards from '{from}' to '{to}'")]
    BackwardTransition {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    #[error("Cannot leave terminal stage '{from}'")]
    FromTerminalState { from: ProvisionStage },

    #[error("Already at stage '{stage}'")]
    AlreadyAtStage { stage: ProvisionStage },
}

/// Tracks the current stage of a provisioning run.
///
/// ```
/// use roopstrap::provision_state::{ProvisionContext, ProvisionStage};
///
/// let mut ctx = ProvisionContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), ProvisionStage::RefreshingPackages);
/// assert!(ctx.transition_to(ProvisionStage::PatchingSource).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    current: ProvisionStage,
    failed_at: Option<ProvisionStage>,
    /// (stage, unix timestamp) for every stage entered
    history: Vec<(ProvisionStage, u64)>,
}

impl Default for ProvisionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self {
            current: ProvisionStage::NotStarted,
            failed_at: None,
            history: Vec::with_capacity(ProvisionStage::work_stages().len() + 1),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ProvisionStage {
        self.current
    }

    /// Stage that was active when the run failed
    #[inline]
    pub fn failed_at(&self) -> Option<ProvisionStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == ProvisionStage::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == ProvisionStage::Failed
    }

    pub fn history(&self) -> &[(ProvisionStage, u64)] {
        &self.history
    }

    /// Advance to the next stage in sequence.
    pub fn advance(&mut self) -> Result<ProvisionStage, ProvisionTransitionError> {
        match self.current.next() {
            Some(next) => {
                self.enter(next);
                Ok(next)
            }
            None => Err(ProvisionTransitionError::FromTerminalState { from: self.current }),
        }
    }

    /// Transition to `target`, which must be exactly the next stage.
    pub fn transition_to(
        &mut self,
        target: ProvisionStage,
    ) -> Result<ProvisionStage, ProvisionTransitionError> {
        if self.current.is_terminal() {
            return Err(ProvisionTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(ProvisionTransitionError::AlreadyAtStage { stage: target });
        }
        if target != ProvisionStage::Failed && target.order() < self.current.order() {
            return Err(ProvisionTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(ProvisionTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        self.enter(target);
        Ok(target)
    }

    /// Mark the run as failed at the current stage.
    pub fn fail(&mut self) -> Result<(), ProvisionTransitionError> {
        if self.current.is_terminal() {
            return Err(ProvisionTransitionError::FromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.enter(ProvisionStage::Failed);
        Ok(())
    }

    fn enter(&mut self, stage: ProvisionStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        debug!("Stage: {} -> {}", self.current, stage);
        self.history.push((stage, timestamp));
        self.current = stage;
    }
}
