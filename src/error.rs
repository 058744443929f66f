//! Error handling module for roopstrap
//!
//! Provides centralized error types using thiserror. Command failures are NOT
//! errors: they are reported as `CommandOutput` values so the provisioning
//! sequence can decide whether to continue. These types cover everything else
//! (filesystem edits, environment resolution, stage bookkeeping).

use thiserror::Error;

use crate::patch::PatchError;
use crate::provision_state::ProvisionTransitionError;

/// Main error type for roopstrap
#[derive(Error, Debug)]
pub enum RoopstrapError {
    /// IO errors (profile append, working directory lookup, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source patch errors
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Stage transition errors
    #[error("Stage transition error: {0}")]
    Transition(#[from] ProvisionTransitionError),

    /// Shell profile errors
    #[error("Profile error: {0}")]
    Profile(String),

    /// Toolchain environment resolution errors
    #[error("Environment error: {0}")]
    Environment(String),
}

/// Result type alias for roopstrap operations
pub type Result<T> = std::result::Result<T, RoopstrapError>;

impl RoopstrapError {
    /// Create a profile error
    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile(msg.into())
    }

    /// Create an environment error
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }
}
