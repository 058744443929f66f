//! roopstrap library
//!
//! Provisioning of a GPU host for roop-unleashed: typed commands, a runner
//! that reports failures as values, the ordered provisioning sequence, and the
//! file edits it performs along the way.

pub mod cli;
pub mod command_runner;
pub mod command_traits;
pub mod commands;
pub mod config_file;
pub mod environment;
pub mod error;
pub mod patch;
pub mod process_guard;
pub mod profile;
pub mod provision_state;
pub mod provisioner;
pub mod sanity;
pub mod types;

pub use command_runner::{CommandOutput, CommandRunner, DryRunRunner, SystemRunner};
pub use command_traits::{CommandArgs, CommandSpec, OutputMode};
pub use config_file::ProvisionConfig;
pub use environment::ToolchainEnv;
pub use error::{Result, RoopstrapError};
pub use patch::{PatchError, PatchRule, PatchSummary, apply_patch};
pub use process_guard::{ChildRegistry, ProcessGuard};
pub use profile::append_profile_line;
pub use provision_state::{ProvisionContext, ProvisionStage, ProvisionTransitionError};
pub use provisioner::{Provisioner, RunReport, Step, StepAction, StepRecord, StepStatus};
pub use types::{Architecture, FailurePolicy, Toggle};
