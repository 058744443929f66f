//! Type-safe arguments for commands that run inside the conda environment:
//! - `PipInstallArgs` for `python -m pip install -r <requirements>`
//! - `LaunchArgs` for running the application entry point
//!
//! Both use the environment's own interpreter and carry the activated
//! environment's variables, which replaces `conda activate`.

use std::path::PathBuf;

use crate::command_traits::{CommandArgs, OutputMode};
use crate::environment::ToolchainEnv;

/// Type-safe arguments for `<env python> -m pip install -r <requirements>`.
#[derive(Debug, Clone)]
pub struct PipInstallArgs {
    pub python: PathBuf,
    pub requirements: String,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl PipInstallArgs {
    pub fn new(toolchain: &ToolchainEnv, requirements: &str) -> Self {
        Self {
            python: toolchain.env_python(),
            requirements: requirements.to_string(),
            working_dir: toolchain.checkout_dir.clone(),
            env: toolchain.activated_env_vars(),
        }
    }
}

impl CommandArgs for PipInstallArgs {
    fn program(&self) -> String {
        self.python.display().to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "-r".to_string(),
            self.requirements.clone(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.env.clone()
    }

    fn working_dir(&self) -> Option<PathBuf> {
        Some(self.working_dir.clone())
    }

    fn description(&self) -> String {
        "Install Python requirements".to_string()
    }
}

/// Type-safe arguments for `<env python> <entry point>`.
///
/// The application is long-running and prints its share URL to stdout, so its
/// streams are inherited rather than captured.
#[derive(Debug, Clone)]
pub struct LaunchArgs {
    pub python: PathBuf,
    pub entry_point: String,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl LaunchArgs {
    pub fn new(toolchain: &ToolchainEnv, entry_point: &str) -> Self {
        Self {
            python: toolchain.env_python(),
            entry_point: entry_point.to_string(),
            working_dir: toolchain.checkout_dir.clone(),
            env: toolchain.activated_env_vars(),
        }
    }
}

impl CommandArgs for LaunchArgs {
    fn program(&self) -> String {
        self.python.display().to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.entry_point.clone()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.env.clone()
    }

    fn working_dir(&self) -> Option<PathBuf> {
        Some(self.working_dir.clone())
    }

    fn output_mode(&self) -> OutputMode {
        OutputMode::Inherit
    }

    fn description(&self) -> String {
        format!("Launch {}", self.entry_point)
    }
}
