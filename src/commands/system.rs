//! Type-safe arguments for the system package manager.
//!
//! - `AptArgs` for `apt update`, `apt upgrade -y` and `apt install -y <pkgs>`

use strum::Display;

use crate::command_traits::CommandArgs;

/// apt operation
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AptAction {
    /// Refresh the package index
    #[strum(serialize = "update")]
    Update,
    /// Upgrade installed packages
    #[strum(serialize = "upgrade")]
    Upgrade,
    /// Install the listed packages
    #[strum(serialize = "install")]
    Install(Vec<String>),
}

/// Type-safe arguments for `apt`.
#[derive(Debug, Clone)]
pub struct AptArgs {
    pub action: AptAction,
    /// Prefix the command with `sudo`.
    pub sudo: bool,
}

impl AptArgs {
    pub fn update(sudo: bool) -> Self {
        Self { action: AptAction::Update, sudo }
    }

    pub fn upgrade(sudo: bool) -> Self {
        Self { action: AptAction::Upgrade, sudo }
    }

    pub fn install(packages: &[String], sudo: bool) -> Self {
        Self {
            action: AptAction::Install(packages.to_vec()),
            sudo,
        }
    }
}

impl CommandArgs for AptArgs {
    fn program(&self) -> String {
        let program = if self.sudo { "sudo" } else { "apt" };
        program.to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.sudo {
            args.push("apt".to_string());
        }
        args.push(self.action.to_string());
        match &self.action {
            AptAction::Update => {}
            AptAction::Upgrade => args.push("-y".to_string()),
            AptAction::Install(packages) => {
                args.push("-y".to_string());
                args.extend(packages.iter().cloned());
            }
        }
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
    }

    fn description(&self) -> String {
        match &self.action {
            AptAction::Update => "Refresh package index".to_string(),
            AptAction::Upgrade => "Upgrade installed packages".to_string(),
            AptAction::Install(packages) => {
                format!("Install system packages ({})", packages.len())
            }
        }
    }
}
