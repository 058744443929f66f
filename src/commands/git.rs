//! Type-safe arguments for `git clone`.

use std::path::PathBuf;

use crate::command_traits::CommandArgs;

/// Type-safe arguments for `git clone <url> <dest>`.
#[derive(Debug, Clone)]
pub struct GitCloneArgs {
    pub url: String,
    pub dest: PathBuf,
}

impl CommandArgs for GitCloneArgs {
    fn program(&self) -> String {
        "git".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "clone".to_string(),
            self.url.clone(),
            self.dest.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        // Fail instead of blocking on a credential prompt
        vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())]
    }

    fn description(&self) -> String {
        "Clone application repository".to_string()
    }
}
