//! Type-safe command argument contracts.
//!
//! Every external program the provisioner runs is described by a struct that
//! implements [`CommandArgs`]. Commands are argv vectors, never shell strings:
//! nothing is interpolated by a shell, and the environment each command needs
//! is declared by the struct instead of being inherited from an earlier step.
//!
//! # Design Goals
//!
//! 1. **Compile-Time Safety**: flags are produced by `to_cli_args()`, not typed
//!    by hand at the call site.
//! 2. **Explicit State**: `get_env_vars()` and `working_dir()` carry everything a
//!    command needs; no step relies on a previous step's shell.
//! 3. **Inspectable**: [`CommandSpec::display`] renders exactly what will run, so
//!    plans can be printed and tested without executing anything.

use std::path::PathBuf;

/// How a command's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// stdout/stderr are captured; stdout is echoed after success, stderr
    /// is logged on failure.
    #[default]
    Capture,
    /// stdio is inherited from the provisioner (long-running or interactive
    /// programs such as the launched application).
    Inherit,
}

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: executable name or absolute path.
/// - `to_cli_args()`: argv after the program, exactly as it will be passed.
/// - `get_env_vars()`: variables set on top of the inherited environment.
/// - `working_dir()`: directory to run in; `None` runs in the current directory.
pub trait CommandArgs {
    /// Program to execute (looked up on PATH unless absolute).
    fn program(&self) -> String;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Environment variables the command requires.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    /// Working directory for the command.
    fn working_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Stream handling for the command.
    fn output_mode(&self) -> OutputMode {
        OutputMode::Capture
    }

    /// Short human-readable description (used in logs and the summary).
    fn description(&self) -> String;

    /// Freeze into an owned, runner-ready specification.
    fn to_spec(&self) -> CommandSpec {
        CommandSpec {
            program: self.program(),
            args: self.to_cli_args(),
            env: self.get_env_vars(),
            working_dir: self.working_dir(),
            output_mode: self.output_mode(),
            description: self.description(),
        }
    }
}

/// Owned description of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    pub output_mode: OutputMode,
    pub description: String,
}

impl CommandSpec {
    /// Render as a single shell-like line, quoting arguments where needed.
    ///
    /// Only used for display; commands are never executed through a shell.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of an environment variable set by this spec, if any.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%$".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
