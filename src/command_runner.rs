//! Command execution.
//!
//! Every provisioning command goes through a [`CommandRunner`]. A failed
//! command is reported as a [`CommandOutput`] with `success == false`, never as
//! an error: the caller decides whether a failure stops the run. Failing to
//! spawn the program at all (missing binary, bad working directory) is folded
//! into the same shape with no exit code.
//!
//! # Runners
//!
//! - [`SystemRunner`] spawns real processes, registered with the global
//!   [`ChildRegistry`] and tied to the provisioner's lifetime.
//! - [`DryRunRunner`] only logs what would run.

use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::command_traits::{CommandSpec, OutputMode};
use crate::process_guard::{ChildLifetime, ChildRegistry};

/// Output from a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output (empty for inherited stdio).
    pub stdout: String,
    /// Captured standard error, or the spawn error message.
    pub stderr: String,
    /// Exit code (None if terminated by signal or never spawned).
    pub exit_code: Option<i32>,
    /// Whether the command exited with code 0.
    pub success: bool,
    /// Whether the command was skipped because of dry-run mode.
    pub dry_run: bool,
}

impl CommandOutput {
    /// Output for a command that could not be started.
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
            success: false,
            dry_run: false,
        }
    }

    /// Output for a command skipped in dry-run mode.
    pub fn skipped() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
            dry_run: true,
        }
    }
}

/// Executes command specifications.
pub trait CommandRunner {
    fn run(&mut self, spec: &CommandSpec) -> CommandOutput;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&mut self, spec: &CommandSpec) -> CommandOutput {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    /// Echo captured stdout of successful commands.
    pub echo_stdout: bool,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self { echo_stdout: true }
    }
}

impl SystemRunner {
    fn build(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).die_with_parent();
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(ref dir) = spec.working_dir {
            cmd.current_dir(dir);
        }
        match spec.output_mode {
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }
        cmd
    }

    fn with_registry(f: impl FnOnce(&mut ChildRegistry)) {
        if let Ok(mut guard) = ChildRegistry::global().lock() {
            f(&mut guard);
        }
    }

    fn report(&self, spec: &CommandSpec, output: &CommandOutput) {
        if output.success {
            info!("Command succeeded: {}", spec.display());
            if self.echo_stdout && !output.stdout.is_empty() {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(output.stdout.as_bytes());
                let _ = out.flush();
            }
        } else {
            error!(
                exit_code = ?output.exit_code,
                "Error executing command: {}",
                spec.display()
            );
            if !output.stderr.trim().is_empty() {
                eprintln!("{}", output.stderr.trim_end());
            }
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, spec: &CommandSpec) -> CommandOutput {
        info!("Running: {}", spec.display());
        debug!(env = ?spec.env, cwd = ?spec.working_dir, "command environment");

        let child = match Self::build(spec).spawn() {
            Ok(child) => child,
            Err(e) => {
                let output = CommandOutput::spawn_failure(format!(
                    "failed to start {}: {}",
                    spec.program, e
                ));
                self.report(spec, &output);
                return output;
            }
        };

        let pid = child.id();
        Self::with_registry(|r| r.register(pid));
        let waited = child.wait_with_output();
        Self::with_registry(|r| r.unregister(pid));

        let output = match waited {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                exit_code: out.status.code(),
                success: out.status.success(),
                dry_run: false,
            },
            Err(e) => CommandOutput::spawn_failure(format!(
                "failed waiting for {}: {}",
                spec.program, e
            )),
        };

        self.report(spec, &output);
        output
    }
}

/// Logs commands without executing them.
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner {
    /// Every command that would have run, in order.
    pub planned: Vec<String>,
}

impl CommandRunner for DryRunRunner {
    fn run(&mut self, spec: &CommandSpec) -> CommandOutput {
        let line = spec.display();
        info!("[DRY RUN] {}", line);
        println!("[DRY RUN] {}", line);
        self.planned.push(line);
        CommandOutput::skipped()
    }
}
