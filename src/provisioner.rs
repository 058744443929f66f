//! Provisioning orchestration.
//!
//! Builds the ordered list of steps from a [`ProvisionConfig`] and a resolved
//! [`ToolchainEnv`], then executes them through a [`CommandRunner`].
//!
//! # Failure policy
//!
//! - [`FailurePolicy::Continue`]: a failed step is logged and recorded, and the
//!   remaining steps still run.
//! - [`FailurePolicy::FailFast`]: the first failure marks the run as failed and
//!   the remaining steps are recorded as not attempted.
//!
//! File edits (profile append, source patch) follow the same policy as
//! commands: an edit error is a failed step, not an abort.

use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::command_runner::CommandRunner;
use crate::command_traits::{CommandArgs, CommandSpec};
use crate::commands::conda::{CondaCreateArgs, DownloadArgs, MinicondaInstallArgs};
use crate::commands::git::GitCloneArgs;
use crate::commands::python::{LaunchArgs, PipInstallArgs};
use crate::commands::system::AptArgs;
use crate::config_file::ProvisionConfig;
use crate::environment::ToolchainEnv;
use crate::error::Result;
use crate::patch::{self, PatchRule};
use crate::profile;
use crate::provision_state::{ProvisionContext, ProvisionStage};
use crate::sanity;
use crate::types::FailurePolicy;

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run an external command
    Command(CommandSpec),
    /// Append a line to the shell profile
    AppendProfile { path: PathBuf, line: String },
    /// Patch a file in the checkout
    Patch { file: PathBuf, rules: Vec<PatchRule> },
}

/// One unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub stage: ProvisionStage,
    pub description: String,
    pub action: StepAction,
}

impl Step {
    fn command(stage: ProvisionStage, args: &impl CommandArgs) -> Self {
        let spec = args.to_spec();
        Self {
            stage,
            description: spec.description.clone(),
            action: StepAction::Command(spec),
        }
    }

    /// Single-line rendering of what the step does.
    pub fn display(&self) -> String {
        match &self.action {
            StepAction::Command(spec) => spec.display(),
            StepAction::AppendProfile { path, line } => {
                format!("append '{}' to {}", line, path.display())
            }
            StepAction::Patch { file, rules } => {
                format!("patch {} ({} rule(s))", file.display(), rules.len())
            }
        }
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
    /// Skipped because of dry-run mode
    DryRun,
    /// Not reached because an earlier step failed under fail-fast
    NotAttempted,
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => " OK ",
            Self::Failed { .. } => "FAIL",
            Self::DryRun => "DRY ",
            Self::NotAttempted => "SKIP",
        }
    }
}

/// Record of a step in a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub stage: ProvisionStage,
    pub description: String,
    pub display: String,
    pub status: StepStatus,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<StepRecord>,
    pub context: ProvisionContext,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(|r| r.status.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// True if the run reached Completed with no failed step.
    pub fn is_success(&self) -> bool {
        self.context.is_complete() && self.failure_count() == 0
    }

    /// Human-readable summary table.
    pub fn render(&self) -> String {
        let width = self
            .records
            .iter()
            .map(|r| r.description.len())
            .max()
            .unwrap_or(0);

        let mut out = String::from("Provisioning summary\n");
        for record in &self.records {
            let _ = writeln!(
                out,
                "  [{}] {:<width$}  {}",
                record.status.label(),
                record.description,
                record.display,
                width = width
            );
            if let StepStatus::Failed { exit_code, message } = &record.status {
                let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                let first = message.lines().next().unwrap_or("");
                let _ = writeln!(out, "         exit code {}: {}", code, first);
            }
        }

        let failed = self.failure_count();
        if let Some(stage) = self.context.failed_at() {
            let _ = writeln!(out, "Stopped at: {}", stage);
        } else if failed > 0 {
            let _ = writeln!(out, "{} step(s) failed; later steps ran regardless", failed);
        } else {
            let _ = writeln!(out, "All steps completed");
        }
        out
    }
}

/// Runs the provisioning sequence.
pub struct Provisioner<R: CommandRunner> {
    config: ProvisionConfig,
    toolchain: ToolchainEnv,
    runner: R,
    policy: FailurePolicy,
    sudo: bool,
    dry_run: bool,
    launch: bool,
}

impl<R: CommandRunner> Provisioner<R> {
    /// `sudo` defaults to the config setting, disabled when already root.
    pub fn new(config: ProvisionConfig, toolchain: ToolchainEnv, runner: R) -> Self {
        let sudo = config.use_sudo.is_enabled() && !sanity::is_running_as_root();
        Self {
            policy: config.failure_policy,
            launch: config.launch.is_enabled(),
            config,
            toolchain,
            runner,
            sudo,
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Skip file edits as well; commands are left to the runner.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_launch(mut self, launch: bool) -> Self {
        self.launch = launch;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Ordered list of steps this provisioner would execute.
    pub fn plan(&self) -> Vec<Step> {
        let cfg = &self.config;
        let tc = &self.toolchain;
        let mut steps = Vec::new();

        if cfg.system_packages.is_enabled() {
            steps.push(Step::command(
                ProvisionStage::RefreshingPackages,
                &AptArgs::update(self.sudo),
            ));
            steps.push(Step::command(
                ProvisionStage::RefreshingPackages,
                &AptArgs::upgrade(self.sudo),
            ));
            steps.push(Step::command(
                ProvisionStage::InstallingSystemPackages,
                &AptArgs::install(&cfg.apt_packages, self.sudo),
            ));
        }

        steps.push(Step {
            stage: ProvisionStage::ConfiguringProfile,
            description: "Append PATH export to shell profile".to_string(),
            action: StepAction::AppendProfile {
                path: tc.profile_path.clone(),
                line: cfg.profile_line.clone(),
            },
        });

        steps.push(Step::command(
            ProvisionStage::InstallingMiniconda,
            &DownloadArgs {
                url: cfg.installer_url(),
                dest: tc.installer_path.clone(),
            },
        ));
        steps.push(Step::command(
            ProvisionStage::InstallingMiniconda,
            &MinicondaInstallArgs {
                installer: tc.installer_path.clone(),
                prefix: tc.conda_prefix.clone(),
            },
        ));

        let cuda = Some(cfg.cuda_toolkit_version.as_str()).filter(|v| !v.is_empty());
        steps.push(Step::command(
            ProvisionStage::CreatingEnvironment,
            &CondaCreateArgs::new(tc, &cfg.python_version, cuda),
        ));

        steps.push(Step::command(
            ProvisionStage::CloningRepository,
            &GitCloneArgs {
                url: cfg.repository_url.clone(),
                dest: tc.checkout_dir.clone(),
            },
        ));

        if !cfg.patch_rules.is_empty() {
            steps.push(Step {
                stage: ProvisionStage::PatchingSource,
                description: format!("Patch {}", cfg.patch_file),
                action: StepAction::Patch {
                    file: tc.checkout_file(&cfg.patch_file),
                    rules: cfg.patch_rules.clone(),
                },
            });
        }

        steps.push(Step::command(
            ProvisionStage::InstallingRequirements,
            &PipInstallArgs::new(tc, &cfg.requirements_file),
        ));

        if self.launch {
            steps.push(Step::command(
                ProvisionStage::Launching,
                &LaunchArgs::new(tc, &cfg.entry_point),
            ));
        }

        steps
    }

    /// Execute every planned step and return the report.
    ///
    /// Step failures never surface as `Err`; they are recorded in the report.
    pub fn run(&mut self) -> Result<RunReport> {
        let steps = self.plan();
        let mut ctx = ProvisionContext::new();
        let mut records = Vec::with_capacity(steps.len());
        let mut aborted = false;

        info!(
            "Provisioning {} step(s), policy={}, dry_run={}",
            steps.len(),
            self.policy,
            self.dry_run
        );

        for step in steps {
            if aborted {
                records.push(Self::record(&step, StepStatus::NotAttempted));
                continue;
            }

            if ctx.current_stage() != step.stage {
                while ctx.current_stage().order() < step.stage.order() {
                    ctx.advance()?;
                }
                println!("{}...", step.stage);
            }

            let status = self.execute(&step);
            if status.is_failure() {
                match self.policy {
                    FailurePolicy::Continue => {
                        warn!("Step '{}' failed, continuing", step.description);
                    }
                    FailurePolicy::FailFast => {
                        error!("Step '{}' failed, stopping", step.description);
                        ctx.fail()?;
                        aborted = true;
                    }
                }
            }
            records.push(Self::record(&step, status));
        }

        if !aborted {
            while !ctx.is_complete() {
                ctx.advance()?;
            }
        }

        Ok(RunReport {
            records,
            context: ctx,
        })
    }

    fn record(step: &Step, status: StepStatus) -> StepRecord {
        StepRecord {
            stage: step.stage,
            description: step.description.clone(),
            display: step.display(),
            status,
        }
    }

    fn execute(&mut self, step: &Step) -> StepStatus {
        match &step.action {
            StepAction::Command(spec) => {
                let output = self.runner.run(spec);
                if output.dry_run {
                    StepStatus::DryRun
                } else if output.success {
                    StepStatus::Succeeded
                } else {
                    StepStatus::Failed {
                        exit_code: output.exit_code,
                        message: output.stderr.trim().to_string(),
                    }
                }
            }
            StepAction::AppendProfile { .. } | StepAction::Patch { .. } if self.dry_run => {
                info!("[DRY RUN] {}", step.display());
                println!("[DRY RUN] {}", step.display());
                StepStatus::DryRun
            }
            StepAction::AppendProfile { path, line } => {
                match profile::append_profile_line(path, line) {
                    Ok(appended) => {
                        if !appended {
                            info!("{} already exports the PATH entry", path.display());
                        }
                        StepStatus::Succeeded
                    }
                    Err(e) => Self::edit_failed(step, e.to_string()),
                }
            }
            StepAction::Patch { file, rules } => match patch::apply_patch(file, rules) {
                Ok(summary) => {
                    if !summary.modified() {
                        info!("{} already patched", file.display());
                    }
                    StepStatus::Succeeded
                }
                Err(e) => Self::edit_failed(step, e.to_string()),
            },
        }
    }

    fn edit_failed(step: &Step, message: String) -> StepStatus {
        error!("Error executing step: {}", step.display());
        eprintln!("{}", message);
        StepStatus::Failed {
            exit_code: None,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::{CommandOutput, DryRunRunner};
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, spec: &CommandSpec) -> CommandOutput {
            self.seen.push(spec.display());
            CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
                success: true,
                dry_run: false,
            }
        }
    }

    fn provisioner<R: CommandRunner>(runner: R) -> Provisioner<R> {
        let config = ProvisionConfig::default();
        let tc = ToolchainEnv::with_paths(
            &config,
            Path::new("/home/ada"),
            Path::new("/srv/work"),
            "/usr/bin",
        );
        Provisioner::new(config, tc, runner).with_sudo(true)
    }

    #[test]
    fn test_plan_order_and_stages() {
        let plan = provisioner(Recorder::default()).plan();
        let stages: Vec<ProvisionStage> = plan.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![
                ProvisionStage::RefreshingPackages,
                ProvisionStage::RefreshingPackages,
                ProvisionStage::InstallingSystemPackages,
                ProvisionStage::ConfiguringProfile,
                ProvisionStage::InstallingMiniconda,
                ProvisionStage::InstallingMiniconda,
                ProvisionStage::CreatingEnvironment,
                ProvisionStage::CloningRepository,
                ProvisionStage::PatchingSource,
                ProvisionStage::InstallingRequirements,
                ProvisionStage::Launching,
            ]
        );
        assert!(stages.windows(2).all(|w| w[0].order() <= w[1].order()));
    }

    #[test]
    fn test_plan_respects_toggles() {
        let mut p = provisioner(Recorder::default()).with_launch(false);
        p.config.system_packages = crate::types::Toggle::No;
        p.config.patch_rules.clear();
        let stages: Vec<ProvisionStage> = p.plan().iter().map(|s| s.stage).collect();
        assert!(!stages.contains(&ProvisionStage::RefreshingPackages));
        assert!(!stages.contains(&ProvisionStage::PatchingSource));
        assert!(!stages.contains(&ProvisionStage::Launching));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionConfig {
            profile_path: dir.path().join(".bashrc").display().to_string(),
            ..Default::default()
        };
        let tc = ToolchainEnv::with_paths(&config, dir.path(), dir.path(), "/usr/bin");
        let mut p = Provisioner::new(config, tc, DryRunRunner::default()).with_dry_run(true);

        let report = p.run().unwrap();
        assert!(report.records.iter().all(|r| r.status == StepStatus::DryRun));
        assert!(report.is_success());
        assert!(!dir.path().join(".bashrc").exists());
        assert_eq!(p.runner().planned.len(), report.records.len() - 2);
    }

    #[test]
    fn test_render_mentions_failures() {
        let report = RunReport {
            records: vec![StepRecord {
                stage: ProvisionStage::CloningRepository,
                description: "Clone application repository".into(),
                display: "git clone x y".into(),
                status: StepStatus::Failed {
                    exit_code: Some(128),
                    message: "fatal: destination path exists".into(),
                },
            }],
            context: ProvisionContext::new(),
        };
        let text = report.render();
        assert!(text.contains("[FAIL] Clone application repository"));
        assert!(text.contains("exit code 128: fatal: destination path exists"));
        assert!(text.contains("1 step(s) failed"));
    }
}
