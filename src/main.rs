//! roopstrap - main entry point
//!
//! Provisions a GPU host for roop-unleashed. Running with no arguments performs
//! the full sequence with the default configuration.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use roopstrap::cli::{Cli, Commands, RunArgs, TargetArgs};
use roopstrap::command_runner::{CommandRunner, DryRunRunner, SystemRunner};
use roopstrap::config_file::ProvisionConfig;
use roopstrap::environment::ToolchainEnv;
use roopstrap::process_guard::{self, ProcessGuard};
use roopstrap::provisioner::Provisioner;
use roopstrap::sanity;
use roopstrap::types::FailurePolicy;

/// Initialize the tracing subscriber; logs go to stderr.
fn init_logger(verbose: bool) {
    let default = if verbose { "roopstrap=debug" } else { "roopstrap=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli);

    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Some(Commands::Run(args)) => run(&args, cli.dry_run),
        None => run(&RunArgs::default(), cli.dry_run),
        Some(Commands::Plan(target)) => plan(&target),
        Some(Commands::Validate { config }) => validate(&config),
        Some(Commands::InitConfig { path, force }) => init_config(&path, force),
        Some(Commands::Check { config }) => check(config.as_deref()),
    }
}

/// Load the config file if given, otherwise the defaults, and validate it.
fn load_config(path: Option<&Path>) -> Result<ProvisionConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            ProvisionConfig::load_from_file(path)?
        }
        None => ProvisionConfig::default(),
    };
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn run(args: &RunArgs, dry_run: bool) -> Result<ExitCode> {
    let config = load_config(args.target.config.as_deref())?;
    let toolchain = ToolchainEnv::resolve(&config, args.target.workdir.as_deref())?;

    // Keep alive for the whole run so children die with us on any exit path.
    let _guard = ProcessGuard::new();

    let runner: Box<dyn CommandRunner> = if dry_run {
        Box::new(DryRunRunner::default())
    } else {
        Box::new(SystemRunner::default())
    };

    let mut provisioner = Provisioner::new(config, toolchain, runner).with_dry_run(dry_run);
    if args.fail_fast {
        provisioner = provisioner.with_policy(FailurePolicy::FailFast);
    }
    if args.no_launch {
        provisioner = provisioner.with_launch(false);
    }

    let report = provisioner.run()?;
    println!();
    print!("{}", report.render());

    if report.context.is_failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn plan(target: &TargetArgs) -> Result<ExitCode> {
    let config = load_config(target.config.as_deref())?;
    let toolchain = ToolchainEnv::resolve(&config, target.workdir.as_deref())?;
    let provisioner = Provisioner::new(config, toolchain, DryRunRunner::default());

    for (idx, step) in provisioner.plan().iter().enumerate() {
        println!("{:>2}. [{}] {}", idx + 1, step.stage, step.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn validate(path: &Path) -> Result<ExitCode> {
    info!("Validating configuration file: {:?}", path);
    load_config(Some(path))?;
    println!("✓ Configuration file is valid: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn init_config(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ProvisionConfig::default().save_to_file(path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn check(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let toolchain = ToolchainEnv::resolve(&config, None)?;
    let result = sanity::verify_environment(&config, &toolchain.conda_prefix);
    println!("{}", result.render());

    if result.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
