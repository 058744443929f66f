use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// roopstrap - provision a GPU host for roop-unleashed
#[derive(Parser, Debug)]
#[command(name = "roopstrap")]
#[command(about = "Installs system packages, Miniconda and roop-unleashed, patches it for sharing, and launches it")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: print every command and file edit without executing it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full provisioning sequence (default)
    Run(RunArgs),
    /// Print the ordered list of steps without running anything
    Plan(TargetArgs),
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check that required programs are installed
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Where configuration comes from and where work happens
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the installer download and the repository clone
    /// (defaults to the current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Stop at the first failed step and exit non-zero
    #[arg(long)]
    pub fail_fast: bool,

    /// Provision everything but do not launch the application
    #[arg(long)]
    pub no_launch: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
