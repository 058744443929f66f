//! Pre-flight checks for the host.
//!
//! Verifies that the programs the provisioning sequence calls are on PATH
//! before anything is changed. Run with `roopstrap check`.

use std::path::Path;
use tracing::debug;

use crate::config_file::ProvisionConfig;
use crate::types::Architecture;

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
    /// Whether apt commands will be prefixed with sudo
    pub sudo_needed: bool,
    /// Whether a conda install already exists at the configured prefix
    pub conda_present: bool,
    /// Architecture of this host, if Miniconda publishes an installer for it
    pub host_architecture: Option<Architecture>,
    /// Architecture the installer is downloaded for
    pub configured_architecture: Architecture,
}

impl SanityCheckResult {
    /// True if every required binary was found and the installer matches the host
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.architecture_matches()
    }

    pub fn architecture_matches(&self) -> bool {
        self.host_architecture == Some(self.configured_architecture)
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.is_ok() {
            lines.push("✓ All required programs found".to_string());
        } else {
            lines.push("✗ Missing required programs:".to_string());
            for binary in &self.missing_binaries {
                if binary == "apt" {
                    lines.push(
                        "    • apt (not a Debian/Ubuntu host; set system_packages to No)".to_string(),
                    );
                } else {
                    lines.push(format!("    • {} (install: apt install {})", binary, binary));
                }
            }
        }
        match self.host_architecture {
            Some(host) if self.architecture_matches() => {
                lines.push(format!("  Architecture: {}", host));
            }
            Some(host) => lines.push(format!(
                "✗ Installer is for {} but this host is {}; set architecture to \"{}\"",
                self.configured_architecture, host, host
            )),
            None => lines.push(format!(
                "✗ No Miniconda installer for this host ({})",
                std::env::consts::ARCH
            )),
        }
        lines.push(format!(
            "  Running as root: {}",
            if self.is_root { "yes" } else { "no" }
        ));
        if self.sudo_needed {
            lines.push("  apt commands will run through sudo".to_string());
        }
        if self.conda_present {
            lines.push(
                "  Note: a conda install already exists at the prefix; the Miniconda installer will refuse to overwrite it"
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}

/// Binaries needed regardless of configuration
const REQUIRED_BINARIES: &[&str] = &[
    "bash", // Miniconda installer
    "wget", // Installer download
    "git",  // Repository clone
];

/// True if `name` resolves on PATH
fn binary_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check if running as root (EUID 0)
pub fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Binaries required by `config`, given whether sudo will be used
pub fn required_binaries(config: &ProvisionConfig, sudo_needed: bool) -> Vec<&'static str> {
    let mut required = REQUIRED_BINARIES.to_vec();
    if config.system_packages.is_enabled() {
        required.push("apt");
        if sudo_needed {
            required.push("sudo");
        }
    }
    required
}

/// Perform all checks. `conda_prefix` is the resolved prefix directory.
pub fn verify_environment(config: &ProvisionConfig, conda_prefix: &Path) -> SanityCheckResult {
    let is_root = is_running_as_root();
    let sudo_needed = config.use_sudo.is_enabled() && !is_root;

    let missing_binaries: Vec<String> = required_binaries(config, sudo_needed)
        .into_iter()
        .filter(|b| !binary_exists(b))
        .map(str::to_string)
        .collect();

    let conda_present = conda_prefix.join("bin").join("conda").exists();
    let host_architecture = Architecture::host();
    debug!(?missing_binaries, is_root, conda_present, ?host_architecture, "pre-flight results");

    SanityCheckResult {
        missing_binaries,
        is_root,
        sudo_needed,
        conda_present,
        host_architecture,
        configured_architecture: config.architecture,
    }
}
