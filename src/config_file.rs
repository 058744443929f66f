//! Configuration file handling for saving and loading provisioning configs.
//!
//! Every field has a default reproducing the stock roop-unleashed setup, so a
//! config file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::patch::PatchRule;
use crate::types::{Architecture, FailurePolicy, Toggle};

/// Provisioning configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    // System packages
    pub system_packages: Toggle,
    pub apt_packages: Vec<String>,
    pub use_sudo: Toggle,

    // Shell profile
    pub profile_path: String, // `~/` expanded; relative paths are under the home directory
    pub profile_line: String,

    // Miniconda
    pub miniconda_url_base: String,
    pub architecture: Architecture,
    pub conda_prefix: String, // `~/` expanded; relative paths are under the home directory

    // Conda environment
    pub env_name: String,
    pub python_version: String,
    pub cuda_toolkit_version: String, // Empty to omit cudatoolkit

    // Application
    pub repository_url: String,
    pub checkout_dir: String, // Relative to the work directory
    pub patch_file: String,   // Relative to the checkout
    pub patch_rules: Vec<PatchRule>,
    pub requirements_file: String,
    pub entry_point: String,
    pub launch: Toggle,

    // Run behaviour
    pub failure_policy: FailurePolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            system_packages: Toggle::Yes,
            apt_packages: ["nano", "git", "build-essential", "g++", "nvidia-cuda-toolkit", "ffmpeg"]
                .into_iter()
                .map(String::from)
                .collect(),
            use_sudo: Toggle::Yes,
            profile_path: "~/.bashrc".to_string(),
            profile_line: "export PATH=$PATH:$HOME/bin".to_string(),
            miniconda_url_base: "https://repo.continuum.io/miniconda".to_string(),
            architecture: Architecture::X86_64,
            conda_prefix: "~/miniconda".to_string(),
            env_name: "roop".to_string(),
            python_version: "3.10".to_string(),
            cuda_toolkit_version: "11.8".to_string(),
            repository_url: "https://github.com/C0untFloyd/roop-unleashed.git".to_string(),
            checkout_dir: "roop-unleashed".to_string(),
            patch_file: "ui/main.py".to_string(),
            patch_rules: vec![
                PatchRule::line(78, "    share = True"),
                PatchRule::line(82, "    gradio_interface.share = True"),
            ],
            requirements_file: "requirements.txt".to_string(),
            entry_point: "run.py".to_string(),
            launch: Toggle::Yes,
            failure_policy: FailurePolicy::Continue,
        }
    }
}

fn is_version(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.ends_with('.')
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

// Debian policy: `[a-z0-9][a-z0-9+.-]+`
fn is_apt_package(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
}

// Passed as a bare argument, so it must not parse as an option.
fn is_relative_path(s: &str) -> bool {
    let p = Path::new(s);
    !s.trim().is_empty()
        && !s.starts_with('-')
        && p.is_relative()
        && !p.components().any(|c| matches!(c, std::path::Component::ParentDir))
}

impl ProvisionConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Full URL of the Miniconda installer for the configured architecture
    pub fn installer_url(&self) -> String {
        format!(
            "{}/{}",
            self.miniconda_url_base.trim_end_matches('/'),
            self.architecture.miniconda_installer()
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.system_packages.is_enabled() {
            if self.apt_packages.is_empty() {
                anyhow::bail!("apt_packages must not be empty when system_packages is enabled");
            }
            for pkg in &self.apt_packages {
                if !is_apt_package(pkg) {
                    anyhow::bail!("Invalid apt package name: {:?}", pkg);
                }
            }
        }

        if self.profile_path.trim().is_empty() {
            anyhow::bail!("profile_path must be specified");
        }
        if self.profile_line.trim().is_empty() || self.profile_line.contains(['\n', '\r']) {
            anyhow::bail!("profile_line must be a single non-empty line");
        }

        if !self.miniconda_url_base.starts_with("https://")
            && !self.miniconda_url_base.starts_with("http://")
        {
            anyhow::bail!("miniconda_url_base must start with http:// or https://");
        }
        if self.conda_prefix.trim().is_empty() {
            anyhow::bail!("conda_prefix must be specified");
        }

        // Conda env names: letters, digits, `_ - .`, no leading dash
        let env = self.env_name.trim();
        if env.is_empty() {
            anyhow::bail!("env_name must be specified");
        }
        if env.starts_with('-')
            || !env
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "_-.".contains(c))
        {
            anyhow::bail!("env_name can only contain letters, numbers, '_', '-' and '.'");
        }
        if !is_version(&self.python_version) {
            anyhow::bail!("python_version must look like 3.10, got {:?}", self.python_version);
        }
        if !self.cuda_toolkit_version.is_empty() && !is_version(&self.cuda_toolkit_version) {
            anyhow::bail!(
                "cuda_toolkit_version must look like 11.8, got {:?}",
                self.cuda_toolkit_version
            );
        }

        let url = self.repository_url.trim();
        if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("git://")
            && !url.starts_with("ssh://")
        {
            anyhow::bail!("repository_url must start with http://, https://, git://, or ssh://");
        }

        for (name, value) in [
            ("checkout_dir", &self.checkout_dir),
            ("patch_file", &self.patch_file),
            ("requirements_file", &self.requirements_file),
            ("entry_point", &self.entry_point),
        ] {
            if !is_relative_path(value) {
                anyhow::bail!("{} must be a relative path without '..', got {:?}", name, value);
            }
        }

        for (idx, rule) in self.patch_rules.iter().enumerate() {
            rule.validate()
                .with_context(|| format!("patch_rules[{}] is invalid", idx))?;
        }

        Ok(())
    }
}
