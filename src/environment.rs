//! Resolved toolchain environment.
//!
//! Each command runs in its own process, so shell-level state such as
//! `export PATH=...`, `source ~/.bashrc` or `conda activate` cannot carry over
//! from one step to the next. Instead every path a later step depends on is
//! resolved once here and handed to each command explicitly (absolute binary
//! paths, `PATH`, `CONDA_PREFIX`, `CONDA_DEFAULT_ENV`, working directory).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config_file::ProvisionConfig;
use crate::error::{Result, RoopstrapError};

/// Paths and variables shared by all provisioning steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainEnv {
    /// User home directory
    pub home: PathBuf,
    /// Directory the installer is downloaded to and the repository is cloned into
    pub workdir: PathBuf,
    /// Shell profile the PATH export is appended to
    pub profile_path: PathBuf,
    /// Miniconda installation prefix
    pub conda_prefix: PathBuf,
    /// Name of the conda environment
    pub env_name: String,
    /// Downloaded Miniconda installer
    pub installer_path: PathBuf,
    /// Application checkout
    pub checkout_dir: PathBuf,
    /// PATH inherited from the invoking shell
    pub inherited_path: String,
}

/// Expand a leading `~` or `$HOME` against `home`.
pub fn expand_home(raw: &str, home: &Path) -> PathBuf {
    for prefix in ["~", "$HOME", "${HOME}"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            if rest.is_empty() {
                return home.to_path_buf();
            }
            if let Some(rest) = rest.strip_prefix('/') {
                return home.join(rest);
            }
        }
    }
    PathBuf::from(raw)
}

/// Expand `raw` like [`expand_home`], then anchor a still-relative result at `home`.
pub fn resolve_under_home(raw: &str, home: &Path) -> PathBuf {
    let expanded = expand_home(raw, home);
    if expanded.is_absolute() {
        expanded
    } else {
        home.join(expanded)
    }
}

impl ToolchainEnv {
    /// Resolve against the real home directory, working directory and PATH.
    pub fn resolve(config: &ProvisionConfig, workdir: Option<&Path>) -> Result<Self> {
        let home = home::home_dir()
            .ok_or_else(|| RoopstrapError::environment("could not determine home directory"))?;

        let cwd = std::env::current_dir()?;
        let workdir = match workdir {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        };

        let inherited_path = std::env::var_os("PATH")
            .unwrap_or_else(OsString::new)
            .to_string_lossy()
            .into_owned();

        let env = Self::with_paths(config, &home, &workdir, &inherited_path);
        debug!("Resolved toolchain environment: {:?}", env);
        Ok(env)
    }

    /// Build from explicit paths (no process state consulted).
    pub fn with_paths(
        config: &ProvisionConfig,
        home: &Path,
        workdir: &Path,
        inherited_path: &str,
    ) -> Self {
        Self {
            home: home.to_path_buf(),
            workdir: workdir.to_path_buf(),
            profile_path: resolve_under_home(&config.profile_path, home),
            conda_prefix: resolve_under_home(&config.conda_prefix, home),
            env_name: config.env_name.clone(),
            installer_path: workdir.join(config.architecture.miniconda_installer()),
            checkout_dir: workdir.join(&config.checkout_dir),
            inherited_path: inherited_path.to_string(),
        }
    }

    /// `<prefix>/bin/conda`
    pub fn conda_bin(&self) -> PathBuf {
        self.conda_prefix.join("bin").join("conda")
    }

    /// `<prefix>/envs/<name>`
    pub fn env_prefix(&self) -> PathBuf {
        self.conda_prefix.join("envs").join(&self.env_name)
    }

    /// Interpreter of the conda environment
    pub fn env_python(&self) -> PathBuf {
        self.env_prefix().join("bin").join("python")
    }

    /// PATH as it would look inside an activated environment:
    /// `<env>/bin:<conda>/bin:<inherited>:<home>/bin`
    pub fn path_var(&self) -> String {
        let mut parts = vec![
            self.env_prefix().join("bin").display().to_string(),
            self.conda_prefix.join("bin").display().to_string(),
        ];
        parts.extend(
            self.inherited_path
                .split(':')
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
        let home_bin = self.home.join("bin").display().to_string();
        if !parts.contains(&home_bin) {
            parts.push(home_bin);
        }
        parts.join(":")
    }

    /// Variables `conda activate` would have set, for commands that run inside the env.
    pub fn activated_env_vars(&self) -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), self.path_var()),
            ("CONDA_PREFIX".to_string(), self.env_prefix().display().to_string()),
            ("CONDA_DEFAULT_ENV".to_string(), self.env_name.clone()),
        ]
    }

    /// Variables for conda itself (before the env exists).
    pub fn conda_env_vars(&self) -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), self.path_var()),
            ("CONDA_PREFIX".to_string(), self.conda_prefix.display().to_string()),
        ]
    }

    /// Absolute path of a file inside the checkout
    pub fn checkout_file(&self, relative: &str) -> PathBuf {
        self.checkout_dir.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolchainEnv {
        ToolchainEnv::with_paths(
            &ProvisionConfig::default(),
            Path::new("/home/ada"),
            Path::new("/srv/work"),
            "/usr/local/bin:/usr/bin",
        )
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/ada");
        assert_eq!(expand_home("~", home), PathBuf::from("/home/ada"));
        assert_eq!(expand_home("~/.bashrc", home), PathBuf::from("/home/ada/.bashrc"));
        assert_eq!(expand_home("$HOME/miniconda", home), PathBuf::from("/home/ada/miniconda"));
        assert_eq!(expand_home("/opt/conda", home), PathBuf::from("/opt/conda"));
        assert_eq!(expand_home("~other", home), PathBuf::from("~other"));
    }

    #[test]
    fn test_resolved_paths() {
        let env = sample();
        assert_eq!(env.profile_path, PathBuf::from("/home/ada/.bashrc"));
        assert_eq!(env.conda_bin(), PathBuf::from("/home/ada/miniconda/bin/conda"));
        assert_eq!(env.env_python(), PathBuf::from("/home/ada/miniconda/envs/roop/bin/python"));
        assert_eq!(env.checkout_dir, PathBuf::from("/srv/work/roop-unleashed"));
        assert_eq!(
            env.installer_path,
            PathBuf::from("/srv/work/Miniconda3-latest-Linux-x86_64.sh")
        );
    }

    #[test]
    fn test_relative_prefix_and_profile_anchor_at_home() {
        let config = ProvisionConfig {
            conda_prefix: "miniconda".into(),
            profile_path: ".profile".into(),
            ..Default::default()
        };
        let env = ToolchainEnv::with_paths(
            &config,
            Path::new("/home/ada"),
            Path::new("/srv/work"),
            "/usr/bin",
        );
        assert_eq!(env.conda_prefix, PathBuf::from("/home/ada/miniconda"));
        assert_eq!(env.profile_path, PathBuf::from("/home/ada/.profile"));
        assert!(env.env_python().is_absolute());
        assert!(env.conda_bin().is_absolute());
        assert!(env.path_var().split(':').all(|p| Path::new(p).is_absolute()));
    }

    #[test]
    fn test_path_var_order() {
        assert_eq!(
            sample().path_var(),
            "/home/ada/miniconda/envs/roop/bin:/home/ada/miniconda/bin:/usr/local/bin:/usr/bin:/home/ada/bin"
        );
    }

    #[test]
    fn test_path_var_does_not_duplicate_home_bin() {
        let env = ToolchainEnv::with_paths(
            &ProvisionConfig::default(),
            Path::new("/home/ada"),
            Path::new("/srv/work"),
            "/home/ada/bin:/usr/bin",
        );
        assert_eq!(env.path_var().matches("/home/ada/bin").count(), 1);
    }

    #[test]
    fn test_activated_env_vars() {
        let vars = sample().activated_env_vars();
        assert!(vars.contains(&("CONDA_DEFAULT_ENV".to_string(), "roop".to_string())));
        assert!(vars.contains(&(
            "CONDA_PREFIX".to_string(),
            "/home/ada/miniconda/envs/roop".to_string()
        )));
    }
}
