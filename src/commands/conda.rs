//! Type-safe arguments for the Miniconda bootstrap:
//! - `DownloadArgs` for fetching the installer with `wget`
//! - `MinicondaInstallArgs` for the silent batch install
//! - `CondaCreateArgs` for `conda create`

use std::path::PathBuf;

use crate::command_traits::CommandArgs;
use crate::environment::ToolchainEnv;

// ============================================================================
// Download
// ============================================================================

/// Type-safe arguments for `wget -O <dest> <url>`.
#[derive(Debug, Clone)]
pub struct DownloadArgs {
    pub url: String,
    pub dest: PathBuf,
}

impl CommandArgs for DownloadArgs {
    fn program(&self) -> String {
        "wget".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-O".to_string(),
            self.dest.display().to_string(),
            self.url.clone(),
        ]
    }

    fn description(&self) -> String {
        "Download Miniconda installer".to_string()
    }
}

// ============================================================================
// Miniconda install
// ============================================================================

/// Type-safe arguments for `bash <installer> -b -p <prefix>`.
///
/// `-b` runs the installer in batch mode (accepts the license, does not touch
/// shell profiles); `-p` sets the install prefix.
#[derive(Debug, Clone)]
pub struct MinicondaInstallArgs {
    pub installer: PathBuf,
    pub prefix: PathBuf,
}

impl CommandArgs for MinicondaInstallArgs {
    fn program(&self) -> String {
        "bash".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            self.installer.display().to_string(),
            "-b".to_string(),
            "-p".to_string(),
            self.prefix.display().to_string(),
        ]
    }

    fn description(&self) -> String {
        "Install Miniconda".to_string()
    }
}

// ============================================================================
// conda create
// ============================================================================

/// Type-safe arguments for `conda create -n <name> python=<v> [cudatoolkit=<v>] -y`.
#[derive(Debug, Clone)]
pub struct CondaCreateArgs {
    pub conda: PathBuf,
    pub name: String,
    pub python_version: String,
    /// Omitted from the command when `None`
    pub cuda_toolkit_version: Option<String>,
    pub env: Vec<(String, String)>,
}

impl CondaCreateArgs {
    pub fn new(
        toolchain: &ToolchainEnv,
        python_version: &str,
        cuda_toolkit_version: Option<&str>,
    ) -> Self {
        Self {
            conda: toolchain.conda_bin(),
            name: toolchain.env_name.clone(),
            python_version: python_version.to_string(),
            cuda_toolkit_version: cuda_toolkit_version.map(str::to_string),
            env: toolchain.conda_env_vars(),
        }
    }
}

impl CommandArgs for CondaCreateArgs {
    fn program(&self) -> String {
        self.conda.display().to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "-n".to_string(),
            self.name.clone(),
            format!("python={}", self.python_version),
        ];
        if let Some(ref cuda) = self.cuda_toolkit_version {
            args.push(format!("cudatoolkit={}", cuda));
        }
        args.push("-y".to_string());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.env.clone()
    }

    fn description(&self) -> String {
        format!("Create conda environment '{}'", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::ProvisionConfig;
    use std::path::Path;

    fn toolchain() -> ToolchainEnv {
        ToolchainEnv::with_paths(
            &ProvisionConfig::default(),
            Path::new("/home/ada"),
            Path::new("/srv/work"),
            "/usr/bin",
        )
    }

    #[test]
    fn test_download_args() {
        let args = DownloadArgs {
            url: "https://repo.continuum.io/miniconda/Miniconda3-latest-Linux-x86_64.sh".into(),
            dest: PathBuf::from("/srv/work/Miniconda3-latest-Linux-x86_64.sh"),
        };
        assert_eq!(
            args.to_spec().display(),
            "wget -O /srv/work/Miniconda3-latest-Linux-x86_64.sh https://repo.continuum.io/miniconda/Miniconda3-latest-Linux-x86_64.sh"
        );
    }

    #[test]
    fn test_miniconda_install_args() {
        let tc = toolchain();
        let args = MinicondaInstallArgs {
            installer: tc.installer_path.clone(),
            prefix: tc.conda_prefix.clone(),
        };
        assert_eq!(
            args.to_spec().display(),
            "bash /srv/work/Miniconda3-latest-Linux-x86_64.sh -b -p /home/ada/miniconda"
        );
    }

    #[test]
    fn test_conda_create_args() {
        let spec = CondaCreateArgs::new(&toolchain(), "3.10", Some("11.8")).to_spec();
        assert_eq!(
            spec.display(),
            "/home/ada/miniconda/bin/conda create -n roop python=3.10 cudatoolkit=11.8 -y"
        );
        assert_eq!(spec.env_var("CONDA_PREFIX"), Some("/home/ada/miniconda"));
    }

    #[test]
    fn test_conda_create_without_cuda() {
        let spec = CondaCreateArgs::new(&toolchain(), "3.11", None).to_spec();
        assert!(!spec.display().contains("cudatoolkit"));
    }
}
