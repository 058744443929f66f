//! Type-safe configuration types for roopstrap
//!
//! Enums instead of strings for the few configuration values that have a
//! closed set of options.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// CPU architecture, selects the Miniconda installer flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Architecture {
    #[default]
    #[serde(rename = "x86_64")]
    #[strum(serialize = "x86_64")]
    X86_64,
    #[serde(rename = "aarch64")]
    #[strum(serialize = "aarch64")]
    Aarch64,
}

impl Architecture {
    /// Architecture of the running host, if Miniconda publishes an installer for it
    pub fn host() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }

    /// Installer file name published for this architecture
    pub fn miniconda_installer(self) -> String {
        format!("Miniconda3-latest-Linux-{}.sh", self)
    }
}

/// What to do when a provisioning step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and run the remaining steps
    #[default]
    Continue,
    /// Stop at the first failed step
    FailFast,
}

/// Generic yes/no toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Toggle {
    #[default]
    #[strum(to_string = "Yes", serialize = "yes")]
    Yes,
    #[strum(to_string = "No", serialize = "no")]
    No,
}

impl Toggle {
    pub fn is_enabled(self) -> bool {
        self == Self::Yes
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_architecture_installer_name() {
        assert_eq!(
            Architecture::X86_64.miniconda_installer(),
            "Miniconda3-latest-Linux-x86_64.sh"
        );
        assert_eq!(
            Architecture::Aarch64.miniconda_installer(),
            "Miniconda3-latest-Linux-aarch64.sh"
        );
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("continue".parse::<FailurePolicy>().unwrap(), FailurePolicy::Continue);
        assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_toggle_roundtrip() {
        for toggle in Toggle::iter() {
            let parsed: Toggle = toggle.to_string().parse().unwrap();
            assert_eq!(parsed, toggle);
        }
        assert!(Toggle::from(true).is_enabled());
        assert!(!Toggle::from(false).is_enabled());
    }
}
