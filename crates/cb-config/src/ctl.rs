//! Operator configuration for the control client.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// SSH access to runner hosts, used by log, dependency, and binary fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerAccess {
    /// User name for ssh/scp connections to runners.
    pub ssh_user: String,
    /// Private key file presented to runners.
    pub ssh_pkey_file: String,
}

/// Control client configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CtlConfig {
    /// Runner access settings.
    pub runner: RunnerAccess,
}

impl CtlConfig {
    /// Load and validate the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file is unreadable,
    /// [`ConfigError::Parse`] when it is not a valid config document, and
    /// [`ConfigError::InvalidField`] when a required field is blank.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.runner.ssh_user.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "runner",
                field: "ssh_user",
                reason: "empty",
            });
        }
        if self.runner.ssh_pkey_file.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                section: "runner",
                field: "ssh_pkey_file",
                reason: "empty",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_valid_config() {
        let file = write_config("runner:\n  ssh_user: builder\n  ssh_pkey_file: /etc/key\n");
        let config = CtlConfig::load(file.path()).expect("load");
        assert_eq!(config.runner.ssh_user, "builder");
        assert_eq!(config.runner.ssh_pkey_file, "/etc/key");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = CtlConfig::load(Path::new("/nonexistent/ctl.yml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let file = write_config("runner:\n  ssh_user: builder\n");
        assert!(matches!(
            CtlConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn blank_field_is_rejected() {
        let file = write_config("runner:\n  ssh_user: ''\n  ssh_pkey_file: /etc/key\n");
        assert!(matches!(
            CtlConfig::load(file.path()),
            Err(ConfigError::InvalidField {
                field: "ssh_user",
                ..
            })
        ));
    }
}
