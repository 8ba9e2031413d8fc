//! Shared session context, error types, and remote fetch helpers.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::process::Command;

use cb_broker::BrokerConnector;
use cb_config::ctl::CtlConfig;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub enum CliError {
    /// The operator's input or environment is wrong; exits with 2.
    Validation(String),
    /// An operation failed underway; exits with 3.
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Process exit code for this error class.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    /// Operator-facing message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Application context passed to command handlers.
#[derive(Clone)]
pub struct AppContext {
    /// Factory for broker connections; one fresh connection per exchange.
    pub connector: Arc<dyn BrokerConnector>,
    /// Path to the control client configuration file.
    pub config_path: PathBuf,
}

impl AppContext {
    /// Consumer group for this invocation, `cb-ctl:{pid}`.
    ///
    /// Unique per process so a watch session always starts from the topic's
    /// committed group offset rather than sharing progress with other
    /// operators.
    pub(crate) fn group() -> String {
        format!("cb-ctl:{}", std::process::id())
    }

    /// Load and validate the control client configuration.
    pub(crate) fn load_config(&self) -> CliResult<CtlConfig> {
        CtlConfig::load(&self.config_path).map_err(CliError::failure)
    }
}

const SSH_OPTIONS: [&str; 2] = ["-o", "StrictHostKeyChecking=accept-new"];

/// Read a remote file on a runner over SSH and return its content.
pub(crate) async fn ssh_cat(
    config: &CtlConfig,
    source_ip: &str,
    remote_path: &str,
) -> CliResult<String> {
    let output = Command::new("ssh")
        .arg("-i")
        .arg(&config.runner.ssh_pkey_file)
        .args(SSH_OPTIONS)
        .arg(format!("{}@{source_ip}", config.runner.ssh_user))
        .arg("cat")
        .arg(remote_path)
        .output()
        .await
        .map_err(|error| CliError::failure(anyhow!("spawning ssh: {error}")))?;
    if !output.status.success() {
        return Err(CliError::failure(anyhow!(
            "ssh fetch of {remote_path} from {source_ip} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Copy a remote file from a runner into a local target directory.
pub(crate) async fn scp_fetch(
    config: &CtlConfig,
    source_ip: &str,
    remote_path: &str,
    target_dir: &Path,
) -> CliResult<()> {
    let status = Command::new("scp")
        .arg("-i")
        .arg(&config.runner.ssh_pkey_file)
        .args(SSH_OPTIONS)
        .arg(format!(
            "{}@{source_ip}:{remote_path}",
            config.runner.ssh_user
        ))
        .arg(target_dir)
        .status()
        .await
        .map_err(|error| CliError::failure(anyhow!("spawning scp: {error}")))?;
    if !status.success() {
        return Err(CliError::failure(anyhow!(
            "scp fetch of {remote_path} from {source_ip} failed: {status}"
        )));
    }
    Ok(())
}
