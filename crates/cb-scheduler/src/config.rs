//! Scheduler settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{SchedulerError, SchedulerResult};

/// Default update interval between polling cycles.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);
/// Default broker poll timeout per read.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default maximum number of concurrently running builds.
pub const DEFAULT_RUNNING_LIMIT: usize = 10;

/// Settings injected into a [`crate::Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Runner group whose request topic this scheduler consumes.
    pub runner_group: String,
    /// Interval between polling cycles.
    pub update_interval: Duration,
    /// Broker poll timeout; bounds the inactivity window per read.
    pub poll_timeout: Duration,
    /// Maximum number of builds allowed to run at the same time.
    pub running_limit: usize,
    /// Local checkout of the shared project git repository.
    pub project_dir: PathBuf,
    /// Root for buildroots, scripts, PID files, and logs.
    pub package_root: PathBuf,
    /// Machine architecture of this host, compared against request `arch`.
    pub host_arch: String,
}

impl SchedulerConfig {
    /// Settings with stock defaults for the given runner group.
    #[must_use]
    pub fn new(runner_group: impl Into<String>) -> Self {
        Self {
            runner_group: runner_group.into(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            running_limit: DEFAULT_RUNNING_LIMIT,
            project_dir: cb_config::defaults::runner_project_dir(),
            package_root: cb_config::defaults::runner_package_root(),
            host_arch: std::env::consts::ARCH.to_owned(),
        }
    }

    /// Enforce the interval invariant before any broker connection exists.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] when the poll timeout
    /// exceeds the update interval, which would overlap polling cycles and
    /// cause redundant reconnects and rebalances on the broker.
    pub const fn validate(&self) -> SchedulerResult<()> {
        if self.poll_timeout.as_millis() > self.update_interval.as_millis() {
            return Err(SchedulerError::InvalidInterval {
                poll_timeout_ms: self.poll_timeout.as_millis(),
                update_interval_secs: self.update_interval.as_secs(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_the_interval_invariant() {
        let config = SchedulerConfig::new("suse");
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval, Duration::from_secs(10));
        assert_eq!(config.poll_timeout, Duration::from_millis(5000));
        assert_eq!(config.running_limit, 10);
    }

    #[test]
    fn oversized_poll_timeout_is_rejected() {
        let mut config = SchedulerConfig::new("suse");
        config.poll_timeout = Duration::from_millis(6000);
        config.update_interval = Duration::from_secs(5);
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidInterval {
                poll_timeout_ms: 6000,
                update_interval_secs: 5,
            })
        ));
    }

    #[test]
    fn poll_timeout_equal_to_interval_is_allowed() {
        let mut config = SchedulerConfig::new("suse");
        config.poll_timeout = Duration::from_millis(5000);
        config.update_interval = Duration::from_secs(5);
        assert!(config.validate().is_ok());
    }
}
