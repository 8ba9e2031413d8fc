//! The scheduler polling cycle.
//!
//! Each cycle opens a fresh broker connection, drains the runner group's
//! request topic until a poll comes back empty, and closes the connection so
//! messages left unacknowledged (architecture mismatches, crashes between
//! read and commit) are redelivered to the next connection of the group.
//! Cycles are spaced by the update interval and never overlap; the interval
//! invariant is enforced by [`SchedulerConfig::validate`] at construction.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use cb_broker::{BrokerConnector, Message, MessageBroker, topics};
use cb_config::metadata::DistributionTarget;
use cb_protocol::BuildRequest;

use crate::SERVICE_NAME;
use crate::builds;
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::script::{ScriptSettings, create_run_script};
use crate::validator::RequestValidator;

/// Long-running build scheduler for one runner group.
pub struct Scheduler {
    config: SchedulerConfig,
    connector: Arc<dyn BrokerConnector>,
    validator: RequestValidator,
    script: ScriptSettings,
}

impl Scheduler {
    /// Build a scheduler over the given settings and broker connector.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] when the configured poll
    /// timeout exceeds the update interval.
    pub fn new(config: SchedulerConfig, connector: Arc<dyn BrokerConnector>) -> SchedulerResult<Self> {
        config.validate()?;
        let validator = RequestValidator::new(&config.project_dir, config.host_arch.clone());
        let script = ScriptSettings::new(&config.project_dir, &config.package_root);
        Ok(Self {
            config,
            connector,
            validator,
            script,
        })
    }

    /// Run polling cycles forever, spaced by the update interval.
    ///
    /// A failed cycle is logged and the next one starts on schedule; only
    /// construction-time errors abort the scheduler.
    pub async fn run(&self) {
        info!(
            runner_group = %self.config.runner_group,
            update_interval = ?self.config.update_interval,
            "scheduler started"
        );
        let mut ticker = tokio::time::interval(self.config.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = self.handle_build_requests().await {
                error!(%error, "polling cycle failed");
            }
        }
    }

    /// Run one polling cycle: connect, drain the request topic, close.
    ///
    /// Skips the cycle entirely while the running-build limit is reached, so
    /// pending requests stay queued at the broker instead of piling up here.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Broker`] when connecting, polling, or
    /// closing fails. Errors while handling a single message are logged and
    /// do not abort the cycle.
    pub async fn handle_build_requests(&self) -> SchedulerResult<()> {
        let running = builds::running_builds(&self.config.package_root);
        if running >= self.config.running_limit {
            debug!(running, limit = self.config.running_limit, "build limit reached, skipping cycle");
            return Ok(());
        }

        let topic = topics::package_request_topic(&self.config.runner_group);
        let broker = self.connector.connect().await?;
        let drained = self.drain_requests(broker.as_ref(), &topic).await;
        let closed = broker.close().await;
        drained?;
        closed?;
        Ok(())
    }

    async fn drain_requests(
        &self,
        broker: &dyn MessageBroker,
        topic: &str,
    ) -> SchedulerResult<()> {
        loop {
            let batch = broker
                .read(topic, SERVICE_NAME, self.config.poll_timeout)
                .await?;
            if batch.is_empty() {
                return Ok(());
            }
            for message in batch {
                if let Err(error) = self.process_message(broker, &message).await {
                    error!(%error, "build request handling failed");
                }
                if builds::running_builds(&self.config.package_root) >= self.config.running_limit
                {
                    warn!("build limit reached mid-cycle, deferring remaining requests");
                    return Ok(());
                }
            }
        }
    }

    async fn process_message(
        &self,
        broker: &dyn MessageBroker,
        message: &Message,
    ) -> SchedulerResult<()> {
        let request = match BuildRequest::decode(&message.payload) {
            Ok(request) => request,
            Err(error) => {
                // Poison message: answerless drop, but commit it so it does
                // not wedge the topic for the whole group.
                warn!(%error, "dropping malformed build request");
                broker.acknowledge().await?;
                return Ok(());
            }
        };
        let Some(target) = self.validator.validate(broker, &request).await? else {
            return Ok(());
        };
        self.build_package(broker, &request, &target).await
    }

    async fn build_package(
        &self,
        broker: &dyn MessageBroker,
        request: &BuildRequest,
        target: &DistributionTarget,
    ) -> SchedulerResult<()> {
        builds::reset_build_if_running(broker, request, &self.config.package_root).await?;
        if request.action.refreshes_sources() {
            self.update_sources().await?;
        }
        let script =
            create_run_script(request, &self.script, request.action.cleans_buildroot(), false)?;
        info!(
            package = %request.package,
            profile = %target.profile(),
            request_id = %request.request_id,
            "launching build"
        );
        // Null stdio: the detached build keeps running after the launcher
        // shell exits, so it must not share pipes with this process.
        let status = Command::new("bash")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|error| SchedulerError::Subprocess {
                command: "bash".to_owned(),
                detail: error.to_string(),
            })?;
        if !status.success() {
            return Err(SchedulerError::Subprocess {
                command: "bash".to_owned(),
                detail: status.to_string(),
            });
        }
        Ok(())
    }

    /// Refresh the shared project checkout before a source-dependent build.
    async fn update_sources(&self) -> SchedulerResult<()> {
        debug!(project_dir = %self.config.project_dir.display(), "updating project sources");
        run_checked(
            Command::new("git").arg("-C").arg(&self.config.project_dir).arg("pull"),
            "git pull",
        )
        .await
    }
}

async fn run_checked(command: &mut Command, name: &str) -> SchedulerResult<()> {
    let output = command
        .output()
        .await
        .map_err(|error| SchedulerError::Subprocess {
            command: name.to_owned(),
            detail: error.to_string(),
        })?;
    if !output.status.success() {
        return Err(SchedulerError::Subprocess {
            command: name.to_owned(),
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}
