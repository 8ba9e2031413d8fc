//! Ordered request validation with acknowledgement discipline.
//!
//! Every incoming build request is checked against the on-disk package
//! metadata in a fixed order. Each failed check publishes a rejection
//! response and acknowledges the message so it is never redelivered, with
//! one exception: an architecture mismatch is a host property, not a request
//! defect, so the message is answered but deliberately left unacknowledged
//! for another scheduler of the group to pick up.

use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use cb_broker::{MessageBroker, topics::RESPONSE_TOPIC};
use cb_config::metadata::{DistributionTarget, PackageMetadata};
use cb_protocol::{BuildRequest, Response, ResponseCode};

use crate::error::SchedulerResult;
use crate::identity;

/// Validates build requests against the local project checkout.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    project_dir: PathBuf,
    host_arch: String,
}

impl RequestValidator {
    /// Validator rooted at the given project checkout.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>, host_arch: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            host_arch: host_arch.into(),
        }
    }

    /// Run the validation chain for one request.
    ///
    /// Returns the matched distribution target when the request is accepted
    /// and `None` when it was rejected or passed over. Responses and
    /// acknowledgements are published as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SchedulerError::Broker`] or
    /// [`crate::SchedulerError::Protocol`] when a response cannot be
    /// published.
    pub async fn validate(
        &self,
        broker: &dyn MessageBroker,
        request: &BuildRequest,
    ) -> SchedulerResult<Option<DistributionTarget>> {
        let Some(package_path) = self.resolve_package_path(&request.package) else {
            self.reject(
                broker,
                request,
                ResponseCode::PackageNotExisting,
                format!("package {} does not exist in the project", request.package),
            )
            .await?;
            return Ok(None);
        };

        if !PackageMetadata::file_path(&package_path).is_file() {
            self.reject(
                broker,
                request,
                ResponseCode::PackageMetadataNotExisting,
                format!("package {} has no build metadata", request.package),
            )
            .await?;
            return Ok(None);
        }

        let target = match PackageMetadata::load(&package_path) {
            Ok(metadata) => metadata
                .matching_target(&request.dist, &request.arch, &request.runner_group)
                .cloned(),
            Err(error) => {
                warn!(package = %request.package, %error, "unreadable package metadata");
                None
            }
        };
        let Some(target) = target else {
            self.reject(
                broker,
                request,
                ResponseCode::PackageTargetNotConfigured,
                format!(
                    "package {} is not configured for dist {} on {} in runner group {}",
                    request.package, request.dist, request.arch, request.runner_group
                ),
            )
            .await?;
            return Ok(None);
        };

        if request.arch != self.host_arch {
            info!(
                package = %request.package,
                requested = %request.arch,
                host = %self.host_arch,
                "passing request on, host architecture does not match"
            );
            // No acknowledge: the message stays uncommitted so a scheduler
            // with the right architecture receives it on its next connection.
            self.respond(
                broker,
                request,
                ResponseCode::BuildhostArchIncompatible,
                format!(
                    "buildhost architecture {} cannot build {}",
                    self.host_arch, request.arch
                ),
            )
            .await?;
            return Ok(None);
        }

        self.respond(
            broker,
            request,
            ResponseCode::PackageRequestAccepted,
            format!(
                "build request for package {} accepted",
                request.package
            ),
        )
        .await?;
        broker.acknowledge().await?;
        Ok(Some(target))
    }

    /// Resolve a repository-relative package path under the project checkout.
    ///
    /// Absolute paths and parent-directory components are rejected outright
    /// so a request can never name a directory outside the checkout.
    fn resolve_package_path(&self, package: &str) -> Option<PathBuf> {
        let relative = Path::new(package);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes {
            return None;
        }
        let path = self.project_dir.join(relative);
        path.is_dir().then_some(path)
    }

    async fn reject(
        &self,
        broker: &dyn MessageBroker,
        request: &BuildRequest,
        response_code: ResponseCode,
        message: String,
    ) -> SchedulerResult<()> {
        warn!(package = %request.package, code = ?response_code, "rejecting build request");
        self.respond(broker, request, response_code, message).await?;
        broker.acknowledge().await?;
        Ok(())
    }

    async fn respond(
        &self,
        broker: &dyn MessageBroker,
        request: &BuildRequest,
        response_code: ResponseCode,
        message: String,
    ) -> SchedulerResult<()> {
        let concrete = matches!(
            response_code,
            ResponseCode::PackageRequestAccepted | ResponseCode::BuildhostArchIncompatible
        );
        let response = Response {
            request_id: request.request_id,
            identity: identity(&request.runner_group),
            response_code,
            message,
            package: request.package.clone(),
            arch: concrete.then(|| request.arch.clone()),
            dist: concrete.then(|| request.dist.clone()),
        };
        broker.send(RESPONSE_TOPIC, &response.encode()?).await?;
        Ok(())
    }
}
