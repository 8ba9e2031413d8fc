//! Build and info request payloads published by the control client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};

/// Action requested for a package build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildAction {
    /// Rebuild in the existing buildroot after refreshing sources.
    Rebuild,
    /// Rebuild from a freshly constructed buildroot.
    RebuildClean,
    /// Rebuild triggered by a source change.
    SourceRebuild,
    /// Source-change rebuild with a fresh buildroot.
    SourceRebuildClean,
    /// Foreground build on the operator's machine.
    Local,
}

impl BuildAction {
    /// True for actions that require refreshing the shared git checkout
    /// before the build starts.
    #[must_use]
    pub const fn refreshes_sources(self) -> bool {
        matches!(
            self,
            Self::Rebuild | Self::RebuildClean | Self::SourceRebuild | Self::SourceRebuildClean
        )
    }

    /// True for actions that discard any pre-existing buildroot.
    #[must_use]
    pub const fn cleans_buildroot(self) -> bool {
        matches!(self, Self::RebuildClean | Self::SourceRebuildClean)
    }
}

/// Request to build one package for one distribution target.
///
/// Immutable once constructed; identity is `request_id`, generated by the
/// requester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRequest {
    /// Globally unique request identity.
    pub request_id: Uuid,
    /// Repository-relative path to the package sources.
    pub package: String,
    /// Target architecture name.
    pub arch: String,
    /// Target distribution name.
    pub dist: String,
    /// Runner group whose schedulers should pick this request up.
    pub runner_group: String,
    /// Requested build action.
    pub action: BuildAction,
}

impl BuildRequest {
    /// Construct a new request with a fresh identity.
    #[must_use]
    pub fn new(
        package: impl Into<String>,
        arch: impl Into<String>,
        dist: impl Into<String>,
        runner_group: impl Into<String>,
        action: BuildAction,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            package: package.into(),
            arch: arch.into(),
            dist: dist.into(),
            runner_group: runner_group.into(),
            action,
        }
    }

    /// Decode a request from a raw broker payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the payload is not a valid
    /// request record; callers treat such messages as droppable poison.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(payload).map_err(|source| ProtocolError::Malformed {
            record: "build_request",
            source,
        })
    }

    /// Encode the request for transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| ProtocolError::Encode {
            record: "build_request",
            source,
        })
    }
}

/// Request for build status, logs, and artifact locations of a package.
///
/// Same shape as [`BuildRequest`] minus `runner_group` and `action`; answered
/// by every info service holding state for the package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoRequest {
    /// Globally unique request identity.
    pub request_id: Uuid,
    /// Repository-relative path to the package sources.
    pub package: String,
    /// Target architecture name.
    pub arch: String,
    /// Target distribution name.
    pub dist: String,
}

impl InfoRequest {
    /// Construct a new info request with a fresh identity.
    #[must_use]
    pub fn new(package: impl Into<String>, arch: impl Into<String>, dist: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            package: package.into(),
            arch: arch.into(),
            dist: dist.into(),
        }
    }

    /// Decode an info request from a raw broker payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the payload is not a valid
    /// info-request record.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(payload).map_err(|source| ProtocolError::Malformed {
            record: "info_request",
            source,
        })
    }

    /// Encode the request for transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| ProtocolError::Encode {
            record: "info_request",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_round_trips_with_wire_names() {
        let request = BuildRequest::new(
            "projects/demo/foo",
            "x86_64",
            "TW",
            "suse",
            BuildAction::RebuildClean,
        );
        let payload = request.encode().expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(value["package"], "projects/demo/foo");
        assert_eq!(value["action"], "rebuild_clean");
        assert_eq!(BuildRequest::decode(&payload).expect("decode"), request);
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let payload = br#"{"request_id":"4b4e92a1-1a52-4aa8-a339-6b2b82f35f34","package":"p"}"#;
        assert!(BuildRequest::decode(payload).is_err());
        assert!(InfoRequest::decode(payload).is_err());
    }

    #[test]
    fn clean_actions_imply_source_refresh() {
        for action in [
            BuildAction::Rebuild,
            BuildAction::RebuildClean,
            BuildAction::SourceRebuild,
            BuildAction::SourceRebuildClean,
        ] {
            assert!(action.refreshes_sources());
        }
        assert!(!BuildAction::Local.refreshes_sources());
        assert!(BuildAction::RebuildClean.cleans_buildroot());
        assert!(BuildAction::SourceRebuildClean.cleans_buildroot());
        assert!(!BuildAction::SourceRebuild.cleans_buildroot());
    }
}
