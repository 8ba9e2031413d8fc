//! Response payloads published after each request state transition.
//!
//! Responses are append-only events: published once per transition and never
//! mutated afterwards.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};

/// Wire format of [`InfoResponse::utc_modification_time`].
pub const MODIFICATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Outcome classification carried by every response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    /// Package sources do not exist on the runner.
    PackageNotExisting,
    /// Package exists but carries no build metadata file.
    PackageMetadataNotExisting,
    /// No metadata target matches the requested dist/arch/runner group.
    PackageTargetNotConfigured,
    /// The scheduler host's architecture does not match the request.
    BuildhostArchIncompatible,
    /// Request passed validation and the build was scheduled.
    PackageRequestAccepted,
    /// A prior build for the same target was signalled before relaunch.
    ResetRunningBuild,
}

/// Scheduler response to a build request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    /// Identity of the request this response answers.
    pub request_id: Uuid,
    /// Originating service identity, `{service}:{scope}`, used for
    /// prefix-based filtering by the watch command.
    pub identity: String,
    /// Outcome classification.
    pub response_code: ResponseCode,
    /// Human-readable detail.
    pub message: String,
    /// Repository-relative package path.
    pub package: String,
    /// Target architecture, present once a concrete target is known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arch: Option<String>,
    /// Target distribution, present once a concrete target is known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dist: Option<String>,
}

impl Response {
    /// Decode a response from a raw broker payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the payload is not a valid
    /// response record.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(payload).map_err(|source| ProtocolError::Malformed {
            record: "response",
            source,
        })
    }

    /// Encode the response for transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| ProtocolError::Encode {
            record: "response",
            source,
        })
    }
}

/// Status and artifact-location record answering an [`crate::InfoRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoResponse {
    /// Identity of the info request this response answers.
    pub request_id: Uuid,
    /// Originating service identity.
    pub identity: String,
    /// Repository-relative package path.
    pub package: String,
    /// Architecture the answering runner built for.
    pub arch: String,
    /// Distribution the answering runner built for.
    pub dist: String,
    /// Address of the runner holding the artifacts.
    pub source_ip: String,
    /// Path of the dependency-solver result on the runner.
    pub solver_file: String,
    /// Path of the raw build log on the runner.
    pub log_file: String,
    /// Paths of the produced binary packages on the runner.
    pub binary_packages: Vec<String>,
    /// Last modification time of the build state, UTC,
    /// `%Y-%m-%d %H:%M:%S%.f`.
    pub utc_modification_time: String,
}

impl InfoResponse {
    /// Decode an info response from a raw broker payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] when the payload is not a valid
    /// info-response record.
    pub fn decode(payload: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(payload).map_err(|source| ProtocolError::Malformed {
            record: "info_response",
            source,
        })
    }

    /// Encode the response for transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| ProtocolError::Encode {
            record: "info_response",
            source,
        })
    }

    /// Parse the modification time for latest-record selection.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTimestamp`] when the field does not
    /// follow the wire format.
    pub fn modification_time(&self) -> ProtocolResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.utc_modification_time, MODIFICATION_TIME_FORMAT)
            .map_err(|source| ProtocolError::InvalidTimestamp {
                value: self.utc_modification_time.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> Response {
        Response {
            request_id: Uuid::new_v4(),
            identity: "cb-scheduler:foo".into(),
            response_code: ResponseCode::PackageRequestAccepted,
            message: "Accept package build request".into(),
            package: "projects/demo/foo".into(),
            arch: Some("x86_64".into()),
            dist: Some("TW".into()),
        }
    }

    #[test]
    fn response_codes_use_snake_case_wire_names() {
        let response = sample_response();
        let value: serde_json::Value =
            serde_json::from_slice(&response.encode().expect("encode")).expect("json");
        assert_eq!(value["response_code"], "package_request_accepted");
    }

    #[test]
    fn optional_target_fields_are_omitted_when_unknown() {
        let mut response = sample_response();
        response.arch = None;
        response.dist = None;
        let value: serde_json::Value =
            serde_json::from_slice(&response.encode().expect("encode")).expect("json");
        assert!(value.get("arch").is_none());
        assert!(value.get("dist").is_none());
        let decoded = Response::decode(&response.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, response);
    }

    #[test]
    fn modification_time_parses_wire_format() {
        let info = InfoResponse {
            request_id: Uuid::new_v4(),
            identity: "cb-info:foo".into(),
            package: "projects/demo/foo".into(),
            arch: "x86_64".into(),
            dist: "TW".into(),
            source_ip: "10.0.0.7".into(),
            solver_file: "/var/lib/cloudbuild/foo.solver.json".into(),
            log_file: "/var/lib/cloudbuild/foo.build.log".into(),
            binary_packages: vec!["/var/lib/cloudbuild/foo.rpm".into()],
            utc_modification_time: "2021-01-02 00:00:00.000000".into(),
        };
        let parsed = info.modification_time().expect("parse");
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2021-01-02");

        let mut bad = info;
        bad.utc_modification_time = "02/01/2021".into();
        assert!(bad.modification_time().is_err());
    }
}
